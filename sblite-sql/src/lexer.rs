//! Single-pass SQL lexer. Deterministic, no backtracking; invalid input
//! yields an `Error` token carrying its position rather than a panic.

use crate::token::{Keyword, Pos, Token, TokenKind};

pub struct Lexer<'a> {
    chars: Vec<(usize, char)>,
    src_len: usize,
    idx: usize,
    line: u32,
    column: u32,
    _src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Lexer<'a> {
        Lexer {
            chars: src.char_indices().collect(),
            src_len: src.len(),
            idx: 0,
            line: 1,
            column: 1,
            _src: src,
        }
    }

    /// Tokenize the whole input. The returned vector always ends with the
    /// EOF sentinel.
    pub fn tokenize(src: &'a str) -> Vec<Token> {
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).map(|(_, c)| *c)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.idx + n).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = *self.chars.get(self.idx)?;
        self.idx += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn pos(&self) -> Pos {
        let offset = self
            .chars
            .get(self.idx)
            .map(|(o, _)| *o)
            .unwrap_or(self.src_len);
        Pos {
            offset,
            line: self.line,
            column: self.column,
        }
    }

    fn token(&self, kind: TokenKind, text: impl Into<String>, pos: Pos) -> Token {
        Token {
            kind,
            text: text.into(),
            pos,
        }
    }

    fn error(&self, message: impl Into<String>, pos: Pos) -> Token {
        self.token(TokenKind::Error, message, pos)
    }

    /// Return the next token, or the EOF sentinel once input is exhausted.
    pub fn next_token(&mut self) -> Token {
        self.skip_trivia();

        let pos = self.pos();
        let c = match self.peek() {
            Some(c) => c,
            None => return Token::eof(pos),
        };

        if c.is_alphabetic() || c == '_' {
            return self.lex_word(pos);
        }
        if c.is_ascii_digit() {
            return self.lex_number(pos);
        }
        if c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
            return self.lex_number(pos);
        }

        match c {
            '\'' => self.lex_string(pos),
            '"' => self.lex_quoted_ident(pos),
            '$' => self.lex_dollar(pos),
            _ => self.lex_operator(pos),
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('-') if self.peek_at(1) == Some('-') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    // block comments nest, following PostgreSQL
                    let mut depth = 1usize;
                    while depth > 0 {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                depth -= 1;
                            }
                            (Some('/'), Some('*')) => {
                                self.bump();
                                self.bump();
                                depth += 1;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => return,
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn lex_word(&mut self, pos: Pos) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match Keyword::parse(&text) {
            Some(k) => self.token(TokenKind::Keyword(k), text, pos),
            None => self.token(TokenKind::Ident, text, pos),
        }
    }

    fn lex_number(&mut self, pos: Pos) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).is_none_or(|c| c != '.') {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = self.peek_at(1);
            let digits_at = if matches!(sign, Some('+') | Some('-')) { 2 } else { 1 };
            if self.peek_at(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
                if matches!(sign, Some('+') | Some('-')) {
                    text.push(self.bump().unwrap());
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        text.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        self.token(TokenKind::Number, text, pos)
    }

    fn lex_string(&mut self, pos: Pos) -> Token {
        self.bump();
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('\'') => {
                    if self.peek_at(1) == Some('\'') {
                        text.push('\'');
                        self.bump();
                        self.bump();
                    } else {
                        self.bump();
                        return self.token(TokenKind::String, text, pos);
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
                None => return self.error("unterminated string literal", pos),
            }
        }
    }

    fn lex_quoted_ident(&mut self, pos: Pos) -> Token {
        self.bump();
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    if self.peek_at(1) == Some('"') {
                        text.push('"');
                        self.bump();
                        self.bump();
                    } else {
                        self.bump();
                        return self.token(TokenKind::QuotedIdent, text, pos);
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
                None => return self.error("unterminated quoted identifier", pos),
            }
        }
    }

    /// `$` starts either a dollar-quoted string (`$tag$...$tag$`, tag may be
    /// empty but cannot start with a digit) or a positional parameter (`$1`).
    fn lex_dollar(&mut self, pos: Pos) -> Token {
        if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            let mut text = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            return self.token(TokenKind::Parameter, text, pos);
        }

        let mut tag = String::new();
        let mut n = 1;
        loop {
            match self.peek_at(n) {
                Some('$') => break,
                Some(c) if (c.is_alphanumeric() || c == '_') && !(tag.is_empty() && c.is_ascii_digit()) => {
                    tag.push(c);
                    n += 1;
                }
                _ => return self.bump_error("invalid character '$'", pos),
            }
        }
        // consume `$tag$`
        for _ in 0..n + 1 {
            self.bump();
        }

        let delimiter: Vec<char> = format!("${tag}$").chars().collect();
        let mut text = String::new();
        loop {
            if self.peek().is_none() {
                return self.error("unterminated dollar-quoted string", pos);
            }
            let mut matched = true;
            for (i, d) in delimiter.iter().enumerate() {
                if self.peek_at(i) != Some(*d) {
                    matched = false;
                    break;
                }
            }
            if matched {
                for _ in 0..delimiter.len() {
                    self.bump();
                }
                return self.token(TokenKind::DollarString, text, pos);
            }
            text.push(self.bump().unwrap());
        }
    }

    fn lex_operator(&mut self, pos: Pos) -> Token {
        let c = self.bump().unwrap();
        let kind = match c {
            '+' => TokenKind::Plus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '=' => TokenKind::Eq,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '-' => {
                if self.peek() == Some('>') {
                    self.bump();
                    if self.peek() == Some('>') {
                        self.bump();
                        TokenKind::LongArrow
                    } else {
                        TokenKind::Arrow
                    }
                } else {
                    TokenKind::Minus
                }
            }
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    TokenKind::LtEq
                }
                Some('>') => {
                    self.bump();
                    TokenKind::NotEq
                }
                _ => TokenKind::Lt,
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::GtEq
                } else {
                    TokenKind::Gt
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.bump();
                    TokenKind::Concat
                } else {
                    return self.error("invalid character '|'", pos);
                }
            }
            ':' => {
                if self.peek() == Some(':') {
                    self.bump();
                    TokenKind::DoubleColon
                } else {
                    TokenKind::Colon
                }
            }
            '~' => {
                if self.peek() == Some('*') {
                    self.bump();
                    TokenKind::TildeStar
                } else {
                    TokenKind::Tilde
                }
            }
            '!' => match self.peek() {
                Some('~') => {
                    self.bump();
                    if self.peek() == Some('*') {
                        self.bump();
                        TokenKind::NotTildeStar
                    } else {
                        TokenKind::NotTilde
                    }
                }
                Some('=') => {
                    self.bump();
                    TokenKind::NotEq
                }
                _ => return self.error("invalid character '!'", pos),
            },
            other => return self.error(format!("invalid character '{other}'"), pos),
        };
        self.token(kind, kind.class(), pos)
    }

    fn bump_error(&mut self, message: &str, pos: Pos) -> Token {
        self.bump();
        self.error(message, pos)
    }
}
