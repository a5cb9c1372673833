//! Typed SQL AST. Two tagged sums, [`Expr`] and [`Stmt`]; every node carries
//! the source position of its first token.

use crate::token::Pos;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    /// Numeric literals keep their source spelling so generation is lossless.
    Number(String),
    Boolean(bool),
    Null,
    /// Body of a `$tag$...$tag$` literal.
    DollarString(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Concat,
    Like,
    NotLike,
    ILike,
    NotILike,
    /// `~` case-sensitive regex match.
    Regex,
    /// `~*`
    RegexI,
    /// `!~`
    NotRegex,
    /// `!~*`
    NotRegexI,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Concat => "||",
            BinaryOp::Like => "LIKE",
            BinaryOp::NotLike => "NOT LIKE",
            BinaryOp::ILike => "ILIKE",
            BinaryOp::NotILike => "NOT ILIKE",
            BinaryOp::Regex => "~",
            BinaryOp::RegexI => "~*",
            BinaryOp::NotRegex => "!~",
            BinaryOp::NotRegexI => "!~*",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

/// Type name as written, e.g. `VARCHAR(255)` or `uuid[]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub name: String,
    /// Arguments of a parameterized type, kept as source text.
    pub args: Vec<String>,
    pub array: bool,
}

impl TypeName {
    pub fn plain(name: impl Into<String>) -> TypeName {
        TypeName {
            name: name.into(),
            args: Vec::new(),
            array: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IsTest {
    Null,
    True,
    False,
    DistinctFrom(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InSet {
    List(Vec<Expr>),
    Subquery(Box<SelectStmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub desc: bool,
    /// `NULLS FIRST` / `NULLS LAST` when written.
    pub nulls_first: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier {
        name: String,
        quoted: bool,
        pos: Pos,
    },
    /// `table.column` or `schema.table.column`; `qualifier` keeps the dotted
    /// prefix as written.
    QualifiedRef {
        qualifier: String,
        name: String,
        quoted: bool,
        pos: Pos,
    },
    Literal {
        value: Literal,
        pos: Pos,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Pos,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
        /// `COUNT(*)`; when set, `args` must be empty.
        star: bool,
        /// Ordered-aggregate `ORDER BY` inside the call.
        order_by: Vec<OrderByItem>,
        pos: Pos,
    },
    /// `expr::type`
    TypeCast {
        expr: Box<Expr>,
        ty: TypeName,
        pos: Pos,
    },
    /// `CAST(expr AS type)`
    Cast {
        expr: Box<Expr>,
        ty: TypeName,
        pos: Pos,
    },
    /// `->` (`as_text = false`) or `->>` (`as_text = true`).
    JsonAccess {
        expr: Box<Expr>,
        key: Box<Expr>,
        as_text: bool,
        pos: Pos,
    },
    Paren {
        expr: Box<Expr>,
        pos: Pos,
    },
    Array {
        elements: Vec<Expr>,
        pos: Pos,
    },
    ArraySubscript {
        array: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    /// Simple (`operand` set) and searched CASE forms.
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_expr: Option<Box<Expr>>,
        pos: Pos,
    },
    Between {
        expr: Box<Expr>,
        negated: bool,
        low: Box<Expr>,
        high: Box<Expr>,
        pos: Pos,
    },
    In {
        expr: Box<Expr>,
        negated: bool,
        set: InSet,
        pos: Pos,
    },
    Is {
        expr: Box<Expr>,
        negated: bool,
        test: IsTest,
        pos: Pos,
    },
    Exists {
        negated: bool,
        subquery: Box<SelectStmt>,
        pos: Pos,
    },
    /// `EXTRACT(field FROM source)`
    Extract {
        field: String,
        source: Box<Expr>,
        pos: Pos,
    },
    /// `INTERVAL '7 days'`; the quantity string is kept verbatim.
    Interval {
        value: String,
        pos: Pos,
    },
    Subquery {
        query: Box<SelectStmt>,
        pos: Pos,
    },
    Star {
        qualifier: Option<String>,
        pos: Pos,
    },
    /// Positional parameter `$n`.
    Parameter {
        index: u32,
        pos: Pos,
    },
    /// Verbatim passthrough.
    Raw {
        sql: String,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Identifier { pos, .. }
            | Expr::QualifiedRef { pos, .. }
            | Expr::Literal { pos, .. }
            | Expr::BinaryOp { pos, .. }
            | Expr::UnaryOp { pos, .. }
            | Expr::FunctionCall { pos, .. }
            | Expr::TypeCast { pos, .. }
            | Expr::Cast { pos, .. }
            | Expr::JsonAccess { pos, .. }
            | Expr::Paren { pos, .. }
            | Expr::Array { pos, .. }
            | Expr::ArraySubscript { pos, .. }
            | Expr::Case { pos, .. }
            | Expr::Between { pos, .. }
            | Expr::In { pos, .. }
            | Expr::Is { pos, .. }
            | Expr::Exists { pos, .. }
            | Expr::Extract { pos, .. }
            | Expr::Interval { pos, .. }
            | Expr::Subquery { pos, .. }
            | Expr::Star { pos, .. }
            | Expr::Parameter { pos, .. }
            | Expr::Raw { pos, .. } => *pos,
        }
    }

    pub fn string_literal(value: impl Into<String>, pos: Pos) -> Expr {
        Expr::Literal {
            value: Literal::String(value.into()),
            pos,
        }
    }

    /// Bottom-up structural map: children are rewritten first, then `f` runs
    /// on the rebuilt node. Recurses through subqueries.
    pub fn map(self, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
        let mapped = match self {
            Expr::BinaryOp {
                op,
                left,
                right,
                pos,
            } => Expr::BinaryOp {
                op,
                left: Box::new(left.map(f)),
                right: Box::new(right.map(f)),
                pos,
            },
            Expr::UnaryOp { op, operand, pos } => Expr::UnaryOp {
                op,
                operand: Box::new(operand.map(f)),
                pos,
            },
            Expr::FunctionCall {
                name,
                args,
                distinct,
                star,
                order_by,
                pos,
            } => Expr::FunctionCall {
                name,
                args: args.into_iter().map(|a| a.map(f)).collect(),
                distinct,
                star,
                order_by: order_by
                    .into_iter()
                    .map(|item| {
                        let OrderByItem {
                            expr,
                            desc,
                            nulls_first,
                        } = item;
                        OrderByItem {
                            expr: expr.map(f),
                            desc,
                            nulls_first,
                        }
                    })
                    .collect(),
                pos,
            },
            Expr::TypeCast { expr, ty, pos } => Expr::TypeCast {
                expr: Box::new(expr.map(f)),
                ty,
                pos,
            },
            Expr::Cast { expr, ty, pos } => Expr::Cast {
                expr: Box::new(expr.map(f)),
                ty,
                pos,
            },
            Expr::JsonAccess {
                expr,
                key,
                as_text,
                pos,
            } => Expr::JsonAccess {
                expr: Box::new(expr.map(f)),
                key: Box::new(key.map(f)),
                as_text,
                pos,
            },
            Expr::Paren { expr, pos } => Expr::Paren {
                expr: Box::new(expr.map(f)),
                pos,
            },
            Expr::Array { elements, pos } => Expr::Array {
                elements: elements.into_iter().map(|e| e.map(f)).collect(),
                pos,
            },
            Expr::ArraySubscript { array, index, pos } => Expr::ArraySubscript {
                array: Box::new(array.map(f)),
                index: Box::new(index.map(f)),
                pos,
            },
            Expr::Case {
                operand,
                branches,
                else_expr,
                pos,
            } => Expr::Case {
                operand: operand.map(|o| Box::new(o.map(f))),
                branches: branches
                    .into_iter()
                    .map(|(c, r)| (c.map(f), r.map(f)))
                    .collect(),
                else_expr: else_expr.map(|e| Box::new(e.map(f))),
                pos,
            },
            Expr::Between {
                expr,
                negated,
                low,
                high,
                pos,
            } => Expr::Between {
                expr: Box::new(expr.map(f)),
                negated,
                low: Box::new(low.map(f)),
                high: Box::new(high.map(f)),
                pos,
            },
            Expr::In {
                expr,
                negated,
                set,
                pos,
            } => Expr::In {
                expr: Box::new(expr.map(f)),
                negated,
                set: match set {
                    InSet::List(list) => {
                        InSet::List(list.into_iter().map(|e| e.map(f)).collect())
                    }
                    InSet::Subquery(query) => InSet::Subquery(Box::new(query.map_exprs(f))),
                },
                pos,
            },
            Expr::Is {
                expr,
                negated,
                test,
                pos,
            } => Expr::Is {
                expr: Box::new(expr.map(f)),
                negated,
                test: match test {
                    IsTest::DistinctFrom(rhs) => IsTest::DistinctFrom(Box::new(rhs.map(f))),
                    other => other,
                },
                pos,
            },
            Expr::Exists {
                negated,
                subquery,
                pos,
            } => Expr::Exists {
                negated,
                subquery: Box::new(subquery.map_exprs(f)),
                pos,
            },
            Expr::Extract { field, source, pos } => Expr::Extract {
                field,
                source: Box::new(source.map(f)),
                pos,
            },
            Expr::Subquery { query, pos } => Expr::Subquery {
                query: Box::new(query.map_exprs(f)),
                pos,
            },
            leaf => leaf,
        };
        f(mapped)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    On(Expr),
    Using(Vec<String>),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableFactor {
    Table {
        name: String,
        alias: Option<String>,
    },
    Subquery {
        query: Box<SelectStmt>,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub relation: TableFactor,
    pub constraint: JoinConstraint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub relation: TableFactor,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub columns: Vec<String>,
    pub query: Box<SelectStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithClause {
    pub recursive: bool,
    pub ctes: Vec<Cte>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpKind {
    Union,
    UnionAll,
    Intersect,
    Except,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetOp {
    pub kind: SetOpKind,
    pub right: Box<SelectStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub with: Option<WithClause>,
    pub distinct: bool,
    pub columns: Vec<SelectItem>,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    /// Chained set operation; the right-hand side may chain further.
    pub set_op: Option<SetOp>,
    pub pos: Pos,
}

impl SelectStmt {
    /// Map every expression in the statement with [`Expr::map`].
    pub fn map_exprs(mut self, f: &mut impl FnMut(Expr) -> Expr) -> SelectStmt {
        for item in &mut self.columns {
            let expr = std::mem::replace(
                &mut item.expr,
                Expr::Literal {
                    value: Literal::Null,
                    pos: Pos::default(),
                },
            );
            item.expr = expr.map(f);
        }
        self.where_clause = self.where_clause.take().map(|w| w.map(f));
        self.having = self.having.take().map(|h| h.map(f));
        let group_by = std::mem::take(&mut self.group_by);
        self.group_by = group_by.into_iter().map(|g| g.map(f)).collect();
        for item in &mut self.order_by {
            let expr = std::mem::replace(
                &mut item.expr,
                Expr::Literal {
                    value: Literal::Null,
                    pos: Pos::default(),
                },
            );
            item.expr = expr.map(f);
        }
        for table_ref in &mut self.from {
            if let TableFactor::Subquery { query, .. } = &mut table_ref.relation {
                let inner = std::mem::replace(query, Box::new(SelectStmt::new(Pos::default())));
                *query = Box::new(inner.map_exprs(f));
            }
            for join in &mut table_ref.joins {
                if let JoinConstraint::On(on) = &mut join.constraint {
                    let expr = std::mem::replace(
                        on,
                        Expr::Literal {
                            value: Literal::Null,
                            pos: Pos::default(),
                        },
                    );
                    *on = expr.map(f);
                }
            }
        }
        if let Some(set_op) = self.set_op.take() {
            self.set_op = Some(SetOp {
                kind: set_op.kind,
                right: Box::new(set_op.right.map_exprs(f)),
            });
        }
        self
    }

    pub fn new(pos: Pos) -> SelectStmt {
        SelectStmt {
            with: None,
            distinct: false,
            columns: Vec::new(),
            from: Vec::new(),
            where_clause: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            set_op: None,
            pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Select(Box<SelectStmt>),
    DefaultValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConflictAction {
    DoNothing,
    DoUpdate {
        assignments: Vec<Assignment>,
        where_clause: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnConflict {
    /// Conflict-target column list; empty when unspecified.
    pub target: Vec<String>,
    pub action: ConflictAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    pub table: String,
    pub columns: Vec<String>,
    pub source: InsertSource,
    pub on_conflict: Option<OnConflict>,
    pub returning: Vec<SelectItem>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    pub table: String,
    pub alias: Option<String>,
    pub assignments: Vec<Assignment>,
    pub from: Vec<TableRef>,
    pub where_clause: Option<Expr>,
    pub returning: Vec<SelectItem>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    pub table: String,
    pub alias: Option<String>,
    pub using: Vec<TableRef>,
    pub where_clause: Option<Expr>,
    pub returning: Vec<SelectItem>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefAction {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    NoAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraint {
    PrimaryKey,
    NotNull,
    Null,
    Unique,
    Default(Expr),
    References {
        table: String,
        column: Option<String>,
        on_delete: Option<RefAction>,
    },
    Check(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: TypeName,
    pub constraints: Vec<ColumnConstraint>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraint {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    ForeignKey {
        columns: Vec<String>,
        ref_table: String,
        ref_columns: Vec<String>,
        on_delete: Option<RefAction>,
    },
    Check(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub if_not_exists: bool,
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub constraints: Vec<TableConstraint>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgMode {
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionArg {
    pub name: Option<String>,
    pub ty: TypeName,
    pub mode: ArgMode,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnType {
    Scalar(TypeName),
    Table(Vec<(String, TypeName)>),
    SetOf(TypeName),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volatility {
    Immutable,
    Stable,
    Volatile,
}

impl Volatility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Volatility::Immutable => "IMMUTABLE",
            Volatility::Stable => "STABLE",
            Volatility::Volatile => "VOLATILE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    Invoker,
    Definer,
}

impl Security {
    pub fn as_str(&self) -> &'static str {
        match self {
            Security::Invoker => "INVOKER",
            Security::Definer => "DEFINER",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateFunctionStmt {
    pub or_replace: bool,
    pub name: String,
    pub args: Vec<FunctionArg>,
    pub returns: ReturnType,
    pub language: String,
    pub volatility: Volatility,
    pub security: Security,
    /// Dollar-quoted body, verbatim.
    pub body: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexStmt {
    pub unique: bool,
    pub if_not_exists: bool,
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub pos: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Function,
    Index,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Index => "INDEX",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropStmt {
    pub kind: ObjectKind,
    pub if_exists: bool,
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Select(SelectStmt),
    Insert(InsertStmt),
    Update(UpdateStmt),
    Delete(DeleteStmt),
    CreateTable(CreateTableStmt),
    CreateFunction(CreateFunctionStmt),
    CreateIndex(CreateIndexStmt),
    Drop(DropStmt),
    Raw { sql: String, pos: Pos },
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Select(s) => s.pos,
            Stmt::Insert(s) => s.pos,
            Stmt::Update(s) => s.pos,
            Stmt::Delete(s) => s.pos,
            Stmt::CreateTable(s) => s.pos,
            Stmt::CreateFunction(s) => s.pos,
            Stmt::CreateIndex(s) => s.pos,
            Stmt::Drop(s) => s.pos,
            Stmt::Raw { pos, .. } => *pos,
        }
    }

    /// Table this statement targets, when it has a single unambiguous one.
    pub fn target_table(&self) -> Option<&str> {
        match self {
            Stmt::Insert(s) => Some(&s.table),
            Stmt::Update(s) => Some(&s.table),
            Stmt::Delete(s) => Some(&s.table),
            Stmt::Select(s) => match s.from.first().map(|t| &t.relation) {
                Some(TableFactor::Table { name, .. }) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }
}
