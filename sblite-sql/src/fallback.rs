//! Pattern-based fallback translator. Strictly second to the AST path: the
//! pipeline reaches it for function bodies and for statements the parser
//! cannot handle. Rules apply in a fixed order: function renames
//! (longest name first), operators, types, boolean literals, ON CONFLICT.
//!
//! Known limitation: this layer cannot tell SQL tokens from string-literal
//! contents, so `TRUE` inside a string is lowered too. Callers that care must
//! use the AST path.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::TranslateError;
use crate::mapper::{GEN_UUID_DEFAULT_SENTINEL, GEN_UUID_SQL, NOW_SQL};
use crate::token::Pos;

static UNTRANSLATABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bUNNEST\s*\(|\bLATERAL\b|\bFOR\s+UPDATE\b|\bFOR\s+SHARE\b").unwrap());

/// Constructs no regex chain can translate; callers should fall through to
/// the AST path or surface an unsupported-feature error.
pub fn is_untranslatable(sql: &str) -> bool {
    UNTRANSLATABLE.is_match(sql)
}

struct Rule {
    pattern: Lazy<Regex>,
    replacement: &'static str,
}

macro_rules! rule {
    ($pattern:expr, $replacement:expr) => {
        Rule {
            pattern: Lazy::new(|| Regex::new($pattern).unwrap()),
            replacement: $replacement,
        }
    };
}

/// Function renames, longest name first so prefixes never collide.
static FUNCTION_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule!(r"(?i)\bCURRENT_TIMESTAMP\b(\s*\(\s*\))?", NOW_SQL),
        rule!(r"(?i)\bCHARACTER_LENGTH\s*\(", "LENGTH("),
        rule!(r"(?i)\buuid_generate_v4\s*\(\s*\)", GEN_UUID_SQL),
        rule!(r"(?i)\bgen_random_uuid\s*\(\s*\)", GEN_UUID_SQL),
        rule!(r"(?i)\bCURRENT_DATE\b", "date('now')"),
        rule!(r"(?i)\bCURRENT_TIME\b", "time('now')"),
        rule!(r"(?i)\bCHAR_LENGTH\s*\(", "LENGTH("),
        rule!(r"(?i)\bSTRING_AGG\s*\(", "GROUP_CONCAT("),
        rule!(r"(?i)\bGREATEST\s*\(", "MAX("),
        rule!(r"(?i)\bCEILING\s*\(", "CEIL("),
        rule!(r"(?i)\bLEAST\s*\(", "MIN("),
        rule!(r"(?i)\bNOW\s*\(\s*\)", NOW_SQL),
    ]
});

/// Operator rewrites: TEXT-affinity casts vanish, ILIKE lowers to LIKE.
static OPERATOR_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule!(
            r"(?i)::\s*(uuid|text|citext|varchar(\s*\(\s*\d+\s*\))?|char(\s*\(\s*\d+\s*\))?|timestamptz|timestamp|jsonb|json|date|time)\b",
            ""
        ),
        // remaining casts (integer, numeric, ...) have no textual CAST form here;
        // stripping them leans on SQLite type affinity
        rule!(r"::\s*[A-Za-z_]\w*(\s*\(\s*\d+(\s*,\s*\d+)?\s*\))?", ""),
        rule!(r"(?i)\bILIKE\b", "LIKE"),
    ]
});

/// DDL type rewrites. Longer names first (`TIMESTAMPTZ` before `TIMESTAMP`,
/// `BIGSERIAL` before `SERIAL`).
static TYPE_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule!(r"(?i)\bTIMESTAMPTZ\b", "TEXT"),
        rule!(r"(?i)\bTIMESTAMP\s+WITH\s+TIME\s+ZONE\b", "TEXT"),
        rule!(r"(?i)\bTIMESTAMP\b", "TEXT"),
        rule!(r"(?i)\bSMALLSERIAL\b", "INTEGER"),
        rule!(r"(?i)\bBIGSERIAL\b", "INTEGER"),
        rule!(r"(?i)\bSERIAL\b", "INTEGER"),
        rule!(r"(?i)\bVARCHAR\s*\(\s*\d+\s*\)", "TEXT"),
        rule!(r"(?i)\bVARCHAR\b", "TEXT"),
        rule!(r"(?i)\bBOOLEAN\b", "INTEGER"),
        rule!(r"(?i)\bBOOL\b", "INTEGER"),
        rule!(r"(?i)\bJSONB\b", "TEXT"),
        rule!(r"(?i)\bJSON\b", "TEXT"),
        rule!(r"(?i)\bBYTEA\b", "BLOB"),
        rule!(r"(?i)\bUUID\b", "TEXT"),
    ]
});

/// Boolean literal lowering; applies even inside string literals (documented
/// best-effort behavior of the regex path).
static BOOLEAN_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule!(r"(?i)\bTRUE\b", "1"),
        rule!(r"(?i)\bFALSE\b", "0"),
    ]
});

static ON_CONFLICT_NOTHING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+ON\s+CONFLICT(\s*\([^)]*\))?\s+DO\s+NOTHING").unwrap());
static INSERT_INTO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*INSERT\s+INTO\b").unwrap());

static DEFAULT_UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bDEFAULT\s+(gen_random_uuid|uuid_generate_v4)\s*\(\s*\)").unwrap()
});

/// Pre-filter for CREATE TABLE: replace `DEFAULT gen_random_uuid()` with the
/// sentinel before the statement reaches the engine. The runtime substitutes
/// a real UUID at INSERT time.
pub fn strip_uuid_defaults(sql: &str) -> String {
    DEFAULT_UUID
        .replace_all(sql, format!("DEFAULT {GEN_UUID_DEFAULT_SENTINEL}").as_str())
        .to_string()
}

fn apply_rules(sql: String, rules: &[Rule]) -> String {
    let mut out = sql;
    for rule in rules {
        out = rule.pattern.replace_all(&out, rule.replacement).to_string();
    }
    out
}

/// Translate PostgreSQL SQL to SQLite SQL by rule chain.
pub fn translate(sql: &str) -> Result<String, TranslateError> {
    if is_untranslatable(sql) {
        return Err(TranslateError::unsupported(
            "construct requires the AST translation path",
            Pos::start(),
        ));
    }

    // uuid defaults must be hidden before the function rules expand them
    let mut out = strip_uuid_defaults(sql);
    out = apply_rules(out, &FUNCTION_RULES);
    out = apply_rules(out, &OPERATOR_RULES);
    out = apply_rules(out, &TYPE_RULES);
    out = apply_rules(out, &BOOLEAN_RULES);

    if let Some(found) = ON_CONFLICT_NOTHING.find(&out) {
        let range = found.range();
        out.replace_range(range, "");
        out = INSERT_INTO.replace(&out, "INSERT OR IGNORE INTO").to_string();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untranslatable_detection() {
        assert!(is_untranslatable("SELECT * FROM unnest(ARRAY[1,2])"));
        assert!(is_untranslatable("SELECT * FROM a, LATERAL (SELECT 1) b"));
        assert!(is_untranslatable("SELECT * FROM t FOR UPDATE"));
        assert!(is_untranslatable("SELECT * FROM t FOR SHARE"));
        assert!(!is_untranslatable("SELECT * FROM t"));
        assert!(translate("SELECT * FROM t FOR UPDATE").is_err());
    }

    #[test]
    fn function_renames() {
        assert_eq!(
            translate("SELECT NOW()").unwrap(),
            format!("SELECT {NOW_SQL}")
        );
        assert_eq!(
            translate("SELECT CURRENT_TIMESTAMP").unwrap(),
            format!("SELECT {NOW_SQL}")
        );
        assert_eq!(
            translate("SELECT STRING_AGG(a, ',') FROM t").unwrap(),
            "SELECT GROUP_CONCAT(a, ',') FROM t"
        );
        assert_eq!(
            translate("SELECT GREATEST(a, b), LEAST(c, d) FROM t").unwrap(),
            "SELECT MAX(a, b), MIN(c, d) FROM t"
        );
    }

    #[test]
    fn rename_order_avoids_prefix_collisions() {
        // CURRENT_TIMESTAMP must not be mangled by a CURRENT_TIME rewrite
        let out = translate("SELECT CURRENT_TIMESTAMP, CURRENT_TIME").unwrap();
        assert!(out.contains(NOW_SQL));
        assert!(out.contains("time('now')"));
        assert!(!out.contains("time('now')STAMP"));
    }

    #[test]
    fn cast_stripping() {
        assert_eq!(
            translate("SELECT id::uuid FROM users").unwrap(),
            "SELECT id FROM users"
        );
        assert_eq!(
            translate("SELECT a::varchar(20) FROM t").unwrap(),
            "SELECT a FROM t"
        );
    }

    #[test]
    fn type_rewrites() {
        assert_eq!(
            translate("CREATE TABLE t (id UUID, at TIMESTAMPTZ, ok BOOLEAN, n BIGSERIAL)")
                .unwrap(),
            "CREATE TABLE t (id TEXT, at TEXT, ok INTEGER, n INTEGER)"
        );
    }

    #[test]
    fn boolean_lowering_applies_everywhere() {
        assert_eq!(
            translate("SELECT * FROM t WHERE ok = TRUE").unwrap(),
            "SELECT * FROM t WHERE ok = 1"
        );
        // documented best-effort limitation: string contents are not spared
        assert_eq!(translate("SELECT 'TRUE'").unwrap(), "SELECT '1'");
    }

    #[test]
    fn on_conflict_do_nothing() {
        assert_eq!(
            translate("INSERT INTO users (email) VALUES ('a@b.c') ON CONFLICT DO NOTHING")
                .unwrap(),
            "INSERT OR IGNORE INTO users (email) VALUES ('a@b.c')"
        );
        assert_eq!(
            translate("INSERT INTO t (id) VALUES (1) ON CONFLICT (id) DO NOTHING").unwrap(),
            "INSERT OR IGNORE INTO t (id) VALUES (1)"
        );
    }

    #[test]
    fn uuid_default_stripped_before_expansion() {
        let out =
            translate("CREATE TABLE t (id UUID DEFAULT gen_random_uuid(), n TEXT)").unwrap();
        assert!(out.contains("DEFAULT gen_uuid()"));
        assert!(!out.contains("randomblob"));
    }

    #[test]
    fn uuid_in_values_is_expanded() {
        let out = translate("INSERT INTO t (id) VALUES (gen_random_uuid())").unwrap();
        assert!(out.contains("randomblob(4)"));
    }
}
