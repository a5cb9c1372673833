//! Bidirectional function and type mapping tables between the PostgreSQL and
//! SQLite dialects. Function lookup is case-insensitive; transformers receive
//! the already-emitted argument SQL.

/// Canonical SQLite spelling of `NOW()` / `CURRENT_TIMESTAMP`. Both the AST
/// generator and the regex fallback emit exactly this form.
pub const NOW_SQL: &str = "strftime('%Y-%m-%d %H:%M:%f+00', 'now')";

/// RFC-4122 v4 UUID as a SQLite expression: version nibble fixed to `4`,
/// variant nibble drawn from `{8,9,a,b}`.
pub const GEN_UUID_SQL: &str = "(lower(hex(randomblob(4))) || '-' || \
lower(hex(randomblob(2))) || '-4' || \
substr(lower(hex(randomblob(2))), 2) || '-' || \
substr('89ab', (abs(random()) % 4) + 1, 1) || \
substr(lower(hex(randomblob(2))), 2) || '-' || \
lower(hex(randomblob(6))))";

/// Placeholder emitted for `gen_random_uuid()` inside a column DEFAULT.
/// SQLite rejects the subquery-bearing UUID expression there; the runtime
/// substitutes a real UUID at INSERT time.
pub const GEN_UUID_DEFAULT_SENTINEL: &str = "gen_uuid()";

type Transformer = fn(&[String]) -> Result<String, String>;

pub enum FnMap {
    Rename(&'static str),
    Transform(Transformer),
}

fn arity(args: &[String], expected: usize, name: &str) -> Result<(), String> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "{name} expects {expected} arguments, got {}",
            args.len()
        ))
    }
}

fn now_transform(_args: &[String]) -> Result<String, String> {
    Ok(NOW_SQL.to_string())
}

fn current_date_transform(_args: &[String]) -> Result<String, String> {
    Ok("date('now')".to_string())
}

fn current_time_transform(_args: &[String]) -> Result<String, String> {
    Ok("time('now')".to_string())
}

fn gen_uuid_transform(_args: &[String]) -> Result<String, String> {
    Ok(GEN_UUID_SQL.to_string())
}

fn left_transform(args: &[String]) -> Result<String, String> {
    arity(args, 2, "LEFT")?;
    Ok(format!("SUBSTR({}, 1, {})", args[0], args[1]))
}

fn right_transform(args: &[String]) -> Result<String, String> {
    arity(args, 2, "RIGHT")?;
    Ok(format!("SUBSTR({}, -{})", args[0], args[1]))
}

fn concat_transform(args: &[String]) -> Result<String, String> {
    if args.is_empty() {
        return Err("CONCAT expects at least one argument".to_string());
    }
    Ok(format!("({})", args.join(" || ")))
}

fn concat_ws_transform(args: &[String]) -> Result<String, String> {
    if args.len() < 2 {
        return Err("CONCAT_WS expects a separator and at least one value".to_string());
    }
    let sep = &args[0];
    let joined = args[1..]
        .iter()
        .map(|a| format!("COALESCE({a}, '')"))
        .collect::<Vec<_>>()
        .join(&format!(" || {sep} || "));
    Ok(format!("({joined})"))
}

fn age_transform(args: &[String]) -> Result<String, String> {
    arity(args, 1, "AGE")?;
    Ok(format!("(julianday('now') - julianday({}))", args[0]))
}

const PG_TO_SQLITE: &[(&str, FnMap)] = &[
    ("NOW", FnMap::Transform(now_transform)),
    ("CURRENT_TIMESTAMP", FnMap::Transform(now_transform)),
    ("CURRENT_DATE", FnMap::Transform(current_date_transform)),
    ("CURRENT_TIME", FnMap::Transform(current_time_transform)),
    ("GEN_RANDOM_UUID", FnMap::Transform(gen_uuid_transform)),
    ("UUID_GENERATE_V4", FnMap::Transform(gen_uuid_transform)),
    ("LEFT", FnMap::Transform(left_transform)),
    ("RIGHT", FnMap::Transform(right_transform)),
    ("STRING_AGG", FnMap::Rename("GROUP_CONCAT")),
    ("GREATEST", FnMap::Rename("MAX")),
    ("LEAST", FnMap::Rename("MIN")),
    ("CONCAT", FnMap::Transform(concat_transform)),
    ("CONCAT_WS", FnMap::Transform(concat_ws_transform)),
    ("AGE", FnMap::Transform(age_transform)),
    ("CEILING", FnMap::Rename("CEIL")),
    ("CHAR_LENGTH", FnMap::Rename("LENGTH")),
    ("CHARACTER_LENGTH", FnMap::Rename("LENGTH")),
];

fn instr_reverse(args: &[String]) -> Result<String, String> {
    arity(args, 2, "INSTR")?;
    Ok(format!("POSITION({} IN {})", args[1], args[0]))
}

fn strftime_reverse(args: &[String]) -> Result<String, String> {
    if args.len() == 2 && args[0] == "'%Y-%m-%d %H:%M:%f+00'" && args[1] == "'now'" {
        Ok("NOW()".to_string())
    } else {
        Ok(format!("STRFTIME({})", args.join(", ")))
    }
}

fn date_reverse(args: &[String]) -> Result<String, String> {
    if args.len() == 1 && args[0] == "'now'" {
        Ok("CURRENT_DATE".to_string())
    } else {
        Ok(format!("DATE({})", args.join(", ")))
    }
}

fn time_reverse(args: &[String]) -> Result<String, String> {
    if args.len() == 1 && args[0] == "'now'" {
        Ok("CURRENT_TIME".to_string())
    } else {
        Ok(format!("TIME({})", args.join(", ")))
    }
}

const SQLITE_TO_PG: &[(&str, FnMap)] = &[
    ("GROUP_CONCAT", FnMap::Rename("STRING_AGG")),
    ("IFNULL", FnMap::Rename("COALESCE")),
    ("INSTR", FnMap::Transform(instr_reverse)),
    ("STRFTIME", FnMap::Transform(strftime_reverse)),
    ("DATE", FnMap::Transform(date_reverse)),
    ("TIME", FnMap::Transform(time_reverse)),
];

fn lookup(table: &'static [(&str, FnMap)], name: &str) -> Option<&'static FnMap> {
    table
        .iter()
        .find(|(entry, _)| entry.eq_ignore_ascii_case(name))
        .map(|(_, mapping)| mapping)
}

pub fn pg_function(name: &str) -> Option<&'static FnMap> {
    lookup(PG_TO_SQLITE, name)
}

pub fn sqlite_function(name: &str) -> Option<&'static FnMap> {
    lookup(SQLITE_TO_PG, name)
}

/// SQLite column type for a PostgreSQL type name. Arrays store as JSON text;
/// unknown types default to TEXT.
pub fn pg_type_to_sqlite(name: &str, array: bool) -> &'static str {
    if array {
        return "TEXT";
    }
    match name.to_ascii_uppercase().as_str() {
        "BOOLEAN" | "BOOL" | "SMALLINT" | "INT" | "INT2" | "INT4" | "INT8" | "INTEGER"
        | "BIGINT" | "SERIAL" | "BIGSERIAL" | "SMALLSERIAL" => "INTEGER",
        "BYTEA" | "BLOB" => "BLOB",
        "NUMERIC" | "DECIMAL" => "NUMERIC",
        "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" => "REAL",
        _ => "TEXT",
    }
}

/// Target of a `::type` / `CAST` in the SQLite dialect. `None` means the cast
/// is dropped entirely (SQLite TEXT affinity makes it a no-op).
pub fn sqlite_cast_target(name: &str) -> Option<&'static str> {
    match name.to_ascii_uppercase().as_str() {
        "BOOLEAN" | "BOOL" | "SMALLINT" | "INT" | "INT2" | "INT4" | "INT8" | "INTEGER"
        | "BIGINT" => Some("INTEGER"),
        "BYTEA" | "BLOB" => Some("BLOB"),
        "NUMERIC" | "DECIMAL" => Some("NUMERIC"),
        "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" => Some("REAL"),
        _ => None,
    }
}

/// PostgreSQL type for a SQLite storage class, used by migration export.
pub fn sqlite_type_to_pg(storage_class: &str) -> &'static str {
    match storage_class.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT" => "BIGINT",
        "REAL" => "DOUBLE PRECISION",
        "BLOB" => "BYTEA",
        "NUMERIC" => "NUMERIC",
        _ => "TEXT",
    }
}

/// strftime format for an `EXTRACT` field.
pub fn extract_format(field: &str) -> Option<&'static str> {
    match field.to_ascii_lowercase().as_str() {
        "year" => Some("%Y"),
        "month" => Some("%m"),
        "day" => Some("%d"),
        "hour" => Some("%H"),
        "minute" => Some("%M"),
        "second" => Some("%S"),
        _ => None,
    }
}

/// Singular interval unit for the SQLite `'+N unit'` modifier form.
pub fn singular_interval_unit(unit: &str) -> String {
    let lower = unit.to_ascii_lowercase();
    lower.strip_suffix('s').unwrap_or(&lower).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(mapping: &FnMap, args: &[&str]) -> String {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        match mapping {
            FnMap::Rename(name) => format!("{name}({})", args.join(", ")),
            FnMap::Transform(f) => f(&args).unwrap(),
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(pg_function("now").is_some());
        assert!(pg_function("NOW").is_some());
        assert!(pg_function("Greatest").is_some());
        assert!(pg_function("no_such_function").is_none());
    }

    #[test]
    fn now_maps_to_canonical_strftime() {
        assert_eq!(apply(pg_function("NOW").unwrap(), &[]), NOW_SQL);
    }

    #[test]
    fn left_and_right() {
        assert_eq!(
            apply(pg_function("LEFT").unwrap(), &["name", "3"]),
            "SUBSTR(name, 1, 3)"
        );
        assert_eq!(
            apply(pg_function("RIGHT").unwrap(), &["name", "3"]),
            "SUBSTR(name, -3)"
        );
    }

    #[test]
    fn concat_family() {
        assert_eq!(
            apply(pg_function("CONCAT").unwrap(), &["a", "b", "c"]),
            "(a || b || c)"
        );
        assert_eq!(
            apply(pg_function("CONCAT_WS").unwrap(), &["'-'", "a", "b"]),
            "(COALESCE(a, '') || '-' || COALESCE(b, ''))"
        );
    }

    #[test]
    fn age_uses_julianday() {
        assert_eq!(
            apply(pg_function("AGE").unwrap(), &["t"]),
            "(julianday('now') - julianday(t))"
        );
    }

    #[test]
    fn arity_errors_are_reported() {
        let FnMap::Transform(f) = pg_function("LEFT").unwrap() else {
            panic!("LEFT should be a transform");
        };
        assert!(f(&["only_one".to_string()]).is_err());
    }

    #[test]
    fn reverse_entries() {
        assert_eq!(
            apply(sqlite_function("instr").unwrap(), &["s", "sub"]),
            "POSITION(sub IN s)"
        );
        assert_eq!(
            apply(
                sqlite_function("strftime").unwrap(),
                &["'%Y-%m-%d %H:%M:%f+00'", "'now'"]
            ),
            "NOW()"
        );
        assert_eq!(apply(sqlite_function("date").unwrap(), &["'now'"]), "CURRENT_DATE");
    }

    #[test]
    fn type_mapping() {
        assert_eq!(pg_type_to_sqlite("uuid", false), "TEXT");
        assert_eq!(pg_type_to_sqlite("TIMESTAMPTZ", false), "TEXT");
        assert_eq!(pg_type_to_sqlite("boolean", false), "INTEGER");
        assert_eq!(pg_type_to_sqlite("bigserial", false), "INTEGER");
        assert_eq!(pg_type_to_sqlite("bytea", false), "BLOB");
        assert_eq!(pg_type_to_sqlite("numeric", false), "NUMERIC");
        assert_eq!(pg_type_to_sqlite("double precision", false), "REAL");
        assert_eq!(pg_type_to_sqlite("tsvector", false), "TEXT");
        assert_eq!(pg_type_to_sqlite("integer", true), "TEXT");
    }

    #[test]
    fn cast_targets() {
        assert_eq!(sqlite_cast_target("uuid"), None);
        assert_eq!(sqlite_cast_target("text"), None);
        assert_eq!(sqlite_cast_target("int"), Some("INTEGER"));
        assert_eq!(sqlite_cast_target("numeric"), Some("NUMERIC"));
    }

    #[test]
    fn extract_formats() {
        assert_eq!(extract_format("YEAR"), Some("%Y"));
        assert_eq!(extract_format("second"), Some("%S"));
        assert_eq!(extract_format("century"), None);
    }

    #[test]
    fn interval_units_singularized() {
        assert_eq!(singular_interval_unit("days"), "day");
        assert_eq!(singular_interval_unit("day"), "day");
        assert_eq!(singular_interval_unit("Months"), "month");
    }

    #[test]
    fn uuid_expression_shape() {
        assert!(GEN_UUID_SQL.contains("randomblob(4)"));
        assert!(GEN_UUID_SQL.contains("'-4'"));
        assert!(GEN_UUID_SQL.contains("'89ab'"));
        assert!(GEN_UUID_SQL.contains("randomblob(6)"));
    }
}
