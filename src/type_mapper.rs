//! Native and storage type mapping.
//!
//! Two independent lookups: [`map_native_type`] for language-level type names
//! (dynamic-language hints as well as Rust types) and [`map_column_type`] for
//! database column types. Neither fails; anything unknown is a `string`.

use chrono::Local;
use serde_json::{Number, Value};

/// Schema type and format of a database column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnType {
    pub schema_type: &'static str,
    pub format: Option<&'static str>,
}

impl ColumnType {
    const fn new(schema_type: &'static str, format: Option<&'static str>) -> Self {
        Self { schema_type, format }
    }
}

/// Map a type name to one of `integer`, `number`, `string`, `boolean`,
/// `array`, `object` or `null`.
pub fn map_native_type(name: &str) -> &'static str {
    let name = name.trim().trim_start_matches('?').trim_start_matches('&').trim();

    if name.is_empty() {
        return "string";
    }
    if name == "()" {
        return "null";
    }
    if name.starts_with('[') {
        return "array";
    }

    // Generic wrappers: `Option<T>` maps like `T`, containers by their kind.
    if let Some(open) = name.find('<') {
        let outer = name[..open].rsplit("::").next().unwrap_or_default();
        return match outer {
            "Option" | "Box" | "Rc" | "Arc" => {
                let inner = name[open + 1..].trim_end_matches('>');
                map_native_type(inner)
            }
            "Vec" | "VecDeque" | "HashSet" | "BTreeSet" => "array",
            "HashMap" | "BTreeMap" | "IndexMap" => "object",
            _ => "string",
        };
    }

    let last = name.rsplit("::").next().unwrap_or(name);
    match last.to_lowercase().as_str() {
        "int" | "integer" | "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16"
        | "u32" | "u64" | "u128" | "usize" => "integer",
        "float" | "double" | "number" | "f32" | "f64" => "number",
        "string" | "str" | "char" => "string",
        "bool" | "boolean" => "boolean",
        "array" | "vec" => "array",
        "object" | "mixed" | "map" | "value" => "object",
        "null" => "null",
        _ => "string",
    }
}

/// Whether a type name is a language-level scalar or container rather than
/// a class that deserves its own schema.
pub fn is_native_type(name: &str) -> bool {
    let name = name.trim().trim_start_matches('?').trim_start_matches('&').trim();
    if name.is_empty() || name == "()" || name.starts_with('[') || name.contains('<') {
        return true;
    }
    let last = name.rsplit(|c: char| c == '\\' || c == ':').next().unwrap_or(name);
    matches!(
        last.to_lowercase().as_str(),
        "int" | "integer" | "i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16"
            | "u32" | "u64" | "u128" | "usize" | "float" | "double" | "number" | "f32" | "f64"
            | "string" | "str" | "char" | "bool" | "boolean" | "array" | "vec" | "object"
            | "mixed" | "null" | "void" | "iterable" | "callable" | "value"
    )
}

/// Map a database column type to its schema type and format.
///
/// Lookups are case-insensitive; unknown types map to `string`.
pub fn map_column_type(name: &str) -> ColumnType {
    match name.trim().to_lowercase().as_str() {
        "smallint" | "integer" | "int" | "tinyint" | "mediumint" | "serial" => {
            ColumnType::new("integer", Some("int32"))
        }
        "bigint" | "bigserial" => ColumnType::new("integer", Some("int64")),
        "year" => ColumnType::new("integer", None),
        "decimal" | "float" => ColumnType::new("number", Some("float")),
        "double" | "real" => ColumnType::new("number", Some("double")),
        "string" | "text" | "guid" | "ascii_string" | "varchar" | "char" => {
            ColumnType::new("string", None)
        }
        "date" | "date_immutable" => ColumnType::new("string", Some("date")),
        "time" | "time_immutable" => ColumnType::new("string", Some("time")),
        "datetime" | "datetimetz" | "datetime_immutable" | "datetimetz_immutable" | "timestamp"
        | "timestamptz" => ColumnType::new("string", Some("date-time")),
        "binary" | "blob" => ColumnType::new("object", Some("binary")),
        "json" | "jsonb" | "object" => ColumnType::new("object", None),
        "array" | "simple_array" | "simple-array" => ColumnType::new("array", None),
        "boolean" | "bool" => ColumnType::new("boolean", None),
        _ => ColumnType::new("string", None),
    }
}

/// Generate an example for a schema type and format.
///
/// Arrays, objects, binary payloads and unknown types get none.
pub fn example_for(schema_type: &str, format: Option<&str>) -> Option<Value> {
    match (schema_type, format) {
        ("integer", Some("int64")) => Some(Value::from(1_000_000_000_000_000_000_i64)),
        ("integer", Some("int32")) => Some(Value::from(1_000_000_000_i64)),
        ("integer", _) => Some(Value::from(1)),
        ("number", _) => Some(Value::from(0.5)),
        ("boolean", _) => Some(Value::Bool(true)),
        ("string", Some("date")) => Some(Value::String(Local::now().format("%Y-%m-%d").to_string())),
        ("string", Some("time")) => Some(Value::String(Local::now().format("%H:%M:%S").to_string())),
        ("string", Some("date-time")) => Some(Value::String(
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        )),
        ("string", Some("email")) => Some(Value::from("user@example.com")),
        ("string", Some("uuid")) => Some(Value::from("3fa85f64-5717-4562-b3fc-2c963f66afa6")),
        ("string", Some("uri")) => Some(Value::from("https://example.com")),
        ("string", Some("binary")) => None,
        ("string", _) => Some(Value::from("string")),
        _ => None,
    }
}

/// Guess the native type of a raw string: integer, float, boolean or string.
pub fn guess_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);

    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        if digits.contains('.') {
            if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
                return Value::Number(n);
            }
        } else if let Ok(n) = trimmed.parse::<i64>() {
            return Value::from(n);
        }
    }

    match trimmed {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(trimmed.to_string()),
    }
}

/// Coerce a raw directive payload to a schema type.
///
/// Payloads that cannot be read as the target type stay strings.
pub fn coerce_value(raw: &str, schema_type: &str) -> Value {
    match schema_type {
        "integer" | "number" => match guess_scalar(raw) {
            n @ Value::Number(_) => n,
            _ => Value::String(raw.to_string()),
        },
        "boolean" => match raw.trim() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        "array" => {
            if let Ok(list @ Value::Array(_)) = serde_json::from_str::<Value>(raw) {
                return list;
            }
            Value::Array(raw.split(',').map(guess_scalar).collect())
        }
        "object" => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
        "string" => Value::String(raw.to_string()),
        _ => guess_scalar(raw),
    }
}

/// Coerce an explicit example only when its native type disagrees with the
/// schema type.
pub fn coerce_example(value: Value, schema_type: &str) -> Value {
    match (value, schema_type) {
        (Value::String(s), "integer" | "number" | "boolean") => coerce_value(&s, schema_type),
        (Value::Number(n), "string") => Value::String(n.to_string()),
        (Value::Bool(b), "string") => Value::String(b.to_string()),
        (value, _) => value,
    }
}
