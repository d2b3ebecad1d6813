//! Validation rule grammar.
//!
//! A rule spec is either a `|` delimited string (`"required|integer|min:3"`)
//! or a list of atoms. Each atom becomes one [`Constraint`]; the input order is
//! kept so every downstream generator sees the same sequence.

use crate::error::{Error, Result};
use crate::type_mapper::guess_scalar;
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Type-carrying rule atoms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    Integer,
    Number,
    String,
    Boolean,
    Array,
    /// `file` and `image`
    File,
    Date,
    /// `date_format:*`
    DateTime,
    Email,
    Uuid,
    Url,
}

impl RuleType {
    pub fn schema_type(&self) -> &'static str {
        match self {
            RuleType::Integer => "integer",
            RuleType::Number => "number",
            RuleType::Boolean => "boolean",
            RuleType::Array => "array",
            RuleType::String
            | RuleType::File
            | RuleType::Date
            | RuleType::DateTime
            | RuleType::Email
            | RuleType::Uuid
            | RuleType::Url => "string",
        }
    }

    pub fn format(&self) -> Option<&'static str> {
        match self {
            RuleType::File => Some("binary"),
            RuleType::Date => Some("date"),
            RuleType::DateTime => Some("date-time"),
            RuleType::Email => Some("email"),
            RuleType::Uuid => Some("uuid"),
            RuleType::Url => Some("uri"),
            _ => None,
        }
    }

    fn from_atom(name: &str) -> Option<Self> {
        Some(match name {
            "integer" | "int" => RuleType::Integer,
            "numeric" => RuleType::Number,
            "string" => RuleType::String,
            "boolean" | "bool" => RuleType::Boolean,
            "array" => RuleType::Array,
            "file" | "image" => RuleType::File,
            "date" => RuleType::Date,
            "date_format" => RuleType::DateTime,
            "email" => RuleType::Email,
            "uuid" => RuleType::Uuid,
            "url" => RuleType::Url,
            _ => return None,
        })
    }
}

/// Direction of a `swagger_min` / `swagger_max` bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Min,
    Max,
}

/// `swagger_min:value[:fail]` or `swagger_max:value[:fail]`
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub kind: BoundKind,
    pub value: String,
    /// The bound is enforced instead of being descriptive only
    pub fail: bool,
}

impl Bound {
    fn parse(kind: BoundKind, payload: &str) -> Self {
        let mut parts = payload.split(':');
        let value = parts.next().unwrap_or_default().trim().to_string();
        let fail = parts.next().map(|p| p.trim() == "fail").unwrap_or(false);
        Self { kind, value, fail }
    }

    /// Check an incoming value against the bound.
    ///
    /// The value's native type is guessed (integer, float, boolean, string)
    /// and the bound is coerced to it before comparing. Without `fail` every
    /// value is accepted.
    pub fn accepts(&self, value: &str) -> bool {
        if !self.fail {
            return true;
        }

        let ordering = match guess_scalar(value) {
            Value::Number(n) => {
                let bound = self.value.trim().parse::<f64>().unwrap_or(0.0);
                n.as_f64().and_then(|v| v.partial_cmp(&bound))
            }
            Value::Bool(b) => {
                let bound = matches!(self.value.trim(), "true" | "1");
                Some(b.cmp(&bound))
            }
            Value::String(s) => Some(s.as_str().cmp(self.value.as_str())),
            _ => None,
        };

        match (self.kind, ordering) {
            (BoundKind::Min, Some(o)) => o != Ordering::Less,
            (BoundKind::Max, Some(o)) => o != Ordering::Greater,
            (_, None) => false,
        }
    }
}

/// One atomic rule
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Required,
    Nullable,
    Type(RuleType),
    In(Vec<String>),
    Min(String),
    Max(String),
    SwaggerDefault(String),
    SwaggerExample(String),
    SwaggerDescription(String),
    SwaggerRequired,
    SwaggerMin(Bound),
    SwaggerMax(Bound),
    Other { name: String, params: Vec<String> },
}

impl Constraint {
    fn parse(atom: &str) -> Self {
        let (name, payload) = match atom.split_once(':') {
            Some((name, payload)) => (name.trim(), Some(payload)),
            None => (atom.trim(), None),
        };

        if let Some(rule_type) = RuleType::from_atom(name) {
            return Constraint::Type(rule_type);
        }

        match (name, payload) {
            ("required", _) => Constraint::Required,
            ("nullable", _) => Constraint::Nullable,
            ("swagger_required", _) => Constraint::SwaggerRequired,
            ("in", Some(p)) => Constraint::In(split_params(p).into_iter().map(unquote).collect()),
            ("min", Some(p)) => Constraint::Min(p.trim().to_string()),
            ("max", Some(p)) => Constraint::Max(p.trim().to_string()),
            ("swagger_default", p) => Constraint::SwaggerDefault(p.unwrap_or_default().to_string()),
            ("swagger_example", p) => Constraint::SwaggerExample(p.unwrap_or_default().to_string()),
            ("swagger_description", p) => {
                Constraint::SwaggerDescription(p.unwrap_or_default().to_string())
            }
            ("swagger_min", Some(p)) => Constraint::SwaggerMin(Bound::parse(BoundKind::Min, p)),
            ("swagger_max", Some(p)) => Constraint::SwaggerMax(Bound::parse(BoundKind::Max, p)),
            (name, payload) => Constraint::Other {
                name: name.to_string(),
                params: payload.map(split_params).unwrap_or_default(),
            },
        }
    }
}

fn split_params(payload: &str) -> Vec<String> {
    payload.split(',').map(|p| p.trim().to_string()).collect()
}

fn unquote(value: String) -> String {
    value.trim_matches(|c: char| c == '"' || c == '\'').to_string()
}

/// Split a rule spec into constraints.
///
/// # Errors
///
/// Returns [`Error::MalformedRule`] when the spec is neither a string nor a
/// list of strings.
pub fn parse_rule(field: &str, spec: &Value) -> Result<Vec<Constraint>> {
    let malformed = || Error::MalformedRule {
        field: field.to_string(),
        rule: spec.to_string(),
    };

    match spec {
        Value::String(s) => Ok(s
            .split('|')
            .filter(|atom| !atom.trim().is_empty())
            .map(Constraint::parse)
            .collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(Constraint::parse).ok_or_else(malformed))
            .collect(),
        _ => Err(malformed()),
    }
}

/// Constraints attached to one dotted field path
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRules {
    pub field: String,
    pub constraints: Vec<Constraint>,
}

impl FieldRules {
    pub fn new(field: impl Into<String>, constraints: Vec<Constraint>) -> Self {
        Self {
            field: field.into(),
            constraints,
        }
    }

    /// `required` or `swagger_required`
    pub fn is_required(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::Required | Constraint::SwaggerRequired))
    }

    pub fn is_nullable(&self) -> bool {
        self.constraints.iter().any(|c| matches!(c, Constraint::Nullable))
    }

    /// First type-carrying atom
    pub fn rule_type(&self) -> Option<RuleType> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Type(t) => Some(*t),
            _ => None,
        })
    }

    /// Schema type; `string` when no atom carries a type
    pub fn schema_type(&self) -> &'static str {
        self.rule_type().map(|t| t.schema_type()).unwrap_or("string")
    }

    /// First format among atoms agreeing with [`FieldRules::schema_type`]
    pub fn format(&self) -> Option<&'static str> {
        let schema_type = self.schema_type();
        self.constraints.iter().find_map(|c| match c {
            Constraint::Type(t) if t.schema_type() == schema_type => t.format(),
            _ => None,
        })
    }

    pub fn enum_values(&self) -> Option<&[String]> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::In(values) => Some(values.as_slice()),
            _ => None,
        })
    }

    pub fn min(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Min(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn max(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Max(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn swagger_default(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::SwaggerDefault(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn swagger_example(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::SwaggerExample(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn swagger_description(&self) -> Option<&str> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::SwaggerDescription(v) => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn swagger_min(&self) -> Option<&Bound> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::SwaggerMin(b) => Some(b),
            _ => None,
        })
    }

    pub fn swagger_max(&self) -> Option<&Bound> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::SwaggerMax(b) => Some(b),
            _ => None,
        })
    }

    /// Run every enforced `swagger_min` / `swagger_max` bound against a value
    pub fn accepts(&self, value: &str) -> bool {
        self.swagger_min().map(|b| b.accepts(value)).unwrap_or(true)
            && self.swagger_max().map(|b| b.accepts(value)).unwrap_or(true)
    }
}

/// Ordered rules of one handler, keyed by dotted field path
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    fields: Vec<FieldRules>,
}

impl RuleSet {
    /// Parse every entry of a field → rule spec map, keeping map order.
    pub fn parse(rules: &Map<String, Value>) -> Result<Self> {
        let fields = rules
            .iter()
            .map(|(field, spec)| Ok(FieldRules::new(field.clone(), parse_rule(field, spec)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fields })
    }

    pub fn from_fields(fields: Vec<FieldRules>) -> Self {
        Self { fields }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldRules> {
        self.fields.iter()
    }

    pub fn get(&self, field: &str) -> Option<&FieldRules> {
        self.fields.iter().find(|f| f.field == field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}
