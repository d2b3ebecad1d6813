//! Doc-comment annotation parsing.
//!
//! Handler and schema doc-comments carry a summary, a description and tags
//! such as `@deprecated`, `@Request(...)`, `@Response(...)`, `@Schema(...)` and
//! `@Property(...)`. Tag bodies use one of two grammars:
//!
//! - a JSON object, selected when the body starts with `{` and ends with `}`;
//! - `key: value` entries, one per line. A top-level comma also starts a new
//!   entry when the text after it opens with `key:`; any other comma belongs
//!   to the current value.
//!
//! ```text
//! /**
//!  * Show a user
//!  *
//!  * Returns the user with the given id.
//!  *
//!  * @Request(
//!  *     summary: Show user,
//!  *     tags: [Users, Accounts]
//!  * )
//!  * @Response(code: 200, description: "The user", ref: User)
//!  */
//! ```

use crate::builders::SchemaBuilderRegistry;
use crate::document::{schema_ref_path, Schema};
use crate::error::{Error, Result};
use crate::type_mapper::guess_scalar;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static ENTRY_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*["']?[A-Za-z_$][\w.\-$]*["']?\s*:"#).expect("entry key regex should be valid")
});

static BUILDER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z]\w*)\(([A-Za-z]\w*)\)").expect("builder call regex should be valid")
});

/// One `@Name` or `@Name(body)` tag
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    /// Text between the outer parentheses
    pub body: Option<String>,
}

/// A parsed doc-comment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocBlock {
    pub summary: String,
    pub description: String,
    pub tags: Vec<Tag>,
}

impl DocBlock {
    /// Parse a raw doc-comment.
    ///
    /// Accepts `/** ... */` blocks as well as `///` and `//!` line comments;
    /// text that has already been stripped of comment markers works too.
    pub fn parse(raw: &str) -> Self {
        let lines: Vec<String> = raw.lines().map(strip_comment_markers).collect();

        let mut prose: Vec<&str> = Vec::new();
        let mut tags = Vec::new();
        let mut pending: Option<(String, String)> = None;
        let mut seen_tag = false;

        for line in &lines {
            if let Some((name, mut buffer)) = pending.take() {
                buffer.push('\n');
                buffer.push_str(line);
                match find_closing_paren(&buffer) {
                    Some(end) => tags.push(Tag {
                        name,
                        body: Some(buffer[1..end].to_string()),
                    }),
                    None => pending = Some((name, buffer)),
                }
                continue;
            }

            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix('@') {
                seen_tag = true;
                let name_len = rest
                    .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '\\'))
                    .unwrap_or(rest.len());
                let name = rest[..name_len].to_string();
                if name.is_empty() {
                    continue;
                }

                let after = &rest[name_len..];
                if after.starts_with('(') {
                    match find_closing_paren(after) {
                        Some(end) => tags.push(Tag {
                            name,
                            body: Some(after[1..end].to_string()),
                        }),
                        None => pending = Some((name, after.to_string())),
                    }
                } else {
                    tags.push(Tag { name, body: None });
                }
                continue;
            }

            if !seen_tag {
                prose.push(line.as_str());
            }
        }

        // Unterminated body: keep whatever was collected
        if let Some((name, buffer)) = pending {
            tags.push(Tag {
                name,
                body: Some(buffer[1..].to_string()),
            });
        }

        let (summary, description) = split_prose(&prose);
        Self {
            summary,
            description,
            tags,
        }
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }

    pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.tags.iter().filter(move |t| t.name == name)
    }

    pub fn first_tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }
}

fn strip_comment_markers(line: &str) -> String {
    let mut line = line.trim();
    for prefix in ["/**", "/*", "//!", "///"] {
        if let Some(rest) = line.strip_prefix(prefix) {
            line = rest;
            break;
        }
    }
    if let Some(rest) = line.strip_suffix("*/") {
        line = rest;
    }
    let line = line.trim_start();
    let line = line.strip_prefix('*').unwrap_or(line);
    line.strip_prefix(' ').unwrap_or(line).trim_end().to_string()
}

fn split_prose(lines: &[&str]) -> (String, String) {
    let mut paragraphs: Vec<Vec<&str>> = vec![Vec::new()];
    for line in lines {
        if line.trim().is_empty() {
            if paragraphs.last().map(|p| !p.is_empty()).unwrap_or(false) {
                paragraphs.push(Vec::new());
            }
        } else if let Some(current) = paragraphs.last_mut() {
            current.push(line.trim());
        }
    }
    paragraphs.retain(|p| !p.is_empty());

    let mut iter = paragraphs.into_iter();
    let summary = iter.next().map(|p| p.join(" ")).unwrap_or_default();
    let description = iter.map(|p| p.join("\n")).collect::<Vec<_>>().join("\n\n");
    (summary, description)
}

/// Byte index of the `)` closing the `(` at the start of `text`.
///
/// Parentheses inside double-quoted strings are ignored.
fn find_closing_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

/// Summary, description, deprecation flag and one tag's parsed body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentProperties {
    pub deprecated: bool,
    pub summary: String,
    pub description: String,
    pub meta: Map<String, Value>,
}

/// Extract comment properties, with `meta` taken from the first `target_tag`.
///
/// # Errors
///
/// Returns [`Error::Annotation`] when the tag body does not follow its grammar.
pub fn comment_properties(raw: Option<&str>, target_tag: &str) -> Result<CommentProperties> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Ok(CommentProperties::default());
    };

    let block = DocBlock::parse(raw);
    let meta = match block.first_tag(target_tag).and_then(|t| t.body.as_deref()) {
        Some(body) => parse_tag_body(body)?,
        None => Map::new(),
    };

    Ok(CommentProperties {
        deprecated: block.has_tag("deprecated"),
        summary: block.summary,
        description: block.description,
        meta,
    })
}

/// Parse a tag body into a map.
///
/// # Errors
///
/// Returns [`Error::Annotation`] when a brace-wrapped body is not a JSON
/// object, or when the body opens with text that has no key.
pub fn parse_tag_body(body: &str) -> Result<Map<String, Value>> {
    let mut text = body.trim();
    if text.starts_with('(') && text.ends_with(')') && find_closing_paren(text) == Some(text.len() - 1) {
        text = text[1..text.len() - 1].trim();
    }

    if text.is_empty() {
        return Ok(Map::new());
    }

    if text.starts_with('{') && text.ends_with('}') {
        return match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(annotation_error(text, "expected a JSON object")),
            Err(e) => Err(annotation_error(text, &e.to_string())),
        };
    }

    let mut map = Map::new();
    for entry in key_value_entries(text)? {
        let Some((key, value)) = entry.split_once(':') else {
            return Err(annotation_error(text, &format!("entry `{}` has no key", entry)));
        };
        let key = unquote(key.trim());
        map.insert(key.to_string(), parse_value(value.trim(), text)?);
    }
    debug!("Parsed annotation body into {} keys", map.len());
    Ok(map)
}

/// Group lines and comma-separated segments into `key: value` entries.
///
/// A segment without a leading key continues the previous entry.
fn key_value_entries(text: &str) -> Result<Vec<String>> {
    let mut entries: Vec<String> = Vec::new();
    for line in split_top_level(text, &['\n']) {
        for (index, segment) in split_top_level(line, &[',']).into_iter().enumerate() {
            if ENTRY_KEY.is_match(segment) {
                entries.push(segment.trim().to_string());
                continue;
            }
            let segment = segment.trim();
            match entries.last_mut() {
                Some(current) if index > 0 => {
                    current.push(',');
                    if !segment.is_empty() {
                        current.push(' ');
                        current.push_str(segment);
                    }
                }
                Some(current) if !segment.is_empty() => {
                    current.push(' ');
                    current.push_str(segment);
                }
                Some(_) => {}
                None if segment.is_empty() => {}
                None => {
                    return Err(annotation_error(text, &format!("entry `{}` has no key", segment)));
                }
            }
        }
    }
    Ok(entries)
}

fn annotation_error(body: &str, message: &str) -> Error {
    Error::Annotation {
        body: body.to_string(),
        message: message.to_string(),
    }
}

fn parse_value(raw: &str, body: &str) -> Result<Value> {
    if raw.starts_with('[') && raw.ends_with(']') {
        let inner = raw[1..raw.len() - 1].trim();
        if inner.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        return split_top_level(inner, &[','])
            .into_iter()
            .map(|item| parse_value(item.trim(), body))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array);
    }

    if raw.starts_with('{') && raw.ends_with('}') {
        return serde_json::from_str(raw).map_err(|e| annotation_error(body, &e.to_string()));
    }

    if raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')))
    {
        return Ok(Value::String(raw[1..raw.len() - 1].replace("\\\"", "\"")));
    }

    Ok(match raw {
        "null" => Value::Null,
        _ => guess_scalar(raw),
    })
}

fn unquote(text: &str) -> &str {
    text.trim_matches(|c: char| c == '"' || c == '\'')
}

/// Split on separators that are outside brackets, braces, parentheses and
/// double-quoted strings.
fn split_top_level<'a>(text: &'a str, separators: &[char]) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;

    for (index, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth -= 1,
            c if depth == 0 && separators.contains(&c) => {
                parts.push(&text[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Resolves `Name`, `Name[]` and `Code(Name)` references into schemas
pub struct SchemaRefResolver<'a> {
    builders: &'a SchemaBuilderRegistry,
}

impl<'a> SchemaRefResolver<'a> {
    pub fn new(builders: &'a SchemaBuilderRegistry) -> Self {
        Self { builders }
    }

    /// Resolve builder calls and array references.
    ///
    /// Returns `None` for a plain model name; callers decide how to turn it
    /// into a `$ref`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaBuilderNotFound`] naming the code and the URI
    /// when a builder call uses an unregistered code.
    pub fn resolve_structured(&self, reference: &str, uri: &str) -> Result<Option<Schema>> {
        let cleaned: String = reference.chars().filter(|c| !c.is_whitespace()).collect();

        if let Some(captures) = BUILDER_CALL.captures(&cleaned) {
            let code = &captures[1];
            let model = &captures[2];
            let builder = self
                .builders
                .get(code)
                .ok_or_else(|| Error::SchemaBuilderNotFound {
                    code: code.to_string(),
                    uri: uri.to_string(),
                })?;
            debug!("Building schema for {} with builder {}", model, code);
            return Ok(Some(builder.build(&schema_ref_path(model), uri)));
        }

        if let Some(model) = cleaned.strip_suffix("[]") {
            return Ok(Some(Schema::array_of(Schema::reference(model))));
        }

        Ok(None)
    }

    /// Resolve any reference; plain names become `$ref` schemas.
    pub fn resolve(&self, reference: &str, uri: &str) -> Result<Schema> {
        match self.resolve_structured(reference, uri)? {
            Some(schema) => Ok(schema),
            None => Ok(Schema::reference(reference.trim())),
        }
    }
}
