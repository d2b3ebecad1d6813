//! Helpers for reading type and attribute information out of `syn` trees.

use log::debug;

/// Serde attributes relevant to the serialized shape of a field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SerdeAttributes {
    /// Renamed field name
    pub rename: Option<String>,
    /// Field is never serialized
    pub skip: bool,
    /// Field is flattened into its parent
    pub flatten: bool,
}

/// A field type reduced to what schema generation needs
#[derive(Debug, Clone, PartialEq)]
pub struct FieldType {
    /// Rendered type, without an outer `Option`
    pub hint: String,
    /// The field was wrapped in `Option<T>`
    pub nullable: bool,
}

/// Parse serde attributes from a list of attributes
pub fn parse_serde_attributes(attrs: &[syn::Attribute]) -> SerdeAttributes {
    let mut serde_attrs = SerdeAttributes::default();

    for attr in attrs {
        if !attr.path().is_ident("serde") {
            continue;
        }

        let Ok(meta_list) = attr.meta.require_list() else {
            continue;
        };
        let tokens_str = meta_list.tokens.to_string();

        for part in tokens_str.split(',').map(str::trim) {
            if part.starts_with("rename") && !part.starts_with("rename_all") {
                if let Some(value) = string_literal_after_eq(part) {
                    debug!("Found serde rename: {}", value);
                    serde_attrs.rename = Some(value);
                }
            } else if part == "skip" || part == "skip_serializing" {
                serde_attrs.skip = true;
            } else if part == "flatten" {
                serde_attrs.flatten = true;
            }
        }
    }

    serde_attrs
}

fn string_literal_after_eq(part: &str) -> Option<String> {
    let (_, after_eq) = part.split_once('=')?;
    let start = after_eq.find('"')?;
    let rest = &after_eq[start + 1..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Join `///` doc attributes back into one comment, one line per attribute.
///
/// Returns `None` when there is no doc attribute.
pub fn doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => Some(s.value()),
                _ => None,
            },
            _ => None,
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Render a type the way it is written, without lifetimes.
///
/// Types that have no meaningful textual form render as `Unknown`.
pub fn type_to_string(ty: &syn::Type) -> String {
    match ty {
        syn::Type::Path(type_path) => path_to_string(&type_path.path),
        syn::Type::Reference(reference) => type_to_string(&reference.elem),
        syn::Type::Paren(paren) => type_to_string(&paren.elem),
        syn::Type::Group(group) => type_to_string(&group.elem),
        syn::Type::Slice(slice) => format!("[{}]", type_to_string(&slice.elem)),
        syn::Type::Array(array) => format!("[{}]", type_to_string(&array.elem)),
        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => "()".to_string(),
        _ => "Unknown".to_string(),
    }
}

fn path_to_string(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|segment| {
            let name = segment.ident.to_string();
            match &segment.arguments {
                syn::PathArguments::AngleBracketed(args) => {
                    let inner: Vec<String> = args
                        .args
                        .iter()
                        .filter_map(|arg| match arg {
                            syn::GenericArgument::Type(inner_ty) => Some(type_to_string(inner_ty)),
                            _ => None,
                        })
                        .collect();
                    if inner.is_empty() {
                        name
                    } else {
                        format!("{}<{}>", name, inner.join(", "))
                    }
                }
                _ => name,
            }
        })
        .collect::<Vec<_>>()
        .join("::")
}

/// The `T` of an `Option<T>`
pub fn option_inner(ty: &syn::Type) -> Option<&syn::Type> {
    let syn::Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => match args.args.first()? {
            syn::GenericArgument::Type(inner) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

/// Reduce a field type to a hint and nullability
pub fn field_type(ty: &syn::Type) -> FieldType {
    match option_inner(ty) {
        Some(inner) => FieldType {
            hint: type_to_string(inner),
            nullable: true,
        },
        None => FieldType {
            hint: type_to_string(ty),
            nullable: false,
        },
    }
}
