//! Field maps and override merging
//!
//! Every generator builds its fields first, merges caller overrides over them
//! and only then renders. Override keys replace generated ones; keys the
//! template does not know are added.

use noise_core::{GenerateError, Overrides};
use serde_json::Value;

pub(crate) type Fields = serde_json::Map<String, Value>;

/// Unwrap a `json!({...})` literal into its map.
pub(crate) fn object(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Merge overrides for structured (JSON) output. Any value shape is accepted.
pub(crate) fn merge(fields: &mut Fields, overrides: Option<&Overrides>) {
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            fields.insert(key.clone(), value.clone());
        }
    }
}

/// Merge overrides for line-oriented output, where nested values have no
/// rendering.
pub(crate) fn merge_scalars(
    fields: &mut Fields,
    overrides: Option<&Overrides>,
) -> Result<(), GenerateError> {
    if let Some(overrides) = overrides {
        if let Some((key, _)) = overrides
            .iter()
            .find(|(_, v)| v.is_object() || v.is_array())
        {
            return Err(GenerateError::InvalidOverride {
                field: key.clone(),
                reason: "expected a string, number or boolean".to_string(),
            });
        }
    }
    merge(fields, overrides);
    Ok(())
}

/// Scalar rendering: strings unquoted, null as `-`.
pub(crate) fn text(fields: &Fields, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Keys in `order` first, then any extra keys in sorted order.
pub(crate) fn ordered_keys<'a>(fields: &'a Fields, order: &'a [&'a str]) -> Vec<&'a str> {
    let mut keys: Vec<&str> = order
        .iter()
        .copied()
        .filter(|k| fields.contains_key(*k))
        .collect();
    let mut extra: Vec<&str> = fields
        .keys()
        .map(String::as_str)
        .filter(|k| !order.contains(k))
        .collect();
    extra.sort_unstable();
    keys.extend(extra);
    keys
}

pub(crate) fn render_json(fields: Fields) -> Result<String, GenerateError> {
    serde_json::to_string(&Value::Object(fields)).map_err(|e| GenerateError::Render(e.to_string()))
}

pub(crate) fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: Value) -> Overrides {
        object(value)
    }

    #[test]
    fn test_merge_replaces_and_adds() {
        let mut fields = Fields::new();
        fields.insert("user".into(), json!("alice"));
        fields.insert("port".into(), json!(22));

        let o = overrides(json!({"user": "mallory", "campaign": "red-team-7"}));
        merge(&mut fields, Some(&o));

        assert_eq!(text(&fields, "user"), "mallory");
        assert_eq!(text(&fields, "port"), "22");
        assert_eq!(text(&fields, "campaign"), "red-team-7");
        assert_eq!(text(&fields, "missing"), "-");
    }

    #[test]
    fn test_merge_scalars_rejects_nested() {
        let mut fields = Fields::new();
        let o = overrides(json!({"user": {"name": "x"}}));
        let err = merge_scalars(&mut fields, Some(&o)).unwrap_err();
        assert_eq!(
            err,
            GenerateError::InvalidOverride {
                field: "user".to_string(),
                reason: "expected a string, number or boolean".to_string(),
            }
        );
        assert!(fields.is_empty());
    }

    #[test]
    fn test_ordered_keys() {
        let mut fields = Fields::new();
        for key in ["zeta", "b", "a", "extra"] {
            fields.insert(key.into(), json!(1));
        }
        assert_eq!(
            ordered_keys(&fields, &["b", "a", "missing"]),
            vec!["b", "a", "extra", "zeta"]
        );
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
    }
}
