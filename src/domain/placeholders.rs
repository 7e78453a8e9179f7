//! `${key}` substitution for certificate templates.
//!
//! Templates are trusted, tenant-authored markup: values are inserted verbatim
//! without escaping. A placeholder whose key is absent from the mapping stays
//! in the output as literal text.

use std::borrow::Cow;

use serde_json::Value;

use super::entities::DataMap;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// Substitute every `${key}` in `template` with the string form of `data[key]`.
///
/// The template is scanned once, so text introduced by a value is never
/// substituted again.
pub fn apply_placeholders(template: &str, data: &DataMap) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        match after_open.find(CLOSE) {
            Some(end) => {
                let key = &after_open[..end];
                match data.get(key) {
                    Some(value) => output.push_str(&value_text(value)),
                    None => {
                        output.push_str(OPEN);
                        output.push_str(key);
                        output.push(CLOSE);
                    }
                }
                rest = &after_open[end + CLOSE.len_utf8()..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

fn value_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(text) => Cow::Borrowed(text),
        other => Cow::Owned(other.to_string()),
    }
}
