//! JSON examples, with `//` line comments.
//!
//! Comments are collected line by line and attach to the next key that
//! appears (or to a key on the same line). Keys are matched by occurrence, so
//! a comment above the second `"id"` in a document lands on the second `id`
//! field the type walk meets.
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{InputDefinition, Parsed, Parser};
use crate::error::{EntityError, Result};
use crate::model::MixedModel;
use crate::types::{infer_type_from_example, traits, walk_type_with_count, TypeRegistry};

static KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([\w\-]+)"\s*:"#).expect("static regex"));

pub struct JsonParser;

impl Parser for JsonParser {
    fn name(&self) -> &'static str { "json" }

    fn accept(&self, input: &InputDefinition) -> bool {
        matches!(input, InputDefinition::Example(e) if e.format.eq_ignore_ascii_case("json"))
    }

    fn parse(&self, name: &str, input: &InputDefinition, _types: &TypeRegistry) -> Result<Parsed> {
        let InputDefinition::Example(example) = input else {
            return Err(crate::Error::NoParser(name.to_string()));
        };
        let comments = parse_comments(&example.text);
        let value: serde_json::Value = serde_json::from_str(&strip_comments(&example.text))?;
        let mut parsed = infer_type_from_example(&value, name)?;

        if parsed.get_bool(&traits::STRUCT) && !name.is_empty() {
            parsed.replace_field(traits::TYPE_NAME.value(name))?;
            walk_type_with_count::<EntityError>(&mut parsed, &mut |_, nth, key, ty| {
                if let Some(lines) = comments.get(&(nth, key.to_string())) {
                    ty.append_field(traits::BEFORE_LINE_COMMENT.value(lines.clone()))?;
                }
                Ok(())
            })?;
        }
        tracing::debug!(model = name, comments = comments.len(), "json example parsed");
        Ok(Parsed::Type(parsed))
    }
}

/// Byte offset of a `//` that is not inside a string literal.
fn comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
            return Some(i);
        }
    }
    None
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        match comment_start(line) {
            Some(at) => out.push_str(&line[..at]),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

/// `(occurrence, key)` → comment lines.
fn parse_comments(text: &str) -> HashMap<(usize, String), Vec<String>> {
    let mut occurrences = HashMap::<String, usize>::new();
    let mut result = HashMap::new();
    let mut pending = Vec::new();
    for line in text.lines() {
        let code = match comment_start(line) {
            Some(at) => {
                pending.push(line[at + 2..].trim().to_string());
                &line[..at]
            }
            None => line,
        };
        let Some(key) = KEY_RE.captures(code).and_then(|c| c.get(1)) else {
            continue;
        };
        let key = key.as_str().to_string();
        let nth = occurrences.entry(key.clone()).or_insert(0);
        *nth += 1;
        if !pending.is_empty() {
            result.insert((*nth, key), std::mem::take(&mut pending));
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::ExampleInput;
    use crate::types::{DyType, Types};

    fn parse(name: &str, text: &str) -> DyType {
        let input = InputDefinition::Example(ExampleInput { format: "JSON".into(), text: text.into() });
        assert!(JsonParser.accept(&input));
        match JsonParser.parse(name, &input, &TypeRegistry::standard()).unwrap() {
            Parsed::Type(ty) => ty,
            Parsed::Node(_) => panic!("expected a type"),
        }
    }

    fn field<'a>(ty: &'a DyType, name: &str) -> &'a DyType {
        ty.struct_fields().find(|f| f.field_name() == Some(name)).unwrap()
    }

    #[test]
    fn order_fill_example() {
        let ty = parse(
            "order_fill",
            r#"{
                // exchange order id
                "order_id": "123",
                "filled_at": 1620000000000, // fill time
                "url": "https://example.com/a"
            }"#,
        );
        assert_eq!(ty.name(), "order_fill");
        assert!(!ty.is_frozen());

        let order_id = field(&ty, "order_id");
        assert_eq!(order_id.get_strs(&traits::BEFORE_LINE_COMMENT).collect::<Vec<_>>(), vec!["exchange order id"]);
        let id_ty = order_id.field_type().unwrap();
        assert!(id_ty.get_bool(&traits::INTEGER) && id_ty.get_bool(&traits::STRING_WRAPPED));

        let filled = field(&ty, "filled_at");
        assert_eq!(filled.get_strs(&traits::BEFORE_LINE_COMMENT).collect::<Vec<_>>(), vec!["fill time"]);
        assert_eq!(filled.field_type().unwrap().get_str(&traits::TS_UNIT), Some("ms"));

        assert_eq!(field(&ty, "url").field_type(), Some(Types::string()));
    }

    #[test]
    fn comments_follow_key_occurrence() {
        let ty = parse(
            "doc",
            r#"{
                "id": 1,
                "child": {
                    // inner id
                    "id": 2
                }
            }"#,
        );
        assert_eq!(field(&ty, "id").get_list(&traits::BEFORE_LINE_COMMENT).len(), 0);
        let child = field(&ty, "child").field_type().unwrap();
        assert_eq!(
            field(child, "id").get_strs(&traits::BEFORE_LINE_COMMENT).collect::<Vec<_>>(),
            vec!["inner id"]
        );
    }

    #[test]
    fn slashes_inside_strings_are_not_comments() {
        assert_eq!(comment_start(r#""a": "http://x", // y"#), Some(17));
        assert_eq!(comment_start(r#""a": "say \"//\"""#), None);
        assert_eq!(strip_comments("{\"a\": 1} // end"), "{\"a\": 1} \n");
    }

    #[test]
    fn other_formats_are_declined() {
        let input = InputDefinition::Example(ExampleInput { format: "yaml".into(), text: String::new() });
        assert!(!JsonParser.accept(&input));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let input = InputDefinition::Example(ExampleInput { format: "json".into(), text: "{".into() });
        assert!(matches!(
            JsonParser.parse("x", &input, &TypeRegistry::standard()),
            Err(crate::Error::Json(_))
        ));
    }
}
