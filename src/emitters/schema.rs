//! JSON Schema (draft-ish) for a type tree.
use serde_json::{json, Map, Value as JsonValue};

use super::Emitter;
use crate::error::{Error, Result};
use crate::model::MixedModel;
use crate::types::{traits, DyType};

pub struct JsonSchemaEmitter;

fn object_of(props: Map<String, JsonValue>, required: Vec<String>) -> JsonValue {
    let mut map = Map::new();
    map.insert("type".into(), JsonValue::from("object"));
    map.insert("properties".into(), JsonValue::Object(props));
    if !required.is_empty() {
        map.insert("required".into(), JsonValue::Array(required.into_iter().map(JsonValue::from).collect()));
    }
    JsonValue::Object(map)
}

fn nullable(inner: JsonValue) -> JsonValue {
    if inner == json!({ "type": "null" }) {
        return inner;
    }
    json!({ "oneOf": [inner, { "type": "null" }] })
}

fn described(mut schema: JsonValue, comments: Vec<&str>) -> JsonValue {
    if !comments.is_empty() {
        schema["description"] = JsonValue::from(comments.join("\n"));
    }
    schema
}

/// Schema for one type. Nullability wraps whatever the rest produces.
pub fn schema_of(ty: &DyType) -> Result<JsonValue> {
    if ty.get_bool(&traits::NULLABLE) {
        let mut inner = ty.copy();
        inner.remove_field(&traits::NULLABLE)?;
        return Ok(nullable(schema_of(&inner)?));
    }
    let items = |n: usize| -> Result<JsonValue> {
        ty.generics().nth(n).map(schema_of).unwrap_or_else(|| Ok(json!({})))
    };

    let declared_elsewhere = ty.get_bool(&traits::STRUCT) || ty.get_bool(&traits::ENUM);
    let schema = if ty.get_bool(&traits::NULL) {
        json!({ "type": "null" })
    } else if let Some(reference) = ty.get_str(&traits::TYPE_REF).filter(|_| declared_elsewhere) {
        json!({ "$ref": format!("#/$defs/{reference}") })
    } else if ty.get_bool(&traits::STRUCT) {
        let mut props = Map::new();
        let mut required = Vec::new();
        for field in ty.struct_fields() {
            let name = field.field_name().unwrap_or_else(|| field.name());
            let field_ty = field.field_type().unwrap_or(field);
            let comments = field
                .get_strs(&traits::BEFORE_LINE_COMMENT)
                .chain(field_ty.get_strs(&traits::BEFORE_LINE_COMMENT))
                .collect();
            if !field.get_bool(&traits::NULLABLE) && !field_ty.get_bool(&traits::NULLABLE) {
                required.push(name.to_string());
            }
            props.insert(name.to_string(), described(schema_of(field_ty)?, comments));
        }
        let mut schema = object_of(props, required);
        schema["title"] = JsonValue::from(ty.name());
        schema
    } else if ty.get_bool(&traits::ENUM) {
        let names: Vec<JsonValue> = ty.variants().map(|v| JsonValue::from(v.name())).collect();
        json!({ "type": "string", "title": ty.name(), "enum": names })
    } else if ty.get_bool(&traits::TUPLE) {
        let elements = ty.generics().map(schema_of).collect::<Result<Vec<_>>>()?;
        let arity = elements.len();
        json!({
            "type": "array",
            "prefixItems": elements,
            "minItems": arity,
            "maxItems": arity
        })
    } else if ty.get_bool(&traits::VECTOR) {
        json!({ "type": "array", "items": items(0)? })
    } else if ty.get_bool(&traits::MAP) {
        json!({ "type": "object", "additionalProperties": items(1)? })
    } else if ty.get_bool(&traits::BOOL) {
        json!({ "type": "boolean" })
    } else if let Some(unit) = ty.get_str(&traits::TS_UNIT) {
        json!({ "type": "integer", "format": format!("timestamp/{unit}") })
    } else if ty.get_bool(&traits::INTEGER) {
        json!({ "type": "integer", "format": ty.name() })
    } else if ty.get_bool(&traits::FLOATING) {
        json!({ "type": "number", "format": ty.name() })
    } else if ty.get_bool(&traits::STRING) {
        json!({ "type": "string" })
    } else if ty.get_bool(&traits::ALL_VALUE) {
        json!({})
    } else if let Some(reference) = ty.get_str(&traits::TYPE_REF) {
        json!({ "$ref": format!("#/$defs/{reference}") })
    } else {
        return Err(Error::Emit {
            what: format!("`{}` as schema", ty.name()),
            reason: "no schema for it".into(),
        });
    };

    // numbers carried inside JSON strings
    if ty.get_bool(&traits::STRING_WRAPPED) {
        return Ok(json!({ "type": "string", "contentSchema": schema }));
    }
    Ok(schema)
}

impl Emitter for JsonSchemaEmitter {
    fn name(&self) -> &'static str { "json_schema" }

    fn targets(&self) -> &'static [&'static str] { &["schema", "json_schema"] }

    fn emit_type(&self, _target: &str, ty: &DyType) -> Result<String> {
        let mut schema = schema_of(ty)?;
        schema["$schema"] = JsonValue::from("https://json-schema.org/draft/2020-12/schema");
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Types;

    #[test]
    fn structs_become_objects() {
        let note = Types::string().copy().with(traits::NULLABLE.present());
        let ty = Types::structure(
            "fill",
            vec![
                DyType::field("price", Types::f64().clone())
                    .with(traits::BEFORE_LINE_COMMENT.value(vec!["quote price".to_string()])),
                DyType::field("id", Types::i64().string_wrapped()),
                DyType::field("note", note),
                DyType::field("legs", Types::vector(Types::u8().clone())),
            ],
        );
        let schema = schema_of(&ty).unwrap();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["title"], "fill");
        assert_eq!(schema["required"], json!(["price", "id", "legs"]));
        assert_eq!(
            schema["properties"]["price"],
            json!({ "type": "number", "format": "f64", "description": "quote price" })
        );
        assert_eq!(schema["properties"]["id"]["type"], "string");
        assert_eq!(schema["properties"]["id"]["contentSchema"]["format"], "i64");
        assert_eq!(schema["properties"]["note"], json!({ "oneOf": [{ "type": "string" }, { "type": "null" }] }));
        assert_eq!(schema["properties"]["legs"]["items"]["format"], "u8");
    }

    #[test]
    fn enums_list_primary_names() {
        let ty = Types::enumeration(
            "side",
            vec![Types::variant(vec!["buy".into(), "BUY".into()]), Types::variant(vec!["sell".into()])],
        );
        assert_eq!(schema_of(&ty).unwrap()["enum"], json!(["buy", "sell"]));
    }

    #[test]
    fn references_point_at_definitions() {
        let side = crate::types::parse_type_definition("SideEnum").unwrap();
        assert_eq!(schema_of(&side).unwrap(), json!({ "$ref": "#/$defs/SideEnum" }));
    }

    #[test]
    fn tuples_fix_their_arity() {
        let ty = Types::tuple("pair", vec![Types::f64().clone(), Types::string().clone()]);
        let schema = schema_of(&ty).unwrap();
        assert_eq!(schema["minItems"], 2);
        assert_eq!(schema["prefixItems"][1], json!({ "type": "string" }));
    }

    #[test]
    fn emitted_text_is_pretty_json() {
        let out = JsonSchemaEmitter.emit_type("schema", Types::bool()).unwrap();
        let back: JsonValue = serde_json::from_str(&out).unwrap();
        assert_eq!(back["type"], "boolean");
        assert!(out.contains('\n'));
        assert!(schema_of(&DyType::from_str("mystery")).is_err());
    }
}
