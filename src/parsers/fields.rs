use super::{InputDefinition, JsonObject, Parsed, Parser};
use crate::error::{Result, TypeError};
use crate::model::MixedModel;
use crate::types::{traits, DyType, TypeRegistry, Types};

/// A struct from an explicit field list:
/// `[{"name": "price", "type": "f64", "nullable": true}, …]`.
///
/// Every key other than `name` and `type` must be a registered trait.
pub struct FieldsParser;

impl FieldsParser {
    fn parse_field(&self, entry: &JsonObject, types: &TypeRegistry) -> Result<DyType> {
        let name = required_str(entry, "name")?;
        let type_ref = required_str(entry, "type")?;
        let mut ty = match types.get_type(type_ref) {
            Some(ty) => ty.copy(),
            None => DyType::from_trait(name, traits::TYPE_REF.value(type_ref)),
        };
        for (key, value) in entry.iter().filter(|(k, _)| !matches!(k.as_str(), "name" | "type")) {
            let descriptor = types
                .get_trait(key)
                .ok_or_else(|| TypeError::InvalidArgument(format!("unknown trait `{key}` on field `{name}`")))?;
            ty.append_field(descriptor.from_json(value))?;
        }
        Ok(DyType::field(name, ty))
    }
}

fn required_str<'a>(entry: &'a JsonObject, key: &str) -> Result<&'a str> {
    entry
        .get(key)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| TypeError::InvalidArgument(format!("field entry needs a string `{key}`")).into())
}

impl Parser for FieldsParser {
    fn name(&self) -> &'static str { "fields" }

    fn accept(&self, input: &InputDefinition) -> bool {
        matches!(input, InputDefinition::Fields(_))
    }

    fn parse(&self, name: &str, input: &InputDefinition, types: &TypeRegistry) -> Result<Parsed> {
        let InputDefinition::Fields(entries) = input else {
            return Err(crate::Error::NoParser(name.to_string()));
        };
        let fields = entries
            .iter()
            .map(|entry| self.parse_field(entry, types))
            .collect::<Result<Vec<_>>>()?;
        Ok(Parsed::Type(Types::structure(name, fields)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entries(v: serde_json::Value) -> InputDefinition {
        let xs = v
            .as_array()
            .unwrap()
            .iter()
            .map(|x| x.as_object().unwrap().clone())
            .collect();
        InputDefinition::Fields(xs)
    }

    fn parse(v: serde_json::Value) -> Result<DyType> {
        FieldsParser
            .parse("trade", &entries(v), &TypeRegistry::standard())
            .map(|p| p.as_type().cloned().unwrap())
    }

    #[test]
    fn fields_resolve_through_the_registry() {
        let ty = parse(json!([
            {"name": "id", "type": "u64", "primary": true},
            {"name": "price", "type": "f64"},
            {"name": "side", "type": "SideEnum", "nullable": true},
            {"name": "ts", "type": "timestamp/us"}
        ]))
        .unwrap();
        assert_eq!(ty.name(), "trade");
        assert!(!ty.is_frozen());
        let fields: Vec<_> = ty.struct_fields().collect();
        assert_eq!(fields.len(), 4);

        let id = fields[0].field_type().unwrap();
        assert!(id.get_bool(&traits::PRIMARY));
        assert!(!Types::u64().get_bool(&traits::PRIMARY));

        let side = fields[2].field_type().unwrap();
        assert!(side.get_bool(&traits::ENUM) && side.get_bool(&traits::NULLABLE));
        assert_eq!(fields[3].field_type().unwrap().get_str(&traits::TS_UNIT), Some("us"));
    }

    #[test]
    fn unknown_traits_are_invalid_arguments() {
        let err = parse(json!([{"name": "id", "type": "u64", "colour": "red"}])).unwrap_err();
        assert!(matches!(err, crate::Error::Type(TypeError::InvalidArgument(ref m)) if m.contains("colour")));
    }

    #[test]
    fn entries_need_name_and_type() {
        assert!(parse(json!([{"type": "u64"}])).is_err());
        assert!(parse(json!([{"name": "x", "type": 3}])).is_err());
    }
}
