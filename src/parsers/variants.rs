use super::{InputDefinition, Parsed, Parser};
use crate::error::{Result, TypeError};
use crate::types::{TypeRegistry, Types};

/// An enum from `[{"name": "Buy buy BUY"}, …]`: the first word is the
/// variant, the rest are accepted aliases.
pub struct VariantsParser;

impl Parser for VariantsParser {
    fn name(&self) -> &'static str { "variants" }

    fn accept(&self, input: &InputDefinition) -> bool {
        matches!(input, InputDefinition::Variants(_))
    }

    fn parse(&self, name: &str, input: &InputDefinition, _types: &TypeRegistry) -> Result<Parsed> {
        let InputDefinition::Variants(entries) = input else {
            return Err(crate::Error::NoParser(name.to_string()));
        };
        let mut variants = Vec::with_capacity(entries.len());
        for entry in entries {
            let names: Vec<String> = entry
                .get("name")
                .and_then(serde_json::Value::as_str)
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            if names.is_empty() {
                return Err(TypeError::InvalidArgument(format!("variant of `{name}` needs a name")).into());
            }
            variants.push(Types::variant(names));
        }
        Ok(Parsed::Type(Types::enumeration(name, variants)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::MixedModel;
    use crate::types::traits;

    fn input(v: serde_json::Value) -> InputDefinition {
        InputDefinition::Variants(
            v.as_array().unwrap().iter().map(|x| x.as_object().unwrap().clone()).collect(),
        )
    }

    #[test]
    fn first_word_is_the_variant() {
        let parsed = VariantsParser
            .parse("side", &input(json!([{"name": "Buy buy BUY"}, {"name": "Sell"}])), &TypeRegistry::new())
            .unwrap();
        let ty = parsed.as_type().unwrap();
        assert!(ty.get_bool(&traits::ENUM));
        let variants: Vec<_> = ty.variants().collect();
        assert_eq!(variants[0].name(), "Buy");
        assert_eq!(variants[0].get_strs(&traits::VARIANT_NAMES).collect::<Vec<_>>(), vec!["Buy", "buy", "BUY"]);
        assert_eq!(variants[1].get_list(&traits::VARIANT_NAMES).len(), 1);
    }

    #[test]
    fn blank_names_are_rejected() {
        let err = VariantsParser
            .parse("side", &input(json!([{"name": "  "}])), &TypeRegistry::new())
            .unwrap_err();
        assert!(matches!(err, crate::Error::Type(TypeError::InvalidArgument(_))));
    }
}
