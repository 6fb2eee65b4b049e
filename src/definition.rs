//! Model definitions: what to parse, and the trait overlays to apply after.
//!
//! A definition file holds one object, an array of objects, or one object
//! per line (NDJSON). Exactly one input section is normally present; when
//! several are, the first one some parser accepts wins, in the order
//! example, fields, source, variants.
use serde::{Deserialize, Serialize};

use crate::emitters::EmitterRegistry;
use crate::error::{Error, Result};
use crate::inference::TypeInference;
use crate::model::{FieldDescriptor, FieldValue, ValueKind};
use crate::parsers::{ExampleInput, InputDefinition, JsonObject, Parsed, ParserRegistry, SourceInput};
use crate::path_de::from_value_with_path;
use crate::types::TypeRegistry;

// ————————————————————————————————————————————————————————————————————————————
// REGISTRIES
// ————————————————————————————————————————————————————————————————————————————

/// Everything a parse → emit run looks names up in. Built once, shared by
/// reference.
#[derive(Default)]
pub struct Registries {
    pub types: TypeRegistry,
    pub parsers: ParserRegistry,
    pub emitters: EmitterRegistry,
}

impl Registries {
    pub fn standard() -> Self {
        Self {
            types: TypeRegistry::standard(),
            parsers: ParserRegistry::standard(),
            emitters: EmitterRegistry::standard(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DEFINITIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraitOverlay {
    pub name: String,
    #[serde(default = "overlay_default")]
    pub value: serde_json::Value,
}

fn overlay_default() -> serde_json::Value { serde_json::Value::Bool(true) }

fn untyped() -> String { "untyped".to_string() }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDefinition {
    #[serde(rename = "type", default = "untyped")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "ref", default)]
    pub reference: String,
    #[serde(default)]
    pub note: String,
    /// Original sample text, echoed by generated code.
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub traits: Vec<TraitOverlay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<ExampleInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<JsonObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<JsonObject>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInput>,
}

impl ModelDefinition {
    fn bare(name: &str) -> Self {
        Self {
            kind: untyped(),
            name: name.to_string(),
            url: String::new(),
            reference: String::new(),
            note: String::new(),
            raw: String::new(),
            traits: Vec::new(),
            example: None,
            fields: None,
            variants: None,
            source: None,
        }
    }

    /// A definition around a single data sample, as the CLI builds them.
    pub fn from_example(name: &str, format: &str, text: &str) -> Self {
        let mut model = Self::bare(name);
        model.example = Some(ExampleInput { format: format.to_string(), text: text.to_string() });
        model.fill_raw();
        model
    }

    pub fn from_source(name: &str, lang: &str, code: &str) -> Self {
        let mut model = Self::bare(name);
        model.source = Some(SourceInput { lang: lang.to_string(), code: code.to_string() });
        model
    }

    /// JSON examples double as `raw` when none was given, pretty-printed.
    fn fill_raw(&mut self) {
        if !self.raw.is_empty() {
            return;
        }
        let Some(example) = self.example.as_ref().filter(|e| e.format.eq_ignore_ascii_case("json")) else {
            return;
        };
        let raw = serde_json::from_str::<serde_json::Value>(&example.text)
            .ok()
            .and_then(|v| serde_json::to_string_pretty(&v).ok())
            .unwrap_or_else(|| example.text.clone());
        self.raw = raw;
    }

    /// Present input sections, in parser preference order.
    pub fn inputs(&self) -> Vec<InputDefinition> {
        let mut inputs = Vec::new();
        if let Some(example) = &self.example {
            inputs.push(InputDefinition::Example(example.clone()));
        }
        if let Some(fields) = &self.fields {
            inputs.push(InputDefinition::Fields(fields.clone()));
        }
        if let Some(source) = &self.source {
            inputs.push(InputDefinition::Source(source.clone()));
        }
        if let Some(variants) = &self.variants {
            inputs.push(InputDefinition::Variants(variants.clone()));
        }
        inputs
    }

    /// Overlays as field values. Unknown names get an ad-hoc descriptor.
    pub fn get_traits(&self, types: &TypeRegistry) -> Vec<FieldValue> {
        self.traits
            .iter()
            .map(|overlay| match types.get_trait(&overlay.name) {
                Some(descriptor) => descriptor.from_json(&overlay.value),
                None => FieldDescriptor::dynamic(overlay.name.clone(), ValueKind::Any).from_json(&overlay.value),
            })
            .collect()
    }

    /// Parse the first accepted input, apply overlays, and infer program
    /// roots.
    pub fn get_parsed(&self, registries: &Registries) -> Result<Parsed> {
        let inputs = self.inputs();
        if inputs.is_empty() {
            return Err(Error::NoInput(self.name.clone()));
        }
        let (parser, input) = inputs
            .iter()
            .find_map(|input| registries.parsers.find_parser(input).map(|p| (p, input)))
            .ok_or_else(|| Error::NoParser(self.name.clone()))?;

        let mut parsed = parser.parse(&self.name, input, &registries.types)?;
        for overlay in self.get_traits(&registries.types) {
            parsed.append_field(overlay)?;
        }
        if let Parsed::Node(node) = &mut parsed {
            let inference = TypeInference::default();
            if inference.accept(node) {
                inference.infer(node)?;
            }
        }
        tracing::debug!(model = %self.name, parser = parser.name(), "model parsed");
        Ok(parsed)
    }
}

/// Every model in `text`: a JSON object, an array of them, or NDJSON.
pub fn read_model_definitions(text: &str) -> Result<Vec<ModelDefinition>> {
    let mut documents = Vec::new();
    for document in serde_json::Deserializer::from_str(text).into_iter::<serde_json::Value>() {
        match document? {
            serde_json::Value::Array(xs) => documents.extend(xs),
            other => documents.push(other),
        }
    }
    documents
        .into_iter()
        .enumerate()
        .map(|(index, document)| {
            let mut model: ModelDefinition = from_value_with_path(document).map_err(|err| match err {
                Error::Definition { path, message } => Error::Definition { path: format!("#{index}/{path}"), message },
                other => other,
            })?;
            model.fill_raw();
            Ok(model)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::MixedModel;
    use crate::types::traits;

    fn order_fill() -> serde_json::Value {
        json!({
            "type": "ws",
            "name": "order_fill",
            "url": "https://example.com/docs/fills",
            "traits": [{"name": "derive", "value": ["Eq"]}, {"name": "vendor", "value": "acme"}],
            "example": {"format": "json", "text": "{\"price\": 1.5, \"qty\": 2}"}
        })
    }

    #[test]
    fn reads_objects_arrays_and_ndjson() {
        let one = read_model_definitions(&order_fill().to_string()).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].kind, "ws");

        let many = read_model_definitions(&json!([order_fill(), {"name": "side", "variants": [{"name": "buy"}]}]).to_string()).unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(many[1].kind, "untyped");

        let ndjson = format!("{}\n{}\n", order_fill(), order_fill());
        assert_eq!(read_model_definitions(&ndjson).unwrap().len(), 2);
    }

    #[test]
    fn json_examples_fill_raw() {
        let models = read_model_definitions(&order_fill().to_string()).unwrap();
        assert_eq!(models[0].raw, "{\n  \"price\": 1.5,\n  \"qty\": 2\n}");
    }

    #[test]
    fn definition_errors_name_document_and_path() {
        let text = json!([order_fill(), {"name": "bad", "fields": [{"name": 1}], "colour": 3}]).to_string();
        let err = read_model_definitions(&text).unwrap_err();
        assert!(matches!(err, Error::Definition { ref path, .. } if path.starts_with("#1/")), "{err}");
    }

    #[test]
    fn overlays_land_on_the_parsed_root() {
        let registries = Registries::standard();
        let models = read_model_definitions(&order_fill().to_string()).unwrap();
        let parsed = models[0].get_parsed(&registries).unwrap();
        let ty = parsed.as_type().unwrap();
        assert_eq!(ty.name(), "order_fill");
        assert_eq!(ty.get_strs(&traits::DERIVE).collect::<Vec<_>>(), vec!["Eq"]);
        assert_eq!(ty.entity().iter().find(|(k, _)| *k == "vendor").and_then(|(_, v)| v.as_str()), Some("acme"));
    }

    #[test]
    fn missing_inputs_and_parsers_are_reported() {
        let registries = Registries::standard();
        let empty = ModelDefinition::bare("nothing");
        assert!(matches!(empty.get_parsed(&registries), Err(Error::NoInput(_))));

        let source = ModelDefinition::from_source("script", "javascript", "let a = 1;");
        assert!(matches!(source.get_parsed(&registries), Err(Error::NoParser(_))));
    }

    #[test]
    fn first_accepted_input_wins() {
        let registries = Registries::standard();
        let mut model = ModelDefinition::from_source("side", "javascript", "1");
        model.variants = Some(vec![json!({"name": "buy"}).as_object().unwrap().clone()]);
        let parsed = model.get_parsed(&registries).unwrap();
        assert!(parsed.as_type().unwrap().get_bool(&traits::ENUM));
    }
}
