//! Input formats → trees.
//!
//! Parsers are tried in registration order; the first one that accepts an
//! input wins. Schema-style parsers hand back an unfrozen root so trait
//! overlays from the model definition can still be appended.
pub mod fields;
pub mod json;
pub mod variants;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ir::IrNode;
use crate::model::{FieldValue, MixedModel};
use crate::types::{DyType, TypeRegistry};

pub use fields::FieldsParser;
pub use json::JsonParser;
pub use variants::VariantsParser;

pub type JsonObject = serde_json::Map<String, serde_json::Value>;

// ————————————————————————————————————————————————————————————————————————————
// INPUTS
// ————————————————————————————————————————————————————————————————————————————

/// A data sample in some textual format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExampleInput {
    pub format: String,
    pub text: String,
}

/// A program fragment in some source language.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceInput {
    pub lang: String,
    pub code: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputDefinition {
    Example(ExampleInput),
    Source(SourceInput),
    Fields(Vec<JsonObject>),
    Variants(Vec<JsonObject>),
}

impl InputDefinition {
    pub fn describe(&self) -> String {
        match self {
            InputDefinition::Example(e) => format!("example ({})", e.format),
            InputDefinition::Source(s) => format!("source ({})", s.lang),
            InputDefinition::Fields(xs) => format!("fields ({} entries)", xs.len()),
            InputDefinition::Variants(xs) => format!("variants ({} entries)", xs.len()),
        }
    }
}

/// What a parser produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Parsed {
    Type(DyType),
    Node(IrNode),
}

impl Parsed {
    pub fn as_type(&self) -> Option<&DyType> {
        match self {
            Parsed::Type(ty) => Some(ty),
            Parsed::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&IrNode> {
        match self {
            Parsed::Node(node) => Some(node),
            Parsed::Type(_) => None,
        }
    }

    pub fn append_field(&mut self, field: FieldValue) -> Result<()> {
        match self {
            Parsed::Type(ty) => { ty.append_field(field)?; }
            Parsed::Node(node) => { node.append_field(field)?; }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PARSERS
// ————————————————————————————————————————————————————————————————————————————

pub trait Parser: Send + Sync {
    fn name(&self) -> &'static str;

    fn accept(&self, input: &InputDefinition) -> bool;

    fn parse(&self, name: &str, input: &InputDefinition, types: &TypeRegistry) -> Result<Parsed>;
}

#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self { Self::default() }

    /// JSON examples, field lists and variant lists. No source-language
    /// parser ships by default.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add_parser(Box::new(JsonParser));
        registry.add_parser(Box::new(FieldsParser));
        registry.add_parser(Box::new(VariantsParser));
        registry
    }

    pub fn add_parser(&mut self, parser: Box<dyn Parser>) {
        self.parsers.push(parser);
    }

    pub fn find_parser(&self, input: &InputDefinition) -> Option<&dyn Parser> {
        let found = self.parsers.iter().find(|p| p.accept(input)).map(|p| p.as_ref());
        tracing::debug!(input = %input.describe(), parser = ?found.map(|p| p.name()), "parser lookup");
        found
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parsers.iter().map(|p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Everything;

    impl Parser for Everything {
        fn name(&self) -> &'static str { "everything" }
        fn accept(&self, _: &InputDefinition) -> bool { true }
        fn parse(&self, name: &str, _: &InputDefinition, _: &TypeRegistry) -> Result<Parsed> {
            Ok(Parsed::Type(DyType::from_str(name)))
        }
    }

    fn example(format: &str) -> InputDefinition {
        InputDefinition::Example(ExampleInput { format: format.into(), text: "{}".into() })
    }

    #[test]
    fn first_accepting_parser_wins() {
        let mut registry = ParserRegistry::standard();
        registry.add_parser(Box::new(Everything));
        assert_eq!(registry.find_parser(&example("json")).map(|p| p.name()), Some("json"));
        assert_eq!(registry.find_parser(&example("yaml")).map(|p| p.name()), Some("everything"));

        let mut registry = ParserRegistry::new();
        registry.add_parser(Box::new(Everything));
        registry.add_parser(Box::new(JsonParser));
        assert_eq!(registry.find_parser(&example("json")).map(|p| p.name()), Some("everything"));
    }

    #[test]
    fn source_inputs_have_no_default_parser() {
        let registry = ParserRegistry::standard();
        let source = InputDefinition::Source(SourceInput { lang: "javascript".into(), code: "1".into() });
        assert!(registry.find_parser(&source).is_none());
    }
}
