use super::Emitter;
use crate::definition::{ModelDefinition, Registries};
use crate::error::Result;
use crate::types::DyType;

/// Parses the model and writes nothing; used to validate definitions.
pub struct EmptyEmitter;

impl Emitter for EmptyEmitter {
    fn name(&self) -> &'static str { "empty" }

    fn targets(&self) -> &'static [&'static str] { &["no_target"] }

    fn emit_type(&self, _target: &str, _ty: &DyType) -> Result<String> {
        Ok(String::new())
    }

    fn emit_model(&self, _target: &str, model: &ModelDefinition, registries: &Registries) -> Result<String> {
        model.get_parsed(registries)?;
        Ok(String::new())
    }
}
