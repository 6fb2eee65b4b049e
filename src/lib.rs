//! unidef: turn data examples, field schemas and program fragments into
//! structural types, then emit target-language artifacts from them.
//!
//! parse ([`parsers`]) → infer ([`inference`], IR programs only) → emit
//! ([`emitters`]), driven by [`definition::ModelDefinition`]s.
pub mod cli;
pub mod definition;
pub mod dispatch;
pub mod emitters;
pub mod error;
pub mod inference;
pub mod ir;
pub mod jq_exec;
pub mod model;
pub mod parsers;
pub mod path_de;
pub mod types;

pub use definition::{read_model_definitions, ModelDefinition, Registries};
pub use error::{Error, Result};
