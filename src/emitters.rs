//! Trees → target-language text.
//!
//! Emitters only read what they are given. A model is parsed through the
//! registries, the resulting type is walked, and text comes back; nothing an
//! emitter did not build itself is ever mutated.
pub mod empty;
pub mod rust;
pub mod schema;
pub mod sql;

use crate::definition::{ModelDefinition, Registries};
use crate::error::{Error, Result};
use crate::parsers::Parsed;
use crate::types::example::to_snake_case;
use crate::types::DyType;

pub use empty::EmptyEmitter;
pub use rust::RustDataEmitter;
pub use schema::JsonSchemaEmitter;
pub use sql::SqlEmitter;

// ————————————————————————————————————————————————————————————————————————————
// EMITTERS
// ————————————————————————————————————————————————————————————————————————————

pub trait Emitter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Target names this emitter answers to.
    fn targets(&self) -> &'static [&'static str];

    fn accept(&self, target: &str) -> bool {
        self.targets().iter().any(|t| t.eq_ignore_ascii_case(target))
    }

    fn emit_type(&self, target: &str, ty: &DyType) -> Result<String>;

    fn emit_model(&self, target: &str, model: &ModelDefinition, registries: &Registries) -> Result<String> {
        match model.get_parsed(registries)? {
            Parsed::Type(ty) => self.emit_type(target, &ty),
            Parsed::Node(node) => Err(Error::Emit {
                what: model.name.clone(),
                reason: format!("{} emits types, got a `{}` program node", self.name(), node.kind()),
            }),
        }
    }
}

#[derive(Default)]
pub struct EmitterRegistry {
    emitters: Vec<Box<dyn Emitter>>,
}

impl EmitterRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add_emitter(Box::new(RustDataEmitter));
        registry.add_emitter(Box::new(SqlEmitter));
        registry.add_emitter(Box::new(JsonSchemaEmitter));
        registry.add_emitter(Box::new(EmptyEmitter));
        registry
    }

    pub fn add_emitter(&mut self, emitter: Box<dyn Emitter>) {
        self.emitters.push(emitter);
    }

    /// First registered emitter that accepts `target`.
    pub fn find_emitter(&self, target: &str) -> Option<&dyn Emitter> {
        let found = self.emitters.iter().find(|e| e.accept(target)).map(|e| e.as_ref());
        tracing::debug!(target, emitter = ?found.map(|e| e.name()), "emitter lookup");
        found
    }

    pub fn emitters(&self) -> impl Iterator<Item = &dyn Emitter> {
        self.emitters.iter().map(|e| e.as_ref())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TEXT HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Line-oriented writer with block indentation.
#[derive(Debug, Default)]
pub struct CodeWriter {
    out: String,
    depth: usize,
}

impl CodeWriter {
    const INDENT: &'static str = "    ";

    pub fn new() -> Self { Self::default() }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(Self::INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    /// `head {`, indented body, `}` + `tail`.
    pub fn block<E>(
        &mut self,
        head: impl AsRef<str>,
        tail: &str,
        body: impl FnOnce(&mut Self) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        self.line(format!("{} {{", head.as_ref()));
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        self.line(format!("}}{tail}"));
        result
    }

    pub fn into_string(self) -> String { self.out }
}

/// `order_fill`, `orderFill` and `order-fill` all become `OrderFill`.
pub fn to_pascal_case(name: &str) -> String {
    to_snake_case(name)
        .split('_')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
