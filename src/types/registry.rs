use indexmap::IndexMap;

use super::example::to_snake_case;
use super::{traits, DyType, Types};
use crate::error::TypeError;
use crate::model::{FieldDescriptor, MixedModel};

/// Name-addressable types and traits, plus fallback detectors consulted when
/// a name has no registered entry.
pub struct TypeRegistry {
    types: IndexMap<String, DyType>,
    traits: IndexMap<String, FieldDescriptor>,
    detectors: Vec<fn(&str) -> Option<DyType>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self { types: IndexMap::new(), traits: IndexMap::new(), detectors: Vec::new() }
    }

    /// Every canonical type and catalog trait, with [`parse_type_definition`]
    /// as the fallback detector.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for descriptor in traits::ALL {
            // catalog keys are unique
            let _ = registry.insert_trait((*descriptor).clone());
        }
        for ty in Types::canonical() {
            let _ = registry.insert_type(ty.clone());
        }
        registry.detectors.push(parse_type_definition);
        registry
    }

    pub fn insert_type(&mut self, ty: DyType) -> Result<(), TypeError> {
        let name = ty.name().to_string();
        if !ty.is_frozen() {
            return Err(TypeError::NotFrozen(name));
        }
        match self.types.get(&name) {
            None => {
                self.types.insert(name, ty);
                Ok(())
            }
            Some(existing) if *existing == ty => Ok(()),
            Some(_) => Err(TypeError::AlreadyExists(name)),
        }
    }

    pub fn insert_trait(&mut self, descriptor: FieldDescriptor) -> Result<(), TypeError> {
        let key = descriptor.key().to_string();
        match self.traits.get(&key) {
            None => {
                self.traits.insert(key, descriptor);
                Ok(())
            }
            Some(existing) if *existing == descriptor => Ok(()),
            Some(_) => Err(TypeError::TraitAlreadyExists(key)),
        }
    }

    pub fn add_detector(&mut self, detector: fn(&str) -> Option<DyType>) {
        self.detectors.push(detector);
    }

    /// Exact match first, then each detector in order.
    pub fn get_type(&self, name: &str) -> Option<DyType> {
        if let Some(ty) = self.types.get(name) {
            return Some(ty.clone());
        }
        self.detectors.iter().find_map(|detect| detect(name))
    }

    pub fn get_trait(&self, key: &str) -> Option<&FieldDescriptor> {
        self.traits.get(key)
    }

    pub fn list_types(&self) -> impl Iterator<Item = &DyType> {
        self.types.values()
    }

    pub fn list_traits(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.traits.values()
    }
}

/// Resolve a textual type that is not a registered name.
///
/// - `(a, b)` tuple of canonical types
/// - `String` / `str` / `&str` aliases
/// - `timestamp/<unit>` integer with a time unit
/// - anything containing `enum` becomes an enum reference, everything else a
///   struct reference
pub fn parse_type_definition(text: &str) -> Option<DyType> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        let standard = TypeRegistry::standard_types();
        let elements = inner
            .split(',')
            .map(|name| standard.get(name.trim()).cloned())
            .collect::<Option<Vec<DyType>>>()?;
        return Some(Types::tuple(text, elements));
    }
    if matches!(text, "String" | "string" | "str" | "&str") {
        return Some(Types::string().clone());
    }
    if let Some(unit) = text.strip_prefix("timestamp/") {
        let ty = Types::i64().copy().with(traits::TS_UNIT.value(unit));
        return Some(ty);
    }
    if text.is_empty() {
        return None;
    }
    let reference = if to_snake_case(text).contains("enum") {
        let name = text.split('/').next().unwrap_or(text);
        Types::enumeration(name, Vec::new()).with(traits::TYPE_REF.value(name))
    } else {
        Types::structure(text, Vec::new()).with(traits::TYPE_REF.value(text))
    };
    Some(reference)
}

impl TypeRegistry {
    fn standard_types() -> IndexMap<&'static str, DyType> {
        Types::canonical().into_iter().map(|ty| (ty.name(), ty.clone())).collect()
    }
}
