//! Structural base shared by [`crate::types::DyType`] and [`crate::ir::IrNode`].
//!
//! A `MixedEntity` is a mixture of statically declared fields (fixed at
//! construction, never removable) and an open extension map. Both maps sit
//! behind `Arc`s: cloning is cheap and a mutation on one clone copies the map
//! first, so a frozen entity can be aliased freely while `copy()` still yields
//! a fully independent value.
//!
//! Lookup order is declared field → extension map → descriptor's
//! default-when-absent.
pub mod field;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::EntityError;
pub use field::{FieldDescriptor, FieldValue, Value, ValueKind};

pub type FieldMap = IndexMap<Cow<'static, str>, Value>;

#[derive(Clone, Debug, Default)]
pub struct MixedEntity {
    declared: Arc<FieldMap>,
    extension: Arc<FieldMap>,
    frozen: bool,
}

impl MixedEntity {
    pub fn new() -> Self { Self::default() }

    /// Build an entity whose given fields are statically declared.
    pub fn with_declared<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = FieldValue>,
    {
        let declared = fields.into_iter().map(|f| (f.key, f.value)).collect::<FieldMap>();
        Self { declared: Arc::new(declared), extension: Arc::default(), frozen: false }
    }

    pub fn is_declared(&self, key: &str) -> bool { self.declared.contains_key(key) }

    fn ensure_unfrozen(&self, key: &str) -> Result<(), EntityError> {
        if self.frozen {
            return Err(EntityError::Frozen { key: key.to_string() });
        }
        Ok(())
    }

    fn ensure_kind(field: &FieldValue) -> Result<(), EntityError> {
        if !field.kind.admits(&field.value) {
            return Err(EntityError::KindMismatch {
                key: field.key.to_string(),
                expected: field.kind.name(),
                found: field.value.kind().name(),
            });
        }
        Ok(())
    }

    fn slot_mut(&mut self, key: &str) -> &mut FieldMap {
        if self.declared.contains_key(key) {
            Arc::make_mut(&mut self.declared)
        } else {
            Arc::make_mut(&mut self.extension)
        }
    }

    /// Concatenate onto a populated sequence field, or set it when empty.
    pub fn append_field(&mut self, field: FieldValue) -> Result<&mut Self, EntityError> {
        self.ensure_unfrozen(&field.key)?;
        Self::ensure_kind(&field)?;
        let FieldValue { key, kind, value } = field;
        let slot = self.slot_mut(&key);
        match slot.get_mut(key.as_ref()) {
            Some(Value::List(items)) => match value {
                Value::List(more) => items.extend(more),
                scalar => items.push(scalar),
            },
            Some(_) => return Err(EntityError::NotSequence(key.to_string())),
            None => {
                let value = wrap_for_kind(kind, value);
                slot.insert(key, value);
            }
        }
        Ok(self)
    }

    /// Unconditional overwrite. Scalars are wrapped for list-kinded fields.
    pub fn replace_field(&mut self, field: FieldValue) -> Result<&mut Self, EntityError> {
        self.ensure_unfrozen(&field.key)?;
        Self::ensure_kind(&field)?;
        let FieldValue { key, kind, value } = field;
        let value = wrap_for_kind(kind, value);
        self.slot_mut(&key).insert(key, value);
        Ok(self)
    }

    /// Clear an extension field. Absent fields are a no-op.
    pub fn remove_field(&mut self, field: &FieldDescriptor) -> Result<&mut Self, EntityError> {
        self.ensure_unfrozen(field.key())?;
        if self.declared.contains_key(field.key()) {
            return Err(EntityError::RemoveDeclared(field.key().to_string()));
        }
        if self.extension.contains_key(field.key()) {
            Arc::make_mut(&mut self.extension).shift_remove(field.key());
        }
        Ok(self)
    }

    /// Builder insert for entities under construction.
    ///
    /// Panics when the entity is frozen or the value does not fit the
    /// descriptor; both are programming errors.
    pub fn put(&mut self, field: FieldValue) {
        assert!(!self.frozen, "cannot build on frozen entity (field `{}`)", field.key);
        assert!(
            field.kind.admits(&field.value),
            "field `{}` expects {}, found {}",
            field.key,
            field.kind.name(),
            field.value.kind().name()
        );
        let FieldValue { key, kind, value } = field;
        let value = wrap_for_kind(kind, value);
        self.slot_mut(&key).insert(key, value);
    }

    pub fn get_field<'a>(&'a self, field: &'a FieldDescriptor) -> Option<&'a Value> {
        self.get_field_by_name(field.key()).or_else(|| field.default_absent())
    }

    pub fn get_field_by_name(&self, name: &str) -> Option<&Value> {
        self.declared.get(name).or_else(|| self.extension.get(name))
    }

    pub fn exist_field(&self, field: &FieldDescriptor) -> bool {
        self.get_field_by_name(field.key()).is_some()
    }

    /// Populated keys, declared first, then extensions in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.declared.keys().chain(self.extension.keys()).map(|k| k.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.declared.iter().chain(self.extension.iter()).map(|(k, v)| (k.as_ref(), v))
    }

    /// Mutable access to every stored value. Tree walkers use this to reach
    /// children; they never rewrite the values themselves.
    pub(crate) fn values_mut(&mut self) -> Result<impl Iterator<Item = &mut Value>, EntityError> {
        if self.frozen {
            return Err(EntityError::Frozen { key: "*".to_string() });
        }
        Ok(Arc::make_mut(&mut self.declared)
            .values_mut()
            .chain(Arc::make_mut(&mut self.extension).values_mut()))
    }

    /// Mutable access to a single stored value.
    pub(crate) fn values_by_name_mut(&mut self, name: &str) -> Result<Option<&mut Value>, EntityError> {
        if self.frozen {
            return Err(EntityError::Frozen { key: name.to_string() });
        }
        Ok(if self.declared.contains_key(name) {
            Arc::make_mut(&mut self.declared).get_mut(name)
        } else if self.extension.contains_key(name) {
            Arc::make_mut(&mut self.extension).get_mut(name)
        } else {
            None
        })
    }

    pub fn len(&self) -> usize { self.declared.len() + self.extension.len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn is_frozen(&self) -> bool { self.frozen }

    pub fn freeze(&mut self) -> &mut Self {
        self.frozen = true;
        self
    }

    /// Independent, unfrozen clone. Shared maps are copied on first write.
    pub fn copy(&self) -> Self {
        Self { declared: self.declared.clone(), extension: self.extension.clone(), frozen: false }
    }
}

fn wrap_for_kind(kind: ValueKind, value: Value) -> Value {
    match (kind, value) {
        (ValueKind::List, Value::List(xs)) => Value::List(xs),
        (ValueKind::List, scalar) => Value::List(vec![scalar]),
        (_, value) => value,
    }
}

/// Two entities are interchangeable iff their full field sets compare equal.
impl PartialEq for MixedEntity {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(k, v)| other.get_field_by_name(k) == Some(v))
    }
}

impl Eq for MixedEntity {}

impl fmt::Display for MixedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 { write!(f, ", ")?; }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}

/// JSON debug view: every populated field, nested entities expanded.
impl MixedEntity {
    pub fn to_json(&self) -> serde_json::Value {
        let map = self.iter().map(|(k, v)| (k.to_string(), value_to_json(v))).collect();
        serde_json::Value::Object(map)
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as J;
    match value {
        Value::Bool(b) => J::Bool(*b),
        Value::Int(i) => J::from(*i),
        Value::Float(f) => J::from(f.0),
        Value::Str(s) => J::String(s.clone()),
        Value::Type(t) => t.entity().to_json(),
        Value::Node(n) => n.entity().to_json(),
        Value::Json(j) => j.clone(),
        Value::List(xs) => J::Array(xs.iter().map(value_to_json).collect()),
    }
}

// ------------------------------ Trait layer ------------------------------- //

/// Shared surface of every entity built on [`MixedEntity`].
///
/// Specializations override the mutators when some of their declared fields
/// carry stronger guarantees (an IR node's kind, for instance).
pub trait MixedModel: Sized {
    fn entity(&self) -> &MixedEntity;
    fn entity_mut(&mut self) -> &mut MixedEntity;

    fn append_field(&mut self, field: FieldValue) -> Result<&mut Self, EntityError> {
        self.entity_mut().append_field(field)?;
        Ok(self)
    }

    fn replace_field(&mut self, field: FieldValue) -> Result<&mut Self, EntityError> {
        self.entity_mut().replace_field(field)?;
        Ok(self)
    }

    fn remove_field(&mut self, field: &FieldDescriptor) -> Result<&mut Self, EntityError> {
        self.entity_mut().remove_field(field)?;
        Ok(self)
    }

    /// Builder-style replace for values under construction.
    fn with(mut self, field: FieldValue) -> Self {
        self.entity_mut().put(field);
        self
    }

    fn frozen(mut self) -> Self {
        self.freeze();
        self
    }

    fn freeze(&mut self) -> &mut Self {
        self.entity_mut().freeze();
        self
    }

    fn is_frozen(&self) -> bool { self.entity().is_frozen() }

    fn get_field<'a>(&'a self, field: &'a FieldDescriptor) -> Option<&'a Value> {
        self.entity().get_field(field)
    }

    fn exist_field(&self, field: &FieldDescriptor) -> bool { self.entity().exist_field(field) }

    fn get_bool(&self, field: &FieldDescriptor) -> bool {
        self.get_field(field).and_then(Value::as_bool).unwrap_or(false)
    }

    fn get_int(&self, field: &FieldDescriptor) -> Option<i64> {
        self.get_field(field).and_then(Value::as_int)
    }

    fn get_str<'a>(&'a self, field: &'a FieldDescriptor) -> Option<&'a str> {
        self.get_field(field).and_then(Value::as_str)
    }

    fn get_type<'a>(&'a self, field: &'a FieldDescriptor) -> Option<&'a crate::types::DyType> {
        self.get_field(field).and_then(Value::as_type)
    }

    fn get_node<'a>(&'a self, field: &'a FieldDescriptor) -> Option<&'a crate::ir::IrNode> {
        self.get_field(field).and_then(Value::as_node)
    }

    fn get_list<'a>(&'a self, field: &'a FieldDescriptor) -> &'a [Value] {
        self.get_field(field).and_then(Value::as_list).unwrap_or(&[])
    }

    fn get_types<'a>(
        &'a self,
        field: &'a FieldDescriptor,
    ) -> impl Iterator<Item = &'a crate::types::DyType> {
        self.get_list(field).iter().filter_map(Value::as_type)
    }

    fn get_strs<'a>(&'a self, field: &'a FieldDescriptor) -> impl Iterator<Item = &'a str> {
        self.get_list(field).iter().filter_map(Value::as_str)
    }

    fn keys(&self) -> impl Iterator<Item = &str> { self.entity().keys() }
}

#[cfg(test)]
mod tests {
    use super::*;

    static NAME: FieldDescriptor = FieldDescriptor::new("name", ValueKind::Str);
    static NOTE: FieldDescriptor = FieldDescriptor::new("note", ValueKind::Str);
    static TAGS: FieldDescriptor = FieldDescriptor::list("tags");
    static FLAG: FieldDescriptor = FieldDescriptor::flag("flag");

    fn entity() -> MixedEntity {
        MixedEntity::with_declared([NAME.value("thing")])
    }

    #[test]
    fn frozen_entities_reject_every_mutation() {
        let mut e = entity();
        e.freeze();
        assert!(e.is_frozen());
        assert!(matches!(e.append_field(NOTE.value("x")), Err(EntityError::Frozen { .. })));
        assert!(matches!(e.replace_field(NAME.value("y")), Err(EntityError::Frozen { .. })));
        assert!(matches!(e.remove_field(&NOTE), Err(EntityError::Frozen { .. })));
        assert!(matches!(e.values_mut(), Err(EntityError::Frozen { .. })));
        assert!(matches!(e.values_by_name_mut("name"), Err(EntityError::Frozen { .. })));
        assert_eq!(e.get_field(&NAME), Some(&Value::from("thing")));

        let mut open = entity();
        assert_eq!(open.values_mut().unwrap().count(), 1);
        assert!(open.values_by_name_mut("name").unwrap().is_some());
    }

    #[test]
    fn copy_is_unfrozen_and_independent() {
        let mut original = entity();
        original.put(TAGS.value("a"));
        original.freeze();

        let mut copy = original.copy();
        assert!(!copy.is_frozen());
        copy.append_field(TAGS.value("b")).unwrap();
        copy.replace_field(NAME.value("other")).unwrap();

        assert_eq!(original.get_field(&TAGS), Some(&Value::List(vec![Value::from("a")])));
        assert_eq!(original.get_field(&NAME), Some(&Value::from("thing")));
        assert_eq!(copy.get_field(&TAGS).and_then(Value::as_list).map(|xs| xs.len()), Some(2));
    }

    #[test]
    fn append_concatenates_sequences_only() {
        let mut e = entity();
        e.append_field(TAGS.value(vec![Value::from("a")])).unwrap();
        e.append_field(TAGS.value("b")).unwrap();
        assert_eq!(
            e.get_field(&TAGS),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );

        e.append_field(NOTE.value("n")).unwrap();
        assert!(matches!(e.append_field(NOTE.value("m")), Err(EntityError::NotSequence(_))));
    }

    #[test]
    fn replace_wraps_scalars_for_list_fields() {
        let mut e = entity();
        e.replace_field(TAGS.value("only")).unwrap();
        assert_eq!(e.get_field(&TAGS), Some(&Value::List(vec![Value::from("only")])));
    }

    #[test]
    fn declared_fields_cannot_be_removed() {
        let mut e = entity();
        assert!(matches!(e.remove_field(&NAME), Err(EntityError::RemoveDeclared(_))));
        e.append_field(NOTE.value("x")).unwrap();
        e.remove_field(&NOTE).unwrap();
        assert!(!e.exist_field(&NOTE));
        // removing something absent is fine
        e.remove_field(&NOTE).unwrap();
    }

    #[test]
    fn lookup_falls_back_to_absent_default() {
        let e = entity();
        assert_eq!(e.get_field(&FLAG), Some(&Value::Bool(false)));
        assert_eq!(e.get_field(&TAGS), Some(&Value::List(vec![])));
        assert_eq!(e.get_field(&NOTE), None);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let mut e = entity();
        let err = e.append_field(NOTE.value(3)).unwrap_err();
        assert!(matches!(err, EntityError::KindMismatch { expected: "string", .. }));
    }

    #[test]
    fn keys_list_declared_then_extension() {
        let mut e = entity();
        e.append_field(NOTE.value("x")).unwrap();
        e.append_field(FLAG.present()).unwrap();
        assert_eq!(e.keys().collect::<Vec<_>>(), vec!["name", "note", "flag"]);
    }

    #[test]
    fn json_view_expands_every_field() {
        let mut e = entity();
        e.put(TAGS.value(vec![Value::from("a"), Value::from(2)]));
        e.put(FLAG.present());
        assert_eq!(e.to_json(), serde_json::json!({"name": "thing", "tags": ["a", 2], "flag": true}));
    }

    #[test]
    fn equality_ignores_order_and_frozen_state() {
        let mut a = entity();
        a.put(NOTE.value("x"));
        a.put(FLAG.present());
        let mut b = entity();
        b.put(FLAG.present());
        b.put(NOTE.value("x"));
        b.freeze();
        assert_eq!(a, b);
        b = b.copy();
        b.put(NOTE.value("y"));
        assert_ne!(a, b);
    }
}
