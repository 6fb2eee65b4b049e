//! Structural data-shape descriptions.
//!
//! A [`DyType`] is a [`MixedEntity`] with two declared fields, `name` and
//! `kind`; everything else is a trait from the [`traits`] catalog. Canonical
//! primitives are frozen process-wide constants ([`Types`]); consumers that
//! need a variant copy first.
pub mod example;
pub mod registry;

use std::fmt;

use once_cell::sync::Lazy;

use crate::error::{EntityError, TypeError};
use crate::model::{FieldValue, MixedEntity, MixedModel, Value};

pub use example::{detect_timestamp_unit, infer_type_from_example, to_second_scale};
pub use registry::{parse_type_definition, TypeRegistry};

// ------------------------------ Trait catalog ----------------------------- //

/// Facets that can be attached to a [`DyType`].
pub mod traits {
    use crate::model::{FieldDescriptor, ValueKind};

    pub static KIND: FieldDescriptor = FieldDescriptor::new("kind", ValueKind::Str);
    pub static TYPE_NAME: FieldDescriptor = FieldDescriptor::new("name", ValueKind::Str);
    pub static FIELD_NAME: FieldDescriptor = FieldDescriptor::new("field_name", ValueKind::Str);
    pub static FIELD_TYPE: FieldDescriptor = FieldDescriptor::new("field_type", ValueKind::Type);
    pub static BIT_SIZE: FieldDescriptor = FieldDescriptor::new("bit_size", ValueKind::Int);
    pub static SIGNED: FieldDescriptor = FieldDescriptor::flag("signed");
    pub static KEY_TYPE: FieldDescriptor = FieldDescriptor::new("key", ValueKind::Type);
    pub static PARENT: FieldDescriptor = FieldDescriptor::new("parent", ValueKind::Type);
    pub static STRUCT_FIELDS: FieldDescriptor = FieldDescriptor::list("fields");
    pub static STRUCT: FieldDescriptor = FieldDescriptor::flag("struct");
    pub static DATA_TYPE: FieldDescriptor = FieldDescriptor::flag("data_type");
    pub static ENUM: FieldDescriptor = FieldDescriptor::flag("enum");
    pub static TYPE_REF: FieldDescriptor = FieldDescriptor::new("type_ref", ValueKind::Str);
    pub static VARIANTS: FieldDescriptor = FieldDescriptor::list("variants");
    pub static VARIANT_NAMES: FieldDescriptor = FieldDescriptor::list("variant_names");
    pub static RAW_VALUE: FieldDescriptor = FieldDescriptor::new("raw_value", ValueKind::Json);
    pub static GENERICS: FieldDescriptor = FieldDescriptor::list("generics");

    pub static BEFORE_LINE_COMMENT: FieldDescriptor = FieldDescriptor::list("before_line_comment");
    pub static IN_LINE_COMMENT: FieldDescriptor = FieldDescriptor::new("in_line_comment", ValueKind::Str);
    pub static BLOCK_COMMENT: FieldDescriptor = FieldDescriptor::new("block_comment", ValueKind::Str);

    pub static BOOL: FieldDescriptor = FieldDescriptor::flag("bool");
    pub static NUMERIC: FieldDescriptor = FieldDescriptor::flag("numeric");
    pub static FLOATING: FieldDescriptor = FieldDescriptor::flag("floating");
    pub static INTEGER: FieldDescriptor = FieldDescriptor::flag("integer");
    pub static STRING: FieldDescriptor = FieldDescriptor::flag("string");
    pub static TUPLE: FieldDescriptor = FieldDescriptor::flag("tuple");
    pub static VECTOR: FieldDescriptor = FieldDescriptor::flag("vector");
    pub static MAP: FieldDescriptor = FieldDescriptor::flag("map");
    pub static UNIT: FieldDescriptor = FieldDescriptor::flag("unit");
    pub static NULL: FieldDescriptor = FieldDescriptor::flag("null");
    pub static OBJECT: FieldDescriptor = FieldDescriptor::flag("object");
    pub static ALL_VALUE: FieldDescriptor = FieldDescriptor::flag("all_value");
    pub static NOT_INFERRED_TYPE: FieldDescriptor = FieldDescriptor::flag("not_inferred_type");

    pub static DEFAULT: FieldDescriptor = FieldDescriptor::new("default", ValueKind::Any);
    pub static FROM_JSON: FieldDescriptor = FieldDescriptor::flag("from_json");

    // format
    pub static SIMPLE_ENUM: FieldDescriptor = FieldDescriptor::flag("simple_enum");
    pub static STRING_WRAPPED: FieldDescriptor = FieldDescriptor::flag("string_wrapped");
    pub static TS_UNIT: FieldDescriptor = FieldDescriptor::new("ts_unit", ValueKind::Str);

    // sql
    pub static PRIMARY: FieldDescriptor = FieldDescriptor::flag("primary");
    pub static NULLABLE: FieldDescriptor = FieldDescriptor::flag("nullable");

    // rust
    pub static REFERENCE: FieldDescriptor = FieldDescriptor::flag("reference");
    pub static MUTABLE: FieldDescriptor = FieldDescriptor::flag("mutable");
    pub static LIFETIME: FieldDescriptor = FieldDescriptor::new("lifetime", ValueKind::Str);
    pub static DERIVE: FieldDescriptor = FieldDescriptor::list("derive");

    pub static TYPE_VARIABLE: FieldDescriptor = FieldDescriptor::new("type_variable", ValueKind::Any);

    /// Everything above, in registration order.
    pub static ALL: &[&FieldDescriptor] = &[
        &KIND, &TYPE_NAME, &FIELD_NAME, &FIELD_TYPE, &BIT_SIZE, &SIGNED, &KEY_TYPE,
        &PARENT, &STRUCT_FIELDS, &STRUCT, &DATA_TYPE, &ENUM, &TYPE_REF, &VARIANTS,
        &VARIANT_NAMES, &RAW_VALUE, &GENERICS, &BEFORE_LINE_COMMENT, &IN_LINE_COMMENT,
        &BLOCK_COMMENT, &BOOL, &NUMERIC, &FLOATING, &INTEGER, &STRING, &TUPLE, &VECTOR,
        &MAP, &UNIT, &NULL, &OBJECT, &ALL_VALUE, &NOT_INFERRED_TYPE, &DEFAULT, &FROM_JSON,
        &SIMPLE_ENUM, &STRING_WRAPPED, &TS_UNIT, &PRIMARY, &NULLABLE, &REFERENCE,
        &MUTABLE, &LIFETIME, &DERIVE, &TYPE_VARIABLE,
    ];
}

// --------------------------------- DyType --------------------------------- //

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DyType {
    entity: MixedEntity,
}

impl MixedModel for DyType {
    fn entity(&self) -> &MixedEntity { &self.entity }
    fn entity_mut(&mut self) -> &mut MixedEntity { &mut self.entity }
}

impl DyType {
    pub fn from_str(name: &str) -> Self {
        Self::with_kind(name, "")
    }

    /// `name` plus one defining trait; the trait's key becomes the kind.
    pub fn from_trait(name: &str, field: FieldValue) -> Self {
        let kind = field.key().to_string();
        Self::with_kind(name, &kind).with(field)
    }

    fn with_kind(name: &str, kind: &str) -> Self {
        let entity = MixedEntity::with_declared([
            traits::TYPE_NAME.value(name),
            traits::KIND.value(kind),
        ]);
        Self { entity }
    }

    /// A struct field entry: `field_name: field_type`.
    pub fn field(name: &str, ty: DyType) -> Self {
        Self::with_kind(name, "field")
            .with(traits::FIELD_NAME.value(name))
            .with(traits::FIELD_TYPE.value(ty))
    }

    pub fn name(&self) -> &str { self.get_str(&traits::TYPE_NAME).unwrap_or_default() }
    pub fn kind(&self) -> &str { self.get_str(&traits::KIND).unwrap_or_default() }

    pub fn field_name(&self) -> Option<&str> { self.get_str(&traits::FIELD_NAME) }
    pub fn field_type(&self) -> Option<&DyType> { self.get_type(&traits::FIELD_TYPE) }

    /// Field entries of a struct, in declaration order.
    pub fn struct_fields(&self) -> impl Iterator<Item = &DyType> {
        self.get_types(&traits::STRUCT_FIELDS)
    }

    pub fn variants(&self) -> impl Iterator<Item = &DyType> {
        self.get_types(&traits::VARIANTS)
    }

    pub fn generics(&self) -> impl Iterator<Item = &DyType> {
        self.get_types(&traits::GENERICS)
    }

    /// Unfrozen, independent clone.
    pub fn copy(&self) -> Self {
        Self { entity: self.entity.copy() }
    }

    /// Copy-then-mark a numeric type as carried inside a JSON string.
    pub fn string_wrapped(&self) -> Self {
        self.copy().with(traits::STRING_WRAPPED.present())
    }

    fn list_mut(&mut self, key: &str) -> Result<Option<&mut Vec<Value>>, EntityError> {
        if self.is_frozen() {
            return Err(EntityError::Frozen { key: key.to_string() });
        }
        Ok(self
            .entity
            .values_by_name_mut(key)?
            .and_then(|v| match v {
                Value::List(xs) => Some(xs),
                _ => None,
            }))
    }
}

impl fmt::Display for DyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let generics: Vec<String> = self.generics().map(|g| g.to_string()).collect();
        if generics.is_empty() || self.get_bool(&traits::OBJECT) {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}<{}>", self.name(), generics.join(", "))
        }
    }
}

// ------------------------------ Constructors ------------------------------ //

/// Canonical primitives and composite builders.
pub struct Types;

fn int_type(name: &str, bits: i64, signed: bool) -> DyType {
    DyType::from_trait(name, traits::INTEGER.present())
        .with(traits::NUMERIC.present())
        .with(traits::BIT_SIZE.value(bits))
        .with(traits::SIGNED.value(signed))
}

fn float_type(name: &str, bits: i64) -> DyType {
    DyType::from_trait(name, traits::FLOATING.present())
        .with(traits::NUMERIC.present())
        .with(traits::BIT_SIZE.value(bits))
        .with(traits::SIGNED.present())
}

/// Build an integer from a primitive name such as `i32` or `u8`.
pub fn build_int(name: &str) -> Result<DyType, TypeError> {
    let signed = match name.chars().next() {
        Some('i') => true,
        Some('u') => false,
        _ => return Err(TypeError::InvalidArgument(format!("not an integer type: {name}"))),
    };
    let bits = name[1..]
        .parse::<i64>()
        .ok()
        .filter(|&b| matches!(b, 8 | 16 | 32 | 64 | 128))
        .ok_or_else(|| TypeError::InvalidArgument(format!("bad bit size in {name}")))?;
    Ok(int_type(name, bits, signed))
}

/// Build a float from `f32` / `f64`.
pub fn build_float(name: &str) -> Result<DyType, TypeError> {
    let bits = name
        .strip_prefix('f')
        .and_then(|b| b.parse::<i64>().ok())
        .filter(|&b| matches!(b, 32 | 64))
        .ok_or_else(|| TypeError::InvalidArgument(format!("not a float type: {name}")))?;
    Ok(float_type(name, bits))
}

macro_rules! canonical {
    ($($fn_name:ident => $init:expr;)*) => {
        impl Types {
            $(
                pub fn $fn_name() -> &'static DyType {
                    static TY: Lazy<DyType> = Lazy::new(|| $init.frozen());
                    &TY
                }
            )*
        }
    };
}

canonical! {
    bool => DyType::from_trait("bool", traits::BOOL.present());
    i8 => int_type("i8", 8, true);
    i16 => int_type("i16", 16, true);
    i32 => int_type("i32", 32, true);
    i64 => int_type("i64", 64, true);
    i128 => int_type("i128", 128, true);
    u8 => int_type("u8", 8, false);
    u16 => int_type("u16", 16, false);
    u32 => int_type("u32", 32, false);
    u64 => int_type("u64", 64, false);
    u128 => int_type("u128", 128, false);
    string => DyType::from_trait("string", traits::STRING.present());
    f32 => float_type("f32", 32);
    f64 => float_type("f64", 64);
    none => DyType::from_trait("none", traits::NULL.present()).with(traits::NULLABLE.present());
    unit => DyType::from_trait("unit", traits::UNIT.present()).with(traits::NULL.present());
    all_value => DyType::from_trait("all_value", traits::ALL_VALUE.present());
    object => DyType::from_trait("object", traits::OBJECT.present())
        .with(traits::MAP.present())
        .with(traits::GENERICS.value(vec![Types::string().clone(), Types::all_value().clone()]));
}

impl Types {
    /// Every canonical constant, for registry seeding.
    pub fn canonical() -> Vec<&'static DyType> {
        vec![
            Self::bool(), Self::i8(), Self::i16(), Self::i32(), Self::i64(), Self::i128(),
            Self::u8(), Self::u16(), Self::u32(), Self::u64(), Self::u128(), Self::string(),
            Self::f32(), Self::f64(), Self::none(), Self::unit(), Self::all_value(),
            Self::object(),
        ]
    }

    pub fn structure(name: &str, fields: Vec<DyType>) -> DyType {
        DyType::from_trait(name, traits::STRUCT.present())
            .with(traits::STRUCT_FIELDS.value(fields))
            .with(traits::DATA_TYPE.present())
    }

    pub fn enumeration(name: &str, variants: Vec<DyType>) -> DyType {
        DyType::from_trait(name, traits::ENUM.present()).with(traits::VARIANTS.value(variants))
    }

    /// One enum variant; the first name is primary, the rest are aliases.
    pub fn variant(names: Vec<String>) -> DyType {
        let primary = names.first().cloned().unwrap_or_default();
        DyType::with_kind(&primary, "variant").with(traits::VARIANT_NAMES.value(names))
    }

    pub fn vector(element: DyType) -> DyType {
        DyType::from_trait("vector", traits::VECTOR.present())
            .with(traits::GENERICS.value(vec![element]))
    }

    pub fn tuple(name: &str, elements: Vec<DyType>) -> DyType {
        DyType::from_trait(name, traits::TUPLE.present()).with(traits::GENERICS.value(elements))
    }

    pub fn map(key: DyType, value: DyType) -> DyType {
        DyType::from_trait("map", traits::MAP.present())
            .with(traits::GENERICS.value(vec![key, value]))
    }
}

// -------------------------------- Walking --------------------------------- //

/// Pre-order walk over struct field entries and vector elements.
/// Leaves (and field entries) are handed to `process` with their depth.
pub fn walk_type(node: &DyType, process: &mut impl FnMut(usize, &DyType)) {
    fn inner(node: &DyType, depth: usize, process: &mut impl FnMut(usize, &DyType)) {
        if node.get_bool(&traits::STRUCT) {
            for field in node.struct_fields() {
                inner(field, depth + 1, process);
            }
        } else if node.get_bool(&traits::VECTOR) {
            for ty in node.generics() {
                inner(ty, depth + 1, process);
            }
        } else {
            process(depth, node);
            if let Some(ty) = node.field_type() {
                inner(ty, depth, process);
            }
        }
    }
    inner(node, 0, process)
}

/// Mutable variant of [`walk_type`]. Frozen subtrees are shared constants and
/// hold no field entries of their own, so they are not descended into.
pub fn walk_type_mut<E>(
    node: &mut DyType,
    process: &mut impl FnMut(usize, &mut DyType) -> Result<(), E>,
) -> Result<(), E>
where
    E: From<EntityError>,
{
    fn inner<E: From<EntityError>>(
        node: &mut DyType,
        depth: usize,
        process: &mut impl FnMut(usize, &mut DyType) -> Result<(), E>,
    ) -> Result<(), E> {
        if node.is_frozen() {
            return Ok(());
        }
        let key = if node.get_bool(&traits::STRUCT) {
            Some(traits::STRUCT_FIELDS.key())
        } else if node.get_bool(&traits::VECTOR) {
            Some(traits::GENERICS.key())
        } else {
            None
        };
        match key {
            Some(key) => {
                if let Some(items) = node.list_mut(key)? {
                    for item in items.iter_mut() {
                        if let Value::Type(ty) = item {
                            inner(ty, depth + 1, process)?;
                        }
                    }
                }
            }
            None => {
                process(depth, node)?;
                if node.field_type().is_some_and(|ty| !ty.is_frozen()) {
                    if let Some(Value::Type(ty)) =
                        node.entity.values_by_name_mut(traits::FIELD_TYPE.key())?
                    {
                        inner(ty, depth, process)?;
                    }
                }
            }
        }
        Ok(())
    }
    inner(node, 0, process)
}

/// Like [`walk_type_mut`], numbering repeated field names by occurrence
/// (1-based) so the n-th `"id"` key in a document can be matched.
pub fn walk_type_with_count<E>(
    node: &mut DyType,
    process: &mut impl FnMut(usize, usize, &str, &mut DyType) -> Result<(), E>,
) -> Result<(), E>
where
    E: From<EntityError>,
{
    let mut counts = std::collections::BTreeMap::<String, usize>::new();
    walk_type_mut(node, &mut |depth, ty: &mut DyType| {
        let Some(name) = ty.field_name().map(str::to_string) else {
            return Ok(());
        };
        let count = counts.entry(name.clone()).or_insert(0);
        *count += 1;
        process(depth, *count, &name, ty)
    })
}
