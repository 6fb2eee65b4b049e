use std::borrow::Cow;
use std::fmt;

use ordered_float::OrderedFloat;

use crate::ir::IrNode;
use crate::types::DyType;

// ------------------------------- Values ----------------------------------- //

/// Shape a descriptor accepts. Checked at insert time, not at call time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Str,
    Type,
    Node,
    Json,
    List,
    Any,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Type => "type",
            ValueKind::Node => "node",
            ValueKind::Json => "json",
            ValueKind::List => "list",
            ValueKind::Any => "any",
        }
    }

    /// List-kinded descriptors accept scalars too; they get wrapped on insert.
    pub fn admits(self, value: &Value) -> bool {
        match self {
            ValueKind::Any | ValueKind::List => true,
            ValueKind::Float => matches!(value, Value::Float(_) | Value::Int(_)),
            kind => kind == value.kind(),
        }
    }
}

/// Payload stored under a field key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    Type(DyType),
    Node(IrNode),
    Json(serde_json::Value),
    List(Vec<Value>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Type(_) => ValueKind::Type,
            Value::Node(_) => ValueKind::Node,
            Value::Json(_) => ValueKind::Json,
            Value::List(_) => ValueKind::List,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self { Value::Bool(b) => Some(*b), _ => None }
    }
    pub fn as_int(&self) -> Option<i64> {
        match self { Value::Int(i) => Some(*i), _ => None }
    }
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(f.0),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self { Value::Str(s) => Some(s), _ => None }
    }
    pub fn as_type(&self) -> Option<&DyType> {
        match self { Value::Type(t) => Some(t), _ => None }
    }
    pub fn as_node(&self) -> Option<&IrNode> {
        match self { Value::Node(n) => Some(n), _ => None }
    }
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self { Value::Json(j) => Some(j), _ => None }
    }
    pub fn as_list(&self) -> Option<&[Value]> {
        match self { Value::List(xs) => Some(xs), _ => None }
    }

    /// Convert a JSON scalar/array into the closest native value.
    /// Objects and null stay raw JSON.
    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as J;
        match json {
            J::Bool(b) => Value::Bool(*b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(OrderedFloat(n.as_f64().unwrap_or(f64::NAN))),
            },
            J::String(s) => Value::Str(s.clone()),
            J::Array(xs) => Value::List(xs.iter().map(Value::from_json).collect()),
            J::Null | J::Object(_) => Value::Json(json.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", x.0),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Type(t) => write!(f, "{t}"),
            Value::Node(n) => write!(f, "{n}"),
            Value::Json(j) => write!(f, "{j}"),
            Value::List(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<u32> for Value { fn from(v: u32) -> Self { Value::Int(v as i64) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(OrderedFloat(v)) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::Str(v.to_string()) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::Str(v) } }
impl From<DyType> for Value { fn from(v: DyType) -> Self { Value::Type(v) } }
impl From<IrNode> for Value { fn from(v: IrNode) -> Self { Value::Node(v) } }
impl From<serde_json::Value> for Value { fn from(v: serde_json::Value) -> Self { Value::Json(v) } }
impl From<Vec<Value>> for Value { fn from(v: Vec<Value>) -> Self { Value::List(v) } }
impl From<Vec<DyType>> for Value {
    fn from(v: Vec<DyType>) -> Self { Value::List(v.into_iter().map(Value::Type).collect()) }
}
impl From<Vec<IrNode>> for Value {
    fn from(v: Vec<IrNode>) -> Self { Value::List(v.into_iter().map(Value::Node).collect()) }
}
impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self { Value::List(v.into_iter().map(Value::Str).collect()) }
}

// ----------------------------- Descriptors -------------------------------- //

/// A named, typed field tag. Catalog entries are `static`s; overlays coming
/// from model definitions build owned ones with [`FieldDescriptor::dynamic`].
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    key: Cow<'static, str>,
    kind: ValueKind,
    default_present: Option<Value>,
    default_absent: Option<Value>,
}

impl FieldDescriptor {
    pub const fn new(key: &'static str, kind: ValueKind) -> Self {
        Self { key: Cow::Borrowed(key), kind, default_present: None, default_absent: None }
    }

    /// Boolean marker: present → `true`, absent → `false`.
    pub const fn flag(key: &'static str) -> Self {
        Self {
            key: Cow::Borrowed(key),
            kind: ValueKind::Bool,
            default_present: Some(Value::Bool(true)),
            default_absent: Some(Value::Bool(false)),
        }
    }

    /// Sequence field: present → `[]`, absent → `[]`.
    pub const fn list(key: &'static str) -> Self {
        Self {
            key: Cow::Borrowed(key),
            kind: ValueKind::List,
            default_present: Some(Value::List(Vec::new())),
            default_absent: Some(Value::List(Vec::new())),
        }
    }

    pub fn dynamic(key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            key: Cow::Owned(key.into()),
            kind,
            default_present: None,
            default_absent: None,
        }
    }

    pub fn with_defaults(mut self, present: Option<Value>, absent: Option<Value>) -> Self {
        self.default_present = present;
        self.default_absent = absent;
        self
    }

    pub fn key(&self) -> &str { &self.key }
    pub fn kind(&self) -> ValueKind { self.kind }
    pub fn default_absent(&self) -> Option<&Value> { self.default_absent.as_ref() }
    pub fn default_present(&self) -> Option<&Value> { self.default_present.as_ref() }

    /// Apply a value to this descriptor.
    pub fn value(&self, value: impl Into<Value>) -> FieldValue {
        FieldValue { key: self.key.clone(), kind: self.kind, value: value.into() }
    }

    /// Apply the default-present value (`true` when none is declared).
    pub fn present(&self) -> FieldValue {
        let value = self.default_present.clone().unwrap_or(Value::Bool(true));
        FieldValue { key: self.key.clone(), kind: self.kind, value }
    }

    /// Apply a JSON value, keeping it raw only for JSON-kinded descriptors.
    pub fn from_json(&self, json: &serde_json::Value) -> FieldValue {
        let value = match self.kind {
            ValueKind::Json => Value::Json(json.clone()),
            _ => Value::from_json(json),
        };
        FieldValue { key: self.key.clone(), kind: self.kind, value }
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.kind.name())
    }
}

/// Ephemeral key/value pair consumed by append/replace.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldValue {
    pub(crate) key: Cow<'static, str>,
    pub(crate) kind: ValueKind,
    pub(crate) value: Value,
}

impl FieldValue {
    pub fn key(&self) -> &str { &self.key }
    pub fn kind(&self) -> ValueKind { self.kind }
    pub fn value(&self) -> &Value { &self.value }
    pub fn into_value(self) -> Value { self.value }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static NAME: FieldDescriptor = FieldDescriptor::new("name", ValueKind::Str);
    static TAGS: FieldDescriptor = FieldDescriptor::list("tags");
    static STRUCT: FieldDescriptor = FieldDescriptor::flag("struct");

    #[test]
    fn flags_default_to_true_when_present() {
        let fv = STRUCT.present();
        assert_eq!(fv.key(), "struct");
        assert_eq!(fv.value(), &Value::Bool(true));
        assert_eq!(STRUCT.default_absent(), Some(&Value::Bool(false)));
    }

    #[test]
    fn list_descriptors_accept_scalars() {
        assert!(TAGS.kind().admits(&Value::from("a")));
        assert!(!NAME.kind().admits(&Value::Int(1)));
        assert!(ValueKind::Float.admits(&Value::Int(3)));
    }

    #[test]
    fn json_values_map_to_native_kinds() {
        assert_eq!(Value::from_json(&serde_json::json!(true)), Value::Bool(true));
        assert_eq!(Value::from_json(&serde_json::json!(3)), Value::Int(3));
        assert_eq!(Value::from_json(&serde_json::json!("x")), Value::from("x"));
        assert_eq!(
            Value::from_json(&serde_json::json!([1, "a"])),
            Value::List(vec![Value::Int(1), Value::from("a")])
        );
        assert!(matches!(Value::from_json(&serde_json::json!({"a": 1})), Value::Json(_)));
    }
}
