//! Program-fragment IR. Every node is a MixedEntity tagged with one "kind";
//! all other semantics live in extension fields from the `attrs` catalog.
pub mod nodes;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::EntityError;
use crate::model::{FieldDescriptor, FieldValue, MixedEntity, MixedModel, Value};

pub use nodes::Nodes;

// ———————————————————————————————————————————————————————————————————————————
// Attribute catalog
// ———————————————————————————————————————————————————————————————————————————

pub mod attrs {
    use crate::model::{FieldDescriptor, ValueKind};

    const fn any(key: &'static str) -> FieldDescriptor { FieldDescriptor::new(key, ValueKind::Any) }
    const fn node(key: &'static str) -> FieldDescriptor { FieldDescriptor::new(key, ValueKind::Node) }
    const fn text(key: &'static str) -> FieldDescriptor { FieldDescriptor::new(key, ValueKind::Str) }
    const fn ty(key: &'static str) -> FieldDescriptor { FieldDescriptor::new(key, ValueKind::Type) }
    const fn flag(key: &'static str) -> FieldDescriptor { FieldDescriptor::flag(key) }
    const fn list(key: &'static str) -> FieldDescriptor { FieldDescriptor::list(key) }

    pub static KIND: FieldDescriptor = text("kind");
    pub static NAME: FieldDescriptor = text("name");
    pub static CHILDREN: FieldDescriptor = list("children");
    pub static STATEMENT: FieldDescriptor = any("statement");
    pub static PROGRAM: FieldDescriptor = flag("program");
    pub static DIRECTIVE: FieldDescriptor = any("directive");
    pub static BLOCK_STATEMENT: FieldDescriptor = flag("block_statement");
    pub static EXPRESSION: FieldDescriptor = any("expression");

    // declarations
    pub static CLASS_DECLARATION: FieldDescriptor = flag("class_declaration");
    pub static SUPER_CLASSES: FieldDescriptor = list("super_class");
    pub static FUNCTION_DECL: FieldDescriptor = flag("function_decl");
    pub static FUNCTION_BODY: FieldDescriptor = node("function_body");
    pub static FUNCTION_RETURN: FieldDescriptor = ty("function_return");
    pub static ASYNC: FieldDescriptor = flag("async");
    pub static ARGUMENTS: FieldDescriptor = list("arguments");
    pub static ARGUMENT: FieldDescriptor = flag("argument");
    pub static ARGUMENT_NAME: FieldDescriptor = text("argument_name");
    pub static ARGUMENT_TYPE: FieldDescriptor = ty("argument_type");
    pub static DEFAULT_VALUE: FieldDescriptor = any("default_value");
    pub static VARIABLE_DECLARATIONS: FieldDescriptor = list("variable_declarations");
    pub static VARIABLE_DECLARATION: FieldDescriptor = flag("variable_declaration");
    pub static VARIABLE_DECLARATION_ID: FieldDescriptor = text("variable_declaration_id");
    pub static MUTABLE: FieldDescriptor = flag("mutable");

    // control flow
    pub static RETURN: FieldDescriptor = any("return");
    pub static WHILE_LOOP: FieldDescriptor = any("while_loop");
    pub static C_FOR_LOOP: FieldDescriptor = flag("c_for_loop");
    pub static C_FOR_LOOP_INIT: FieldDescriptor = any("c_for_loop_init");
    pub static C_FOR_LOOP_TEST: FieldDescriptor = any("c_for_loop_test");
    pub static C_FOR_LOOP_UPDATE: FieldDescriptor = any("c_for_loop_update");
    pub static TEST_EXPRESSION: FieldDescriptor = any("test_expression");
    pub static IF_CLAUSES: FieldDescriptor = flag("if_clauses");
    pub static IF_CLAUSE: FieldDescriptor = flag("if_clause");
    pub static ELSE_IF_CLAUSE: FieldDescriptor = flag("else_if_clause");
    pub static ELSE_CLAUSE: FieldDescriptor = flag("else_clause");
    pub static CONSEQUENCE: FieldDescriptor = any("consequence");
    pub static ALTERNATIVE: FieldDescriptor = any("alternative");
    pub static BREAK_STATEMENT: FieldDescriptor = flag("break_statement");
    pub static CONTINUE_STATEMENT: FieldDescriptor = flag("continue_statement");
    pub static THROW_STATEMENT: FieldDescriptor = any("throw_statement");
    pub static TRY_STATEMENT: FieldDescriptor = list("try_statement");
    pub static CATCH_CLAUSES: FieldDescriptor = list("catch_clauses");
    pub static CATCH_CLAUSE: FieldDescriptor = flag("catch_clause");
    pub static FINALLY_CLAUSE: FieldDescriptor = list("finally_statement");

    // expressions
    pub static FUNCTION_CALL: FieldDescriptor = flag("function_call");
    pub static CALLEE: FieldDescriptor = any("callee");
    pub static LITERAL: FieldDescriptor = flag("literal");
    pub static RAW_CODE: FieldDescriptor = text("raw_code");
    pub static RAW_VALUE: FieldDescriptor = FieldDescriptor::new("raw_value", ValueKind::Json);
    pub static IDENTIFIER: FieldDescriptor = text("identifier");
    pub static THIS_EXPRESSION: FieldDescriptor = flag("this_expression");
    pub static SUPER_EXPRESSION: FieldDescriptor = flag("super_expression");
    pub static OPERATOR: FieldDescriptor = text("operator");
    pub static OPERATOR_LEFT: FieldDescriptor = any("operator_left");
    pub static OPERATOR_MIDDLE: FieldDescriptor = any("operator_middle");
    pub static OPERATOR_RIGHT: FieldDescriptor = any("operator_right");
    pub static OPERATOR_SINGLE_PREFIX: FieldDescriptor = any("operator_single_prefix");
    pub static OPERATOR_SINGLE_POSTFIX: FieldDescriptor = any("operator_single_postfix");
    pub static STATIC_MEMBER_EXPRESSION: FieldDescriptor = flag("static_member_expression");
    pub static COMPUTED_MEMBER_EXPRESSION: FieldDescriptor = flag("computed_member_expression");
    pub static MEMBER_EXPRESSION_OBJECT: FieldDescriptor = node("member_expression_object");
    pub static MEMBER_EXPRESSION_PROPERTY: FieldDescriptor = node("member_expression_property");
    pub static ASSIGN_EXPRESSION: FieldDescriptor = flag("assign_expression");
    pub static ASSIGN_EXPRESSION_LEFT: FieldDescriptor = node("assign_expression_left");
    pub static ASSIGN_EXPRESSION_RIGHT: FieldDescriptor = node("assign_expression_right");
    pub static AWAIT_EXPRESSION: FieldDescriptor = any("await_expression");
    pub static NEW_EXPRESSION: FieldDescriptor = flag("new_expression");
    pub static CONDITIONAL_EXPRESSION: FieldDescriptor = flag("conditional_expression");
    pub static OBJECT_PROPERTIES: FieldDescriptor = list("object_properties");
    pub static OBJECT_PROPERTY: FieldDescriptor = flag("object_property");
    pub static KEY_NAME: FieldDescriptor = text("key");
    pub static VALUE: FieldDescriptor = any("value");
    pub static ARRAY_ELEMENTS: FieldDescriptor = list("array_elements");

    // modules
    pub static PRINT: FieldDescriptor = flag("print");
    pub static REQUIRES: FieldDescriptor = list("requires");
    pub static REQUIRE: FieldDescriptor = flag("require");
    pub static REQUIRE_PATH: FieldDescriptor = text("require_path");
    pub static REQUIRE_KEY: FieldDescriptor = text("require_key");
    pub static REQUIRE_VALUE: FieldDescriptor = text("require_value");

    // inference output
    pub static INFERRED_TYPE: FieldDescriptor = ty("inferred_type");
    pub static GLOBAL_PATH: FieldDescriptor = text("global_path");
}

// ———————————————————————————————————————————————————————————————————————————
// Nodes
// ———————————————————————————————————————————————————————————————————————————

/// Process-unique identity of an IR node. Equality of nodes is structural;
/// the id is what ties a blackboard entry back to one site in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    fn next() -> Self { NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)) }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Clone, Debug)]
pub struct IrNode {
    id: NodeId,
    entity: MixedEntity,
}

impl IrNode {
    /// The only way to pick a kind. It never changes afterwards.
    pub fn from_str(kind: &str) -> Self {
        Self { id: NodeId::next(), entity: MixedEntity::with_declared([attrs::KIND.value(kind)]) }
    }

    /// Kind named after the attribute, with the attribute itself attached.
    pub fn from_attribute(attr: FieldValue) -> Self {
        let kind = attr.key().to_string();
        Self::from_str(&kind).with(attr)
    }

    pub fn id(&self) -> NodeId { self.id }

    pub fn kind(&self) -> &str { self.entity.get_field(&attrs::KIND).and_then(Value::as_str).unwrap_or_default() }

    /// Independent unfrozen clone with a fresh identity.
    pub fn copy(&self) -> Self {
        Self { id: NodeId::next(), entity: self.entity.copy() }
    }

    pub fn get_nodes<'a>(&'a self, field: &'a FieldDescriptor) -> impl Iterator<Item = &'a IrNode> {
        self.get_list(field).iter().filter_map(Value::as_node)
    }

    /// Child nodes in field order: direct node values and node elements of lists.
    pub fn child_nodes(&self) -> impl Iterator<Item = &IrNode> {
        self.entity.iter().flat_map(|(_, value)| match value {
            Value::Node(n) => vec![n],
            Value::List(xs) => xs.iter().filter_map(Value::as_node).collect(),
            _ => Vec::new(),
        })
    }

    fn ensure_not_kind(field_key: &str) -> Result<(), EntityError> {
        if field_key == attrs::KIND.key() {
            return Err(EntityError::ImmutableKind);
        }
        Ok(())
    }
}

impl MixedModel for IrNode {
    fn entity(&self) -> &MixedEntity { &self.entity }
    fn entity_mut(&mut self) -> &mut MixedEntity { &mut self.entity }

    fn append_field(&mut self, field: FieldValue) -> Result<&mut Self, EntityError> {
        Self::ensure_not_kind(field.key())?;
        self.entity.append_field(field)?;
        Ok(self)
    }

    fn replace_field(&mut self, field: FieldValue) -> Result<&mut Self, EntityError> {
        Self::ensure_not_kind(field.key())?;
        self.entity.replace_field(field)?;
        Ok(self)
    }

    fn remove_field(&mut self, field: &FieldDescriptor) -> Result<&mut Self, EntityError> {
        Self::ensure_not_kind(field.key())?;
        self.entity.remove_field(field)?;
        Ok(self)
    }

    fn with(mut self, field: FieldValue) -> Self {
        assert_ne!(field.key(), attrs::KIND.key(), "the kind of an IR node is set once");
        self.entity.put(field);
        self
    }
}

impl PartialEq for IrNode {
    fn eq(&self, other: &Self) -> bool { self.entity == other.entity }
}

impl Eq for IrNode {}

impl fmt::Display for IrNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entity)
    }
}

// ———————————————————————————————————————————————————————————————————————————
// Traversal
// ———————————————————————————————————————————————————————————————————————————

/// Return value of a `walk_nodes` visitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Walk {
    Continue,
    /// Do not descend into this node's children.
    Skip,
}

/// Pre-order traversal: visit, then recurse into every node-valued field in
/// field order.
pub fn walk_nodes<'a>(node: &'a IrNode, visit: &mut impl FnMut(&'a IrNode) -> Walk) {
    if visit(node) == Walk::Skip {
        return;
    }
    for child in node.child_nodes() {
        walk_nodes(child, visit);
    }
}

/// Mutable pre-order traversal, used to write inference results back.
/// Frozen nodes and everything below them are skipped.
pub fn walk_nodes_mut<E>(
    node: &mut IrNode,
    visit: &mut impl FnMut(&mut IrNode) -> Result<(), E>,
) -> Result<(), E>
where
    E: From<EntityError>,
{
    if node.is_frozen() {
        return Ok(());
    }
    visit(node)?;
    for value in node.entity.values_mut()? {
        match value {
            Value::Node(child) => walk_nodes_mut(child, visit)?,
            Value::List(items) => {
                for item in items.iter_mut() {
                    if let Value::Node(child) = item {
                        walk_nodes_mut(child, visit)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}
