use serde_json::Value as JsonValue;

use super::{attrs, IrNode};
use crate::error::TypeError;
use crate::model::MixedModel;
use crate::types::{infer_type_from_example, traits, Types};

/// Builders for the node shapes front ends produce.
pub struct Nodes;

impl Nodes {
    pub fn program(children: Vec<IrNode>) -> IrNode {
        IrNode::from_attribute(attrs::PROGRAM.present()).with(attrs::CHILDREN.value(children))
    }

    pub fn block(children: Vec<IrNode>) -> IrNode {
        IrNode::from_attribute(attrs::BLOCK_STATEMENT.present())
            .with(attrs::CHILDREN.value(children))
    }

    pub fn statement(inner: IrNode) -> IrNode {
        IrNode::from_attribute(attrs::STATEMENT.value(inner))
    }

    pub fn identifier(name: &str) -> IrNode {
        IrNode::from_attribute(attrs::IDENTIFIER.value(name))
    }

    pub fn this() -> IrNode {
        IrNode::from_attribute(attrs::THIS_EXPRESSION.present())
    }

    /// A literal with its source text, its value, and the type that value
    /// implies.
    pub fn literal(raw_code: &str, value: JsonValue) -> Result<IrNode, TypeError> {
        let inferred = infer_type_from_example(&value, "")?;
        Ok(IrNode::from_attribute(attrs::LITERAL.present())
            .with(attrs::RAW_CODE.value(raw_code))
            .with(attrs::RAW_VALUE.value(value))
            .with(attrs::INFERRED_TYPE.value(inferred)))
    }

    pub fn variable_declaration(id: &str, init: Option<IrNode>) -> IrNode {
        let node = IrNode::from_attribute(attrs::VARIABLE_DECLARATION.present())
            .with(attrs::VARIABLE_DECLARATION_ID.value(id));
        match init {
            Some(init) => node.with(attrs::DEFAULT_VALUE.value(init)),
            None => node,
        }
    }

    pub fn variable_declarations(decls: Vec<IrNode>) -> IrNode {
        IrNode::from_attribute(attrs::VARIABLE_DECLARATIONS.value(decls))
    }

    pub fn assign(left: IrNode, right: IrNode) -> IrNode {
        IrNode::from_attribute(attrs::ASSIGN_EXPRESSION.present())
            .with(attrs::ASSIGN_EXPRESSION_LEFT.value(left))
            .with(attrs::ASSIGN_EXPRESSION_RIGHT.value(right))
    }

    pub fn operator(op: &str, left: IrNode, right: IrNode) -> IrNode {
        IrNode::from_attribute(attrs::OPERATOR.value(op))
            .with(attrs::OPERATOR_LEFT.value(left))
            .with(attrs::OPERATOR_RIGHT.value(right))
    }

    pub fn prefix(op: &str, operand: IrNode) -> IrNode {
        IrNode::from_attribute(attrs::OPERATOR.value(op))
            .with(attrs::OPERATOR_SINGLE_PREFIX.value(operand))
    }

    /// `return;` carries no returnee and takes no part in inference.
    pub fn ret(returnee: Option<IrNode>) -> IrNode {
        match returnee {
            Some(value) => IrNode::from_attribute(attrs::RETURN.value(value)),
            None => IrNode::from_str(attrs::RETURN.key()),
        }
    }

    /// `obj.prop` (static) or `obj[prop]` (computed).
    pub fn member(object: IrNode, property: IrNode, computed: bool) -> IrNode {
        let flag = if computed {
            &attrs::COMPUTED_MEMBER_EXPRESSION
        } else {
            &attrs::STATIC_MEMBER_EXPRESSION
        };
        IrNode::from_attribute(flag.present())
            .with(attrs::MEMBER_EXPRESSION_OBJECT.value(object))
            .with(attrs::MEMBER_EXPRESSION_PROPERTY.value(property))
    }

    pub fn call(callee: IrNode, arguments: Vec<IrNode>) -> IrNode {
        IrNode::from_attribute(attrs::FUNCTION_CALL.present())
            .with(attrs::CALLEE.value(callee))
            .with(attrs::ARGUMENTS.value(arguments))
    }

    /// Parameter whose type is not known yet; inference may overwrite it.
    pub fn argument(name: &str, default: Option<IrNode>) -> IrNode {
        let unknown = Types::all_value().copy().with(traits::NOT_INFERRED_TYPE.present()).frozen();
        let node = IrNode::from_attribute(attrs::ARGUMENT_NAME.value(name))
            .with(attrs::ARGUMENT_TYPE.value(unknown));
        match default {
            Some(default) => node.with(attrs::DEFAULT_VALUE.value(default)),
            None => node,
        }
    }

    pub fn function_decl(name: &str, arguments: Vec<IrNode>, body: IrNode, is_async: bool) -> IrNode {
        IrNode::from_attribute(attrs::FUNCTION_DECL.present())
            .with(attrs::NAME.value(name))
            .with(attrs::ASYNC.value(is_async))
            .with(attrs::ARGUMENTS.value(arguments))
            .with(attrs::FUNCTION_BODY.value(body))
    }

    pub fn class_decl(name: &str, super_classes: Vec<String>, children: Vec<IrNode>) -> IrNode {
        IrNode::from_attribute(attrs::CLASS_DECLARATION.present())
            .with(attrs::NAME.value(name))
            .with(attrs::SUPER_CLASSES.value(super_classes))
            .with(attrs::CHILDREN.value(children))
    }

    pub fn print(content: IrNode) -> IrNode {
        IrNode::from_attribute(attrs::PRINT.present()).with(attrs::CHILDREN.value(vec![content]))
    }

    pub fn require(path: &str, key: Option<&str>, value: Option<&str>) -> IrNode {
        let mut node = IrNode::from_attribute(attrs::REQUIRE.present())
            .with(attrs::REQUIRE_PATH.value(path));
        if let Some(key) = key {
            node = node.with(attrs::REQUIRE_KEY.value(key));
        }
        if let Some(value) = value {
            node = node.with(attrs::REQUIRE_VALUE.value(value));
        }
        node
    }

    /// One `require` per imported name, all from `path`.
    pub fn requires(path: &str, names: &[(&str, Option<&str>)]) -> IrNode {
        let items: Vec<IrNode> = names
            .iter()
            .map(|(key, value)| Self::require(path, Some(*key), *value))
            .collect();
        IrNode::from_attribute(attrs::REQUIRES.value(items))
    }
}
