//! Per-construct inference rules.
//!
//! Every processor looks at one node kind and records relations on a fresh
//! [`TypeRelationBuilder`]: known types, `equals_to` edges between paths, or
//! a named group with its own unifier.
use super::blackboard::{
    Blackboard, NodeGroup, PostAssignTypeField, PostAssignTypeInferred, TypeRelationBuilder, Unifier,
};
use super::scope::{Environment, PathNode, Scope};
use crate::error::InferenceError;
use crate::ir::{attrs, walk_nodes, IrNode, Walk};
use crate::model::MixedModel;
use crate::types::{traits, DyType, Types};

pub trait NodeTypeProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    fn accept(&self, node: &IrNode) -> bool;

    fn prepare_inference(
        &self,
        node: &IrNode,
        env: &Environment,
        scope: Scope,
        builder: &mut TypeRelationBuilder,
    ) -> Result<(), InferenceError>;
}

/// Every processor, in the order they see a node.
pub fn standard_processors() -> Vec<Box<dyn NodeTypeProcessor>> {
    vec![
        Box::new(VariableDeclarationProcessor),
        Box::new(AssignExpressionProcessor),
        Box::new(ReturnProcessor),
        Box::new(MemberExpressionProcessor),
        Box::new(OperatorProcessor),
        Box::new(FunctionDeclProcessor),
        Box::new(LiteralProcessor),
    ]
}

// ----------------------------- Declarations ------------------------------- //

/// `let x = init`: x ≡ init, and x's type lands on the declaration.
pub struct VariableDeclarationProcessor;

impl NodeTypeProcessor for VariableDeclarationProcessor {
    fn name(&self) -> &'static str { "variable_declaration" }

    fn accept(&self, node: &IrNode) -> bool { node.get_bool(&attrs::VARIABLE_DECLARATION) }

    fn prepare_inference(
        &self,
        node: &IrNode,
        env: &Environment,
        scope: Scope,
        builder: &mut TypeRelationBuilder,
    ) -> Result<(), InferenceError> {
        let declared = env.path_node(node, scope);
        builder.add_post_inferred_type(&declared.path, Box::new(PostAssignTypeInferred { node: node.id() }));
        if let Some(init) = node.get_node(&attrs::DEFAULT_VALUE) {
            builder.add_edge(&declared, &env.path_node(init, scope));
        }
        Ok(())
    }
}

/// `x = value`: the declaration of x ≡ value.
pub struct AssignExpressionProcessor;

impl NodeTypeProcessor for AssignExpressionProcessor {
    fn name(&self) -> &'static str { "assign_expression" }

    fn accept(&self, node: &IrNode) -> bool { node.get_bool(&attrs::ASSIGN_EXPRESSION) }

    fn prepare_inference(
        &self,
        node: &IrNode,
        env: &Environment,
        scope: Scope,
        builder: &mut TypeRelationBuilder,
    ) -> Result<(), InferenceError> {
        let (Some(left), Some(right)) = (
            node.get_node(&attrs::ASSIGN_EXPRESSION_LEFT),
            node.get_node(&attrs::ASSIGN_EXPRESSION_RIGHT),
        ) else {
            return Ok(());
        };
        builder.add_edge(&env.path_node(left, scope), &env.path_node(right, scope));
        Ok(())
    }
}

/// Function ≡ body ≡ every `return` inside it (not inside nested
/// functions). Return and argument types are written back onto the
/// declaration.
pub struct FunctionDeclProcessor;

impl NodeTypeProcessor for FunctionDeclProcessor {
    fn name(&self) -> &'static str { "function_decl" }

    fn accept(&self, node: &IrNode) -> bool { node.get_bool(&attrs::FUNCTION_DECL) }

    fn prepare_inference(
        &self,
        node: &IrNode,
        env: &Environment,
        scope: Scope,
        builder: &mut TypeRelationBuilder,
    ) -> Result<(), InferenceError> {
        let function = env.path_node(node, scope);
        builder.add_post_inferred_type(
            &function.path,
            Box::new(PostAssignTypeField { node: node.id(), field: &attrs::FUNCTION_RETURN }),
        );
        for arg in node.get_nodes(&attrs::ARGUMENTS) {
            let declared = env.path_node(arg, scope);
            builder.add_node(&declared);
            builder.add_post_inferred_type(
                &declared.path,
                Box::new(PostAssignTypeField { node: arg.id(), field: &attrs::ARGUMENT_TYPE }),
            );
        }

        let Some(body) = node.get_node(&attrs::FUNCTION_BODY) else {
            return Ok(());
        };
        let body_path = env.path_node(body, scope);
        builder.add_edge(&function, &body_path);
        walk_nodes(body, &mut |inner| {
            if inner.get_bool(&attrs::FUNCTION_DECL) {
                return Walk::Skip;
            }
            if inner.get_node(&attrs::RETURN).is_some() {
                builder.add_edge(&body_path, &env.path_node(inner, scope));
            }
            Walk::Continue
        });
        Ok(())
    }
}

// ----------------------------- Expressions -------------------------------- //

/// `return value`: the return site ≡ value.
pub struct ReturnProcessor;

impl NodeTypeProcessor for ReturnProcessor {
    fn name(&self) -> &'static str { "return" }

    fn accept(&self, node: &IrNode) -> bool { node.get_node(&attrs::RETURN).is_some() }

    fn prepare_inference(
        &self,
        node: &IrNode,
        env: &Environment,
        scope: Scope,
        builder: &mut TypeRelationBuilder,
    ) -> Result<(), InferenceError> {
        let Some(returnee) = node.get_node(&attrs::RETURN) else {
            return Ok(());
        };
        builder.add_edge(&env.path_node(node, scope), &env.path_node(returnee, scope));
        Ok(())
    }
}

const COMPARISONS: &[&str] = &["===", "==", ">=", "<=", "!=", "!==", ">", "<"];
const ARITHMETIC: &[&str] = &["+", "-", "*", "/", "%"];

/// Comparisons are bool and relate their operands; arithmetic results are
/// the type of both operands.
pub struct OperatorProcessor;

impl NodeTypeProcessor for OperatorProcessor {
    fn name(&self) -> &'static str { "operator" }

    fn accept(&self, node: &IrNode) -> bool { node.exist_field(&attrs::OPERATOR) }

    fn prepare_inference(
        &self,
        node: &IrNode,
        env: &Environment,
        scope: Scope,
        builder: &mut TypeRelationBuilder,
    ) -> Result<(), InferenceError> {
        let (Some(left), Some(right)) =
            (node.get_node(&attrs::OPERATOR_LEFT), node.get_node(&attrs::OPERATOR_RIGHT))
        else {
            return Ok(());
        };
        let op = node.get_str(&attrs::OPERATOR).unwrap_or_default();
        let site = env.path_node(node, scope);
        let left = env.path_node(left, scope);
        let right = env.path_node(right, scope);
        if COMPARISONS.contains(&op) {
            builder.add_known(&site.path, Types::bool())?;
            builder.add_edge(&left, &right);
        } else if ARITHMETIC.contains(&op) {
            builder.add_edge(&site, &left);
            builder.add_edge(&site, &right);
        }
        Ok(())
    }
}

/// A literal's type is known from its value.
pub struct LiteralProcessor;

impl NodeTypeProcessor for LiteralProcessor {
    fn name(&self) -> &'static str { "literal" }

    fn accept(&self, node: &IrNode) -> bool { node.get_bool(&attrs::LITERAL) }

    fn prepare_inference(
        &self,
        node: &IrNode,
        env: &Environment,
        scope: Scope,
        builder: &mut TypeRelationBuilder,
    ) -> Result<(), InferenceError> {
        if let Some(ty) = node.get_type(&attrs::INFERRED_TYPE) {
            builder.add_known(&env.path_node(node, scope).path, ty)?;
        }
        Ok(())
    }
}

// --------------------------- Member expressions --------------------------- //

pub const MEMBER_EXPRESSION: &str = "member_expression";
pub const LENGTH: &str = "length";

/// `obj.prop` / `obj[prop]`, by heuristic:
///
/// - an integer index means `obj` is a vector, a string key means an object
/// - a vector is indexed by `i64` and yields its element type
/// - an object is keyed by `string`
/// - `obj.length` is an `i64` and `obj` a vector unless known otherwise
///
/// Shapes that fit none of these stay unresolved.
pub struct MemberExpressionProcessor;

impl NodeTypeProcessor for MemberExpressionProcessor {
    fn name(&self) -> &'static str { "member_expression" }

    fn accept(&self, node: &IrNode) -> bool {
        node.get_bool(&attrs::STATIC_MEMBER_EXPRESSION) || node.get_bool(&attrs::COMPUTED_MEMBER_EXPRESSION)
    }

    fn prepare_inference(
        &self,
        node: &IrNode,
        env: &Environment,
        scope: Scope,
        builder: &mut TypeRelationBuilder,
    ) -> Result<(), InferenceError> {
        let (Some(object), Some(property)) = (
            node.get_node(&attrs::MEMBER_EXPRESSION_OBJECT),
            node.get_node(&attrs::MEMBER_EXPRESSION_PROPERTY),
        ) else {
            return Err(InferenceError::MemberExpression(format!("incomplete node {node}")));
        };
        let site = env.path_node(node, scope);
        let object = env.path_node(object, scope);
        let computed = node.get_bool(&attrs::COMPUTED_MEMBER_EXPRESSION);

        let prop = if let Some(name) = property.get_str(&attrs::IDENTIFIER).filter(|_| !computed) {
            if name == LENGTH {
                builder.add_node(&object);
                builder.add_group(NodeGroup::new(
                    LENGTH,
                    [("obj", object.path.as_str()), ("member_expr", site.path.as_str())],
                    Some(length_unifier()),
                ));
                return Ok(());
            }
            PathNode { path: format!("{}.{name}", object.path), node: property.id() }
        } else if property.get_bool(&attrs::LITERAL) || property.exist_field(&attrs::IDENTIFIER) {
            env.path_node(property, scope)
        } else {
            return Err(InferenceError::MemberExpression(format!("unsupported property {property}")));
        };

        builder.add_node(&object);
        builder.add_node(&prop);
        builder.add_node(&site);
        builder.add_group(NodeGroup::new(
            MEMBER_EXPRESSION,
            [
                ("obj", object.path.as_str()),
                ("prop", prop.path.as_str()),
                ("member_expr", site.path.as_str()),
            ],
            Some(member_unifier()),
        ));
        Ok(())
    }
}

fn members<'g>(group: &'g NodeGroup) -> Result<(&'g str, &'g str), InferenceError> {
    match (group.member("obj"), group.member("member_expr")) {
        (Some(obj), Some(expr)) => Ok((obj, expr)),
        _ => Err(InferenceError::MemberExpression(format!("{group:?}"))),
    }
}

fn length_unifier() -> Unifier {
    Box::new(|group, bb| {
        let (obj, expr) = members(group)?;
        let mut progress = false;
        if !bb.is_inferred(obj) {
            bb.add_inferred(obj, Types::vector(Types::all_value().clone()));
            progress = true;
        }
        if !bb.is_inferred(expr) {
            bb.add_inferred(expr, Types::i64().clone());
            progress = true;
        }
        Ok(progress)
    })
}

/// Element type of a vector or value type of an object, when it says more
/// than "anything".
fn element_type(container: &DyType) -> Option<DyType> {
    let element = if container.get_bool(&traits::VECTOR) {
        container.generics().next()
    } else if container.get_bool(&traits::OBJECT) || container.get_bool(&traits::MAP) {
        container.generics().nth(1)
    } else {
        None
    };
    let element = element?;
    (!element.get_bool(&traits::ALL_VALUE)).then(|| element.clone())
}

fn member_unifier() -> Unifier {
    Box::new(|group, bb: &mut Blackboard| {
        let (obj, expr) = members(group)?;
        let prop = group.member("prop").unwrap_or_default();
        let mut progress = false;
        match (bb.get_inferred(obj).cloned(), bb.get_inferred(prop).cloned()) {
            (None, Some(prop_ty)) => {
                if prop_ty.get_bool(&traits::INTEGER) {
                    bb.add_inferred(obj, Types::vector(Types::all_value().clone()));
                    progress = true;
                } else if prop_ty.get_bool(&traits::STRING) {
                    bb.add_inferred(obj, Types::object().copy());
                    progress = true;
                } else {
                    tracing::warn!(obj, prop, prop_ty = %prop_ty, "member expression left unresolved");
                }
            }
            (Some(obj_ty), None) => {
                if obj_ty.get_bool(&traits::VECTOR) {
                    bb.add_inferred(prop, Types::i64().clone());
                    progress = true;
                } else if obj_ty.get_bool(&traits::OBJECT) || obj_ty.get_bool(&traits::MAP) {
                    bb.add_inferred(prop, Types::string().clone());
                    progress = true;
                } else {
                    tracing::warn!(obj, prop, obj_ty = %obj_ty, "member expression left unresolved");
                }
            }
            (Some(_), Some(_)) | (None, None) => {}
        }
        if !bb.is_inferred(expr) {
            if let Some(element) = bb.get_inferred(obj).and_then(element_type) {
                bb.add_inferred(expr, element);
                progress = true;
            }
        }
        Ok(progress)
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::inference::engine::InferenceEngine;
    use crate::ir::Nodes;

    fn run(node: &IrNode, env: &Environment, scope: Scope) -> Blackboard {
        let mut bb = Blackboard::new();
        for p in standard_processors() {
            if p.accept(node) {
                let mut builder = TypeRelationBuilder::new();
                p.prepare_inference(node, env, scope, &mut builder).unwrap();
                bb.merge_builder(builder);
            }
        }
        bb
    }

    #[test]
    fn comparison_is_bool() {
        let op = Nodes::operator("<", Nodes::identifier("a"), Nodes::identifier("b"));
        let env = Environment::default();
        let mut bb = run(&op, &env, Scope::default());
        assert_eq!(bb.get_inferred(&format!("operator@{}", op.id())), Some(Types::bool()));
        assert_eq!(bb.groups().len(), 1);
        InferenceEngine::new(&mut bb).inference().unwrap();
        assert!(!bb.is_inferred("a"));
    }

    #[test]
    fn arithmetic_links_both_operands() {
        let op = Nodes::operator("*", Nodes::identifier("a"), Nodes::identifier("b"));
        let bb = run(&op, &Environment::default(), Scope::default());
        let pairs: Vec<_> = bb.groups().iter().map(|g| g.member("n2").unwrap().to_string()).collect();
        assert_eq!(pairs, vec!["a", "b"]);
    }

    #[test]
    fn unknown_operators_add_nothing() {
        let op = Nodes::operator("&&", Nodes::identifier("a"), Nodes::identifier("b"));
        let bb = run(&op, &Environment::default(), Scope::default());
        assert!(bb.groups().is_empty());
    }

    #[test]
    fn literal_known_type() {
        let lit = Nodes::literal("1.5", json!(1.5)).unwrap();
        let bb = run(&lit, &Environment::default(), Scope::default());
        assert_eq!(bb.get_inferred(&format!("literal@{}", lit.id())), Some(Types::f64()));
    }

    #[test]
    fn integer_index_makes_a_vector() {
        let root = Nodes::program(vec![Nodes::variable_declaration("xs", None)]);
        let env = Environment::build(&root);
        let index = Nodes::literal("0", json!(0)).unwrap();
        let member = Nodes::member(Nodes::identifier("xs"), index.clone(), true);

        let mut bb = run(&member, &env, Scope::default());
        bb.merge_builder({
            let mut b = TypeRelationBuilder::new();
            LiteralProcessor.prepare_inference(&index, &env, Scope::default(), &mut b).unwrap();
            b
        });
        InferenceEngine::new(&mut bb).inference().unwrap();
        let xs = bb.get_inferred("xs").unwrap();
        assert!(xs.get_bool(&traits::VECTOR));
        assert!(!bb.is_inferred(&format!("computed_member_expression@{}", member.id())));
    }

    #[test]
    fn known_vector_types_index_and_element() {
        let root = Nodes::program(vec![Nodes::variable_declaration("xs", None)]);
        let env = Environment::build(&root);
        let member = Nodes::member(Nodes::identifier("xs"), Nodes::identifier("i"), true);
        let mut bb = run(&member, &env, Scope::default());
        bb.merge_builder({
            let mut b = TypeRelationBuilder::new();
            b.add_known("xs", &Types::vector(Types::string().clone())).unwrap();
            b
        });
        InferenceEngine::new(&mut bb).inference().unwrap();
        assert_eq!(bb.get_inferred("i"), Some(Types::i64()));
        assert_eq!(
            bb.get_inferred(&format!("computed_member_expression@{}", member.id())),
            Some(Types::string())
        );
    }

    #[test]
    fn length_means_vector_and_integer() {
        let root = Nodes::program(vec![Nodes::variable_declaration("xs", None)]);
        let env = Environment::build(&root);
        let member = Nodes::member(Nodes::identifier("xs"), Nodes::identifier("length"), false);
        let mut bb = run(&member, &env, Scope::default());
        InferenceEngine::new(&mut bb).inference().unwrap();
        assert!(bb.get_inferred("xs").unwrap().get_bool(&traits::VECTOR));
        assert_eq!(
            bb.get_inferred(&format!("static_member_expression@{}", member.id())),
            Some(Types::i64())
        );
    }

    #[test]
    fn unfit_shapes_stay_unresolved() {
        let root = Nodes::program(vec![Nodes::variable_declaration("flag", None)]);
        let env = Environment::build(&root);
        let member = Nodes::member(Nodes::identifier("flag"), Nodes::identifier("k"), true);
        let mut bb = run(&member, &env, Scope::default());
        bb.merge_builder({
            let mut b = TypeRelationBuilder::new();
            b.add_known("flag", Types::bool()).unwrap();
            b
        });
        InferenceEngine::new(&mut bb).inference().unwrap();
        assert!(!bb.is_inferred("k"));
        assert!(!bb.groups()[0].is_unified());
    }

    #[test]
    fn unsupported_property_is_an_error() {
        let member = Nodes::member(
            Nodes::identifier("xs"),
            Nodes::call(Nodes::identifier("f"), vec![]),
            true,
        );
        let err = MemberExpressionProcessor
            .prepare_inference(&member, &Environment::default(), Scope::default(), &mut TypeRelationBuilder::new())
            .unwrap_err();
        assert!(matches!(err, InferenceError::MemberExpression(_)));
    }
}
