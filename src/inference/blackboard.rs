use std::fmt;

use indexmap::IndexMap;

use super::scope::PathNode;
use crate::error::{EntityError, InferenceError};
use crate::ir::{attrs, IrNode, NodeId};
use crate::model::{FieldDescriptor, MixedModel};
use crate::types::{traits, DyType};

// ---------------------------- Post-assignment ----------------------------- //

/// Write-back into one IR node once its path has a type.
pub trait PostAssignType: Send + Sync {
    fn target(&self) -> NodeId;
    fn post_assign_type(&self, node: &mut IrNode, ty: &DyType) -> Result<(), EntityError>;
}

/// Attach the resolved type as `inferred_type`.
pub struct PostAssignTypeInferred {
    pub node: NodeId,
}

impl PostAssignType for PostAssignTypeInferred {
    fn target(&self) -> NodeId { self.node }

    fn post_assign_type(&self, node: &mut IrNode, ty: &DyType) -> Result<(), EntityError> {
        node.replace_field(attrs::INFERRED_TYPE.value(ty.clone()))?;
        Ok(())
    }
}

/// Store the resolved type under an arbitrary node field.
pub struct PostAssignTypeField {
    pub node: NodeId,
    pub field: &'static FieldDescriptor,
}

impl PostAssignType for PostAssignTypeField {
    fn target(&self) -> NodeId { self.node }

    fn post_assign_type(&self, node: &mut IrNode, ty: &DyType) -> Result<(), EntityError> {
        node.replace_field(self.field.value(ty.clone()))?;
        Ok(())
    }
}

// -------------------------------- Groups ---------------------------------- //

pub const EQUALS_TO: &str = "equals_to";

/// Custom unification step; `Ok(true)` means the group made progress and is
/// done.
pub type Unifier = Box<dyn Fn(&NodeGroup, &mut Blackboard) -> Result<bool, InferenceError> + Send + Sync>;

/// A named relation between blackboard paths.
pub struct NodeGroup {
    pub name: String,
    pub members: IndexMap<String, String>,
    pub(crate) unify: Option<Unifier>,
    pub(crate) unified: bool,
}

impl NodeGroup {
    pub fn new<I, K, V>(name: &str, members: I, unify: Option<Unifier>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let members = members.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { name: name.to_string(), members, unify, unified: false }
    }

    pub fn equals_to(left: &str, right: &str) -> Self {
        Self::new(EQUALS_TO, [("n1", left), ("n2", right)], None)
    }

    pub fn member(&self, key: &str) -> Option<&str> {
        self.members.get(key).map(String::as_str)
    }

    pub fn is_unified(&self) -> bool { self.unified }
}

impl fmt::Debug for NodeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeGroup")
            .field("name", &self.name)
            .field("members", &self.members)
            .field("unified", &self.unified)
            .finish()
    }
}

// ------------------------------- Builder ---------------------------------- //

/// Facts one processor contributes for one node.
#[derive(Default)]
pub struct TypeRelationBuilder {
    nodes: IndexMap<String, NodeId>,
    post_assign: IndexMap<String, Vec<Box<dyn PostAssignType>>>,
    known: IndexMap<String, DyType>,
    groups: Vec<NodeGroup>,
}

impl TypeRelationBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn add_node(&mut self, path: &PathNode) {
        self.nodes.insert(path.path.clone(), path.node);
    }

    pub fn add_edge(&mut self, left: &PathNode, right: &PathNode) {
        self.add_node(left);
        self.add_node(right);
        self.groups.push(NodeGroup::equals_to(&left.path, &right.path));
    }

    pub fn add_group(&mut self, group: NodeGroup) {
        self.groups.push(group);
    }

    /// Provenance traits are dropped so equal shapes from different sources
    /// compare equal.
    pub fn add_known(&mut self, path: &str, ty: &DyType) -> Result<(), EntityError> {
        let mut ty = ty.copy();
        ty.remove_field(&traits::RAW_VALUE)?;
        ty.remove_field(&traits::FROM_JSON)?;
        self.known.insert(path.to_string(), ty.frozen());
        Ok(())
    }

    pub fn add_post_inferred_type(&mut self, path: &str, callback: Box<dyn PostAssignType>) {
        self.post_assign.entry(path.to_string()).or_default().push(callback);
    }
}

// ------------------------------ Blackboard -------------------------------- //

/// Shared store of one inference run: resolved types by path, pending
/// relations, and write-back callbacks.
#[derive(Default)]
pub struct Blackboard {
    inferred: IndexMap<String, DyType>,
    post_assign: IndexMap<String, Vec<Box<dyn PostAssignType>>>,
    nodes: IndexMap<String, NodeId>,
    pub(crate) groups: Vec<NodeGroup>,
}

impl Blackboard {
    pub fn new() -> Self { Self::default() }

    pub fn merge_builder(&mut self, builder: TypeRelationBuilder) {
        let TypeRelationBuilder { nodes, post_assign, known, groups } = builder;
        self.inferred.extend(known);
        for (path, callbacks) in post_assign {
            self.post_assign.entry(path).or_default().extend(callbacks);
        }
        self.nodes.extend(nodes);
        self.groups.extend(groups);
    }

    /// Resolved types are frozen: they are shared by every node that ends up
    /// carrying them.
    pub fn add_inferred(&mut self, path: &str, ty: DyType) {
        tracing::trace!(path, ty = %ty, "inferred");
        self.inferred.insert(path.to_string(), ty.frozen());
    }

    pub fn get_inferred(&self, path: &str) -> Option<&DyType> {
        self.inferred.get(path)
    }

    pub fn is_inferred(&self, path: &str) -> bool {
        self.inferred.contains_key(path)
    }

    pub fn inferred(&self) -> impl Iterator<Item = (&str, &DyType)> {
        self.inferred.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn node(&self, path: &str) -> Option<NodeId> {
        self.nodes.get(path).copied()
    }

    pub fn groups(&self) -> &[NodeGroup] { &self.groups }

    /// Every registered callback whose path resolved, with its type.
    pub fn assignments(&self) -> impl Iterator<Item = (&dyn PostAssignType, &DyType)> {
        self.post_assign.iter().flat_map(move |(path, callbacks)| {
            let ty = self.inferred.get(path);
            callbacks.iter().filter_map(move |cb| ty.map(|ty| (cb.as_ref(), ty)))
        })
    }

    pub fn post_assign_paths(&self) -> impl Iterator<Item = &str> {
        self.post_assign.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{infer_type_from_example, Types};

    #[test]
    fn known_types_lose_provenance() {
        let mut builder = TypeRelationBuilder::new();
        let ty = infer_type_from_example(&serde_json::json!(3), "").unwrap();
        builder.add_known("f.x", &ty).unwrap();
        let mut bb = Blackboard::new();
        bb.merge_builder(builder);
        let known = bb.get_inferred("f.x").unwrap();
        assert!(known.is_frozen());
        assert_eq!(known, Types::i64());
    }

    #[test]
    fn merge_accumulates_callbacks_per_path() {
        let node = IrNode::from_str("variable_declaration");
        let mut a = TypeRelationBuilder::new();
        a.add_post_inferred_type("f.x", Box::new(PostAssignTypeInferred { node: node.id() }));
        let mut b = TypeRelationBuilder::new();
        b.add_post_inferred_type(
            "f.x",
            Box::new(PostAssignTypeField { node: node.id(), field: &attrs::ARGUMENT_TYPE }),
        );
        b.add_edge(
            &PathNode { path: "f.x".into(), node: node.id() },
            &PathNode { path: "f.y".into(), node: node.id() },
        );

        let mut bb = Blackboard::new();
        bb.merge_builder(a);
        bb.merge_builder(b);
        assert_eq!(bb.groups().len(), 1);
        assert_eq!(bb.groups()[0].member("n2"), Some("f.y"));
        assert_eq!(bb.assignments().count(), 0);

        bb.add_inferred("f.x", Types::bool().clone());
        assert_eq!(bb.assignments().count(), 2);
        assert_eq!(bb.node("f.y"), Some(node.id()));
    }
}
