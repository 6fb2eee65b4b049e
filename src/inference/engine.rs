//! Fixpoint solver over blackboard relations.
//!
//! Each pass tries every relation that is not yet unified; a relation that
//! determines at least one more path is marked unified and never revisited.
//! Paths only ever go from unknown to known, so the loop stops once a pass
//! makes no progress. Callbacks fire afterwards, in one write-back walk.
use std::collections::{HashMap, HashSet};

use super::blackboard::{Blackboard, NodeGroup, PostAssignType, EQUALS_TO};
use crate::error::InferenceError;
use crate::ir::{walk_nodes_mut, IrNode, NodeId};
use crate::types::DyType;

pub struct InferenceEngine<'a> {
    blackboard: &'a mut Blackboard,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(blackboard: &'a mut Blackboard) -> Self {
        Self { blackboard }
    }

    /// One side known determines the other; two known sides must agree.
    pub fn unify_equals_to(n1: &str, n2: &str, blackboard: &mut Blackboard) -> Result<bool, InferenceError> {
        match (blackboard.get_inferred(n1).cloned(), blackboard.get_inferred(n2).cloned()) {
            (Some(ty), None) => {
                blackboard.add_inferred(n2, ty);
                Ok(true)
            }
            (None, Some(ty)) => {
                blackboard.add_inferred(n1, ty);
                Ok(true)
            }
            (Some(left), Some(right)) if left == right => Ok(true),
            (Some(left), Some(right)) => Err(InferenceError::Conflict {
                left: n1.to_string(),
                left_ty: left.to_string(),
                right: n2.to_string(),
                right_ty: right.to_string(),
            }),
            (None, None) => Ok(false),
        }
    }

    fn unify(group: &NodeGroup, blackboard: &mut Blackboard) -> Result<bool, InferenceError> {
        if group.name == EQUALS_TO {
            let (Some(n1), Some(n2)) = (group.member("n1"), group.member("n2")) else {
                return Err(InferenceError::NoUnifier(format!("{group:?}")));
            };
            return Self::unify_equals_to(n1, n2, blackboard);
        }
        match &group.unify {
            Some(unify) => unify(group, blackboard),
            None => Err(InferenceError::NoUnifier(group.name.clone())),
        }
    }

    /// Run to fixpoint. Returns the number of passes.
    pub fn inference(&mut self) -> Result<usize, InferenceError> {
        // groups leave the blackboard while unifiers borrow it mutably
        let mut groups = std::mem::take(&mut self.blackboard.groups);
        let outcome = Self::fixpoint(&mut groups, self.blackboard);
        self.blackboard.groups = groups;
        let pending = self.blackboard.groups.iter().filter(|g| !g.unified).count();
        tracing::debug!(passes = ?outcome.as_ref().ok(), pending, "fixpoint reached");
        outcome
    }

    fn fixpoint(groups: &mut [NodeGroup], blackboard: &mut Blackboard) -> Result<usize, InferenceError> {
        let mut passes = 0;
        loop {
            passes += 1;
            let mut progress = false;
            for group in groups.iter_mut().filter(|g| !g.unified) {
                if Self::unify(group, blackboard)? {
                    group.unified = true;
                    progress = true;
                }
            }
            if !progress {
                return Ok(passes);
            }
        }
    }

    /// Fire every callback of every resolved path against the tree. Each
    /// callback runs exactly once. Returns how many ran.
    pub fn write_back(&self, root: &mut IrNode) -> Result<usize, InferenceError> {
        let mut by_node: HashMap<NodeId, Vec<(&dyn PostAssignType, &DyType)>> = HashMap::new();
        for (callback, ty) in self.blackboard.assignments() {
            by_node.entry(callback.target()).or_default().push((callback, ty));
        }
        let mut fired = 0;
        let mut reached = HashSet::new();
        // clones share an id, so every occurrence gets the callbacks
        walk_nodes_mut::<InferenceError>(root, &mut |node| {
            if let Some(pending) = by_node.get(&node.id()) {
                for (callback, ty) in pending {
                    callback.post_assign_type(node, ty)?;
                    fired += 1;
                }
                reached.insert(node.id());
            }
            Ok(())
        })?;
        let missing = by_node.len() - reached.len();
        if missing > 0 {
            tracing::warn!(missing, "callbacks target nodes outside the tree");
        }
        Ok(fired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::blackboard::{PostAssignTypeInferred, TypeRelationBuilder, Unifier};
    use crate::inference::scope::PathNode;
    use crate::ir::attrs;
    use crate::model::MixedModel;
    use crate::types::Types;

    fn path(p: &str) -> PathNode {
        PathNode { path: p.to_string(), node: IrNode::from_str("identifier").id() }
    }

    fn board(edges: &[(&str, &str)], known: &[(&str, &DyType)]) -> Blackboard {
        let mut builder = TypeRelationBuilder::new();
        for (a, b) in edges {
            builder.add_edge(&path(a), &path(b));
        }
        for (p, ty) in known {
            builder.add_known(p, ty).unwrap();
        }
        let mut bb = Blackboard::new();
        bb.merge_builder(builder);
        bb
    }

    #[test]
    fn one_known_side_determines_the_other() {
        let mut bb = board(&[("a", "b")], &[("a", Types::i64())]);
        assert_eq!(InferenceEngine::new(&mut bb).inference().unwrap(), 2);
        assert_eq!(bb.get_inferred("b"), Some(Types::i64()));
        assert!(bb.groups()[0].is_unified());
    }

    #[test]
    fn agreeing_sides_unify_without_change() {
        let mut bb = board(&[("a", "b")], &[("a", Types::string()), ("b", Types::string())]);
        InferenceEngine::new(&mut bb).inference().unwrap();
        assert_eq!(bb.get_inferred("a"), Some(Types::string()));
        assert_eq!(bb.get_inferred("b"), Some(Types::string()));
    }

    #[test]
    fn disagreeing_sides_conflict() {
        let mut bb = board(&[("a", "b")], &[("a", Types::string()), ("b", Types::bool())]);
        let err = InferenceEngine::new(&mut bb).inference().unwrap_err();
        assert!(matches!(err, InferenceError::Conflict { ref left, ref right, .. } if left == "a" && right == "b"));
    }

    #[test]
    fn chains_resolve_across_passes() {
        // d ← c ← b ← a, listed backwards so each pass resolves one link
        let mut bb = board(&[("c", "d"), ("b", "c"), ("a", "b")], &[("a", Types::f64())]);
        let passes = InferenceEngine::new(&mut bb).inference().unwrap();
        assert!(passes <= 4);
        for p in ["b", "c", "d"] {
            assert_eq!(bb.get_inferred(p), Some(Types::f64()));
        }
    }

    #[test]
    fn unreachable_paths_stay_unresolved() {
        let mut bb = board(&[("a", "b"), ("x", "y")], &[("a", Types::bool())]);
        InferenceEngine::new(&mut bb).inference().unwrap();
        assert!(bb.get_inferred("x").is_none());
        assert!(!bb.groups()[1].is_unified());
    }

    #[test]
    fn groups_without_unifier_fail() {
        let mut bb = Blackboard::new();
        let mut builder = TypeRelationBuilder::new();
        builder.add_group(NodeGroup::new("mystery", [("a", "x")], None));
        bb.merge_builder(builder);
        assert!(matches!(
            InferenceEngine::new(&mut bb).inference(),
            Err(InferenceError::NoUnifier(name)) if name == "mystery"
        ));
    }

    #[test]
    fn custom_unifiers_run() {
        let unify: Unifier = Box::new(|group, bb| {
            let target = group.member("target").unwrap_or_default();
            if bb.is_inferred(target) {
                return Ok(false);
            }
            bb.add_inferred(target, Types::u8().clone());
            Ok(true)
        });
        let mut builder = TypeRelationBuilder::new();
        builder.add_group(NodeGroup::new("always_u8", [("target", "t")], Some(unify)));
        let mut bb = Blackboard::new();
        bb.merge_builder(builder);
        InferenceEngine::new(&mut bb).inference().unwrap();
        assert_eq!(bb.get_inferred("t"), Some(Types::u8()));
    }

    #[test]
    fn write_back_reaches_the_target_once() {
        let decl = IrNode::from_attribute(attrs::VARIABLE_DECLARATION.present());
        let id = decl.id();
        let mut root = IrNode::from_attribute(attrs::PROGRAM.present())
            .with(attrs::CHILDREN.value(vec![decl]));

        let mut builder = TypeRelationBuilder::new();
        builder.add_known("x", Types::bool()).unwrap();
        builder.add_post_inferred_type("x", Box::new(PostAssignTypeInferred { node: id }));
        let mut bb = Blackboard::new();
        bb.merge_builder(builder);

        let engine = InferenceEngine::new(&mut bb);
        assert_eq!(engine.write_back(&mut root).unwrap(), 1);
        let decl = root.get_nodes(&attrs::CHILDREN).next().unwrap();
        assert_eq!(decl.get_type(&attrs::INFERRED_TYPE), Some(Types::bool()));
    }

    #[test]
    fn write_back_reaches_every_clone_of_the_target() {
        let decl = IrNode::from_attribute(attrs::VARIABLE_DECLARATION.present());
        let id = decl.id();
        let mut root = IrNode::from_attribute(attrs::PROGRAM.present())
            .with(attrs::CHILDREN.value(vec![decl.clone(), decl]));

        let mut builder = TypeRelationBuilder::new();
        builder.add_known("x", Types::i64()).unwrap();
        builder.add_post_inferred_type("x", Box::new(PostAssignTypeInferred { node: id }));
        let mut bb = Blackboard::new();
        bb.merge_builder(builder);

        let engine = InferenceEngine::new(&mut bb);
        assert_eq!(engine.write_back(&mut root).unwrap(), 2);
        for decl in root.get_nodes(&attrs::CHILDREN) {
            assert_eq!(decl.id(), id);
            assert_eq!(decl.get_type(&attrs::INFERRED_TYPE), Some(Types::i64()));
        }
    }
}
