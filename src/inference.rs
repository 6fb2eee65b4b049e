//! Constraint-based type inference over an IR program.
//!
//! A run has three phases:
//! - build the [`Environment`]: every class, function, argument and local;
//! - walk the tree again in scope and let each [`NodeTypeProcessor`] that
//!   accepts a node add known types and relations to the [`Blackboard`];
//! - solve to fixpoint with the [`InferenceEngine`], then write the resolved
//!   types back onto the nodes that asked for them.
//!
//! Paths that no relation reaches stay unresolved. That is a valid outcome
//! (read it as "any value"); only disagreeing known types abort a run.
pub mod blackboard;
pub mod engine;
pub mod processors;
pub mod scope;

pub use blackboard::{Blackboard, NodeGroup, PostAssignType, TypeRelationBuilder};
pub use engine::InferenceEngine;
pub use processors::{standard_processors, NodeTypeProcessor};
pub use scope::{walk_scoped, Environment, GlobalNodePath, PathNode, Scope};

use crate::error::InferenceError;
use crate::ir::{attrs, IrNode, Walk};
use crate::model::MixedModel;

// ------------------------------- Summary ---------------------------------- //

/// What a run did, for logging and tests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InferenceReport {
    pub passes: usize,
    pub resolved: usize,
    pub pending_relations: usize,
    pub written_back: usize,
}

// ------------------------------ Orchestrator ------------------------------ //

pub struct TypeInference {
    processors: Vec<Box<dyn NodeTypeProcessor>>,
}

impl Default for TypeInference {
    fn default() -> Self {
        Self { processors: standard_processors() }
    }
}

impl TypeInference {
    pub fn new(processors: Vec<Box<dyn NodeTypeProcessor>>) -> Self {
        Self { processors }
    }

    /// Only whole programs are inferred.
    pub fn accept(&self, node: &IrNode) -> bool {
        node.get_bool(&attrs::PROGRAM)
    }

    pub fn transform(&self, mut root: IrNode) -> Result<IrNode, InferenceError> {
        self.infer(&mut root)?;
        Ok(root)
    }

    pub fn infer(&self, root: &mut IrNode) -> Result<InferenceReport, InferenceError> {
        let env = Environment::build(root);
        let mut blackboard = self.build_relations(root, &env)?;

        let mut engine = InferenceEngine::new(&mut blackboard);
        let passes = engine.inference()?;
        let written_back = engine.write_back(root)?;

        let report = InferenceReport {
            passes,
            resolved: blackboard.inferred().count(),
            pending_relations: blackboard.groups().iter().filter(|g| !g.is_unified()).count(),
            written_back,
        };
        tracing::info!(
            passes = report.passes,
            resolved = report.resolved,
            pending = report.pending_relations,
            written_back = report.written_back,
            "type inference done"
        );
        Ok(report)
    }

    fn build_relations(&self, root: &IrNode, env: &Environment) -> Result<Blackboard, InferenceError> {
        let mut blackboard = Blackboard::new();
        walk_scoped(root, Scope::default(), env, &mut |node, scope| {
            for processor in self.processors.iter().filter(|p| p.accept(node)) {
                let mut builder = TypeRelationBuilder::new();
                processor.prepare_inference(node, env, scope, &mut builder)?;
                tracing::trace!(processor = processor.name(), node = %node.id(), "relations added");
                blackboard.merge_builder(builder);
            }
            Ok::<_, InferenceError>(Walk::Continue)
        })?;
        Ok(blackboard)
    }
}
