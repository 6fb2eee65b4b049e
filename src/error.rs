//! Error taxonomy for the whole pipeline.
//!
//! Construction errors are programming mistakes (mutating a frozen entity,
//! removing a declared field). Type errors come from schema evaluation and
//! example classification. Inference errors abort a run. Nothing here is
//! recoverable mid-pipeline; every error bubbles up to the caller.

/// Mutation of a [`crate::model::MixedEntity`] was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    #[error("cannot mutate field `{key}`: entity is frozen")]
    Frozen { key: String },

    #[error("field `{0}` is statically declared and cannot be removed")]
    RemoveDeclared(String),

    #[error("field `{0}` already holds a non-sequence value, cannot be appended")]
    NotSequence(String),

    #[error("field `{key}` expects a {expected} value, found {found}")]
    KindMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("the kind of an IR node is set once and cannot be altered")]
    ImmutableKind,
}

/// Lookup, validation and classification failures on [`crate::types::DyType`]s.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("type `{0}` already exists with different content")]
    AlreadyExists(String),

    #[error("type `{0}` must be frozen before registration")]
    NotFrozen(String),

    #[error("trait `{0}` already exists with a different definition")]
    TraitAlreadyExists(String),

    #[error("could not infer type from {0}")]
    CouldNotInfer(String),

    #[error("ambiguous timestamp {0}: expected a more recent date? you are missing 1 digit")]
    AmbiguousTimestamp(f64),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// Failures of the constraint solver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("type conflict between `{left}` ({left_ty}) and `{right}` ({right_ty})")]
    Conflict {
        left: String,
        left_ty: String,
        right: String,
        right_ty: String,
    },

    #[error("relation `{0}` has no unifier")]
    NoUnifier(String),

    #[error("could not process member expression: {0}")]
    MemberExpression(String),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

/// No handler matched a tag.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("no handler registered for `{0}` and no fallback")]
    NoHandler(String),
}

/// Pipeline-level error: anything a parse → infer → emit run may raise.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid model definition at JSON path {path}: {message}")]
    Definition { path: String, message: String },

    #[error("no parser accepts input of model `{0}`")]
    NoParser(String),

    #[error("model `{0}` has no example, fields, variants or source input")]
    NoInput(String),

    #[error("no emitter accepts target `{0}`")]
    NoEmitter(String),

    #[error("cannot emit {what}: {reason}")]
    Emit { what: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_errors_lift_into_pipeline_errors() {
        let err: Error = EntityError::ImmutableKind.into();
        assert!(matches!(err, Error::Entity(EntityError::ImmutableKind)));
        let err: Error = TypeError::from(EntityError::NotSequence("x".into())).into();
        assert_eq!(
            err.to_string(),
            "field `x` already holds a non-sequence value, cannot be appended"
        );
    }

    #[test]
    fn conflict_names_both_sides() {
        let err = InferenceError::Conflict {
            left: "f.a".into(),
            left_ty: "i64".into(),
            right: "f.b".into(),
            right_ty: "string".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("f.a") && msg.contains("string"));
    }
}
