//! Typed errors for the operation engine.
//!
//! The spec layer and the CLI stay on anyhow (these convert into it); the
//! engine itself returns concrete variants so callers can tell a validation
//! failure from an evaluation failure.

use crate::path::Path;
use crate::problems::Problems;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    // Construction and wiring.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    #[error("unknown operation kind: {0:?}")]
    UnknownKind(String),

    #[error("operation {op} has no input slot named {slot:?}")]
    UnknownSlot { op: Path, slot: String },

    #[error("operation {op} has no input bound to {path} on slot {slot:?}")]
    InputNotFound { op: Path, slot: String, path: Path },

    #[error("duplicate path: {0}")]
    DuplicatePath(Path),

    #[error("unknown operation: {0}")]
    UnknownOperation(Path),

    #[error("unknown term: {0}")]
    UnknownTerm(Path),

    #[error("operation {0} cannot reference itself")]
    SelfReference(Path),

    #[error("operation {op} is still referenced by {consumer}")]
    StillReferenced { op: Path, consumer: Path },

    #[error("cycle detected: {0}")]
    Cycle(String),

    // Result protocol.
    #[error("operation {op} is not in a valid state: {problems}")]
    InvalidState { op: Path, problems: Problems },

    #[error("operation {0} has unresolved references; evaluate the owning transformation")]
    UnresolvedRefs(Path),

    // Evaluation.
    #[error("operation {0}: division by zero")]
    DivisionByZero(Path),

    #[error("operation {0}: integer overflow")]
    Overflow(Path),

    #[error("operation {op}: square root of negative value {value}")]
    NegativeSquareRoot { op: Path, value: f64 },

    #[error("operation {op}: value {value} does not fit an integer")]
    OutOfRange { op: Path, value: f64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invalid_state(op: &Path, problems: &Problems) -> Self {
        Self::InvalidState {
            op: op.clone(),
            problems: problems.clone(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Cycle error from a DFS stack, rendered as "a -> b -> a".
    pub fn cycle(stack: &[Path]) -> Self {
        let joined = stack
            .iter()
            .map(Path::as_str)
            .collect::<Vec<_>>()
            .join(" -> ");
        Self::Cycle(joined)
    }
}
