//! Sequencer-wide error taxonomy.
//!
//! Every kind named in the error handling design derives from this one
//! enum. Stage-specific crates (`sequencer-dgm`, `sequencer-ism`,
//! `sequencer-ise`) wrap it in their own error type so a fatal error can
//! carry the partial graph alongside it without widening this enum.

use thiserror::Error;

/// The sequencer-wide error kind. All fatal conditions reachable from a
/// public API surface are one of these.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("unknown ruleset: {0}")]
    UnknownRuleset(String),

    #[error("no such rule '{rule}' in ruleset '{ruleset}'")]
    NoSuchRule { ruleset: String, rule: String },

    #[error("duplicate rule '{rule}' in ruleset '{ruleset}'")]
    DuplicateRule { ruleset: String, rule: String },

    #[error("rule '{rule}' in ruleset '{ruleset}' depends on undefined rule '{dependency}'")]
    UnknownDep {
        ruleset: String,
        rule: String,
        dependency: String,
    },

    #[error("cycle detected: {witness:?}")]
    CyclesDetected { witness: Vec<String> },

    #[error("internal error (this is a bug): {0}")]
    InternalError(String),
}

pub type SequencerResult<T> = Result<T, SequencerError>;

impl From<serde_json::Error> for SequencerError {
    fn from(err: serde_json::Error) -> Self {
        SequencerError::InternalError(err.to_string())
    }
}
