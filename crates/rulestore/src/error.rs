//! RuleStore-specific error taxonomy, layered over
//! [`sequencer_core::SequencerError`] for the domain-level failures and
//! over plain I/O / SQL errors for the backend-level ones.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleStoreError {
    #[error("unknown ruleset: {0}")]
    UnknownRuleset(String),

    #[error("duplicate rule '{rule}' in ruleset '{ruleset}'")]
    DuplicateRule { ruleset: String, rule: String },

    #[error("no such rule '{rule}' in ruleset '{ruleset}'")]
    NoSuchRule { ruleset: String, rule: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed ruleset file '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Sequencer(#[from] sequencer_core::SequencerError),
}

pub type RuleStoreResult<T> = Result<T, RuleStoreError>;
