use thiserror::Error;

#[derive(Debug, Error)]
pub enum DgmError {
    #[error("unknown rule in force option: {0}")]
    UnknownRule(String),

    #[error(transparent)]
    Sequencer(#[from] sequencer_core::SequencerError),
}

pub type DgmResult<T> = Result<T, DgmError>;
