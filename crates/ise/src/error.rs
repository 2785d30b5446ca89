use thiserror::Error;

#[derive(Debug, Error)]
pub enum IseError {
    #[error("action id referenced in an explicit dependency is unknown: {0}")]
    UnknownDep(String),

    #[error("ise: {0}")]
    Ism(#[from] sequencer_ism::IsmError),
}

pub type IseResult<T> = Result<T, IseError>;
