use thiserror::Error;

#[derive(Debug, Error)]
pub enum IsmError {
    #[error("cycle detected among: {0:?}")]
    CyclesDetected(Vec<String>),

    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),
}

pub type IsmResult<T> = Result<T, IsmError>;
