use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("malformed wire document: {0}")]
    Malformed(String),

    #[error(transparent)]
    Sequencer(#[from] sequencer_core::SequencerError),

    #[error("{0} must be non-empty")]
    EmptyContainer(&'static str),

    #[error("duplicate action id: {0}")]
    DuplicateActionId(String),

    #[error("action '{action}' references unknown dep '{dep}'")]
    UnknownDep { action: String, dep: String },

    #[error("cycle detected among instruction deps: {0:?}")]
    CyclesDetected(Vec<String>),

    #[error("invalid force value: {0}")]
    InvalidForce(String),

    #[error("invalid remote value: {0}")]
    InvalidRemote(String),
}

pub type WireResult<T> = Result<T, WireError>;
