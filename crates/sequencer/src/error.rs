use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] sequencer_core::SequencerError),

    #[error(transparent)]
    RuleStore(#[from] sequencer_rulestore::RuleStoreError),

    #[error(transparent)]
    Dgm(#[from] sequencer_dgm::DgmError),

    #[error(transparent)]
    Ism(#[from] sequencer_ism::IsmError),

    #[error(transparent)]
    Ise(#[from] sequencer_ise::IseError),

    #[error(transparent)]
    Wire(#[from] sequencer_wire::WireError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
