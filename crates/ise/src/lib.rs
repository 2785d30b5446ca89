//! Instruction Sequence Executor: runs an [`sequencer_ism::Instruction`]
//! tree's actions, respecting dependencies and each action's force
//! mode, bounded by a fanout semaphore, all owned by a single
//! coordinator task.

mod error;
mod execution;
mod flatten;
mod transport;

pub use error::{IseError, IseResult};
pub use execution::{execute, ActionRecord, ExecutionConfig, ExecutionReport};
pub use flatten::{ExecGraph, FlatAction};
pub use transport::RemoteConfig;
