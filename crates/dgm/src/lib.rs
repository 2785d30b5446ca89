//! Dependency Graph Maker: expands a requested set of components into
//! an [`ActionDag`] by repeatedly matching rules against components,
//! applying their actions, and recursing into the dependencies their
//! `depsfinder` scripts report.

mod dag;
mod engine;
mod error;

pub use dag::{rule_name_of, ActionDag, ActionNode};
pub use engine::DgmEngine;
pub use error::{DgmError, DgmResult};
