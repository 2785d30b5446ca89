//! Core domain types shared by the DGM, ISM and ISE engines: the
//! [`FullType`]/[`Component`] identity model, the [`Rule`]/[`RuleSet`]
//! data model, filter evaluation and its cache, the substitution
//! environment, action return codes, and the sequencer-wide error
//! taxonomy.

mod error;
mod filter;
mod rc;
mod rule;
mod substitute;
mod types;

pub use error::*;
pub use filter::*;
pub use rc::*;
pub use rule::*;
pub use substitute::*;
pub use types::*;
