//! Read-only (plus admin) access to persisted rulesets. Two backends
//! share the [`RuleStore`] trait: [`file::FileRuleStore`] (one file per
//! ruleset) and [`sql::SqlRuleStore`] (SQLite).

mod error;
mod file;
mod repository;
mod sql;

pub use error::{RuleStoreError, RuleStoreResult};
pub use file::{FileRuleStore, FileRuleStoreConfig};
pub use repository::RuleStore;
pub use sql::SqlRuleStore;
