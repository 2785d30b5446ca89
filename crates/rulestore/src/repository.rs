//! The [`RuleStore`] trait: the read contract plus the admin surface
//! for managing rulesets (add, update, remove, copy, checksum).

use crate::error::RuleStoreResult;
use async_trait::async_trait;
use hashbrown::HashMap;
use sequencer_core::Rule;
use sha2::{Digest, Sha512};

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules of one ruleset, keyed by rule name. Fails with
    /// `UnknownRuleset` if the ruleset does not exist.
    async fn rules_for(&self, ruleset: &str) -> RuleStoreResult<HashMap<String, Rule>>;

    /// Every ruleset and its rules.
    async fn all_rules(&self) -> RuleStoreResult<HashMap<String, HashMap<String, Rule>>>;

    /// `(ruleset_hash, {rule_name: rule_hash})`. The ruleset hash is the
    /// SHA-512 over the sorted, concatenated per-rule hashes.
    async fn checksum(&self, ruleset: &str) -> RuleStoreResult<(String, HashMap<String, String>)> {
        let rules = self.rules_for(ruleset).await?;
        let mut per_rule: Vec<(String, String)> =
            rules.values().map(|r| (r.name.clone(), r.checksum())).collect();
        per_rule.sort_by(|a, b| a.0.cmp(&b.0));
        let mut hasher = Sha512::new();
        for (_, hash) in &per_rule {
            hasher.update(hash.as_bytes());
        }
        let ruleset_hash = hex::encode(hasher.finalize());
        Ok((ruleset_hash, per_rule.into_iter().collect()))
    }

    async fn add_rule(&self, rule: Rule) -> RuleStoreResult<()>;

    async fn remove_rules(&self, ruleset: &str, names: &[String]) -> RuleStoreResult<()>;

    async fn update_rule(&self, rule: Rule) -> RuleStoreResult<()>;

    /// Copy every rule of `from_ruleset` into `to_ruleset`.
    async fn copy(&self, from_ruleset: &str, to_ruleset: &str) -> RuleStoreResult<()>;
}
