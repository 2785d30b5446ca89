//! Hierarchical configuration loading, grounded on the pack's
//! `figment`-based config pattern: `sequencer.toml` (base), then
//! `sequencer.local.toml` (git-ignored overrides), then
//! `SEQUENCER_*`-prefixed environment variables, each layer merging
//! over the last.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerConfig {
    #[serde(default)]
    pub rulestore: RuleStoreConfig,
    #[serde(default)]
    pub dgm: DgmConfig,
    #[serde(default)]
    pub ise: IseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleStoreConfig {
    pub base_dir: PathBuf,
}

impl Default for RuleStoreConfig {
    fn default() -> Self {
        Self { base_dir: PathBuf::from("./rules") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DgmConfig {
    #[serde(default = "default_docache")]
    pub docache: bool,
}

fn default_docache() -> bool {
    true
}

impl Default for DgmConfig {
    fn default() -> Self {
        Self { docache: default_docache() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IseConfig {
    #[serde(default = "default_fanout")]
    pub fanout: usize,
    #[serde(default)]
    pub force: bool,
    /// Progress tick interval in seconds; `0` disables ticking.
    #[serde(default)]
    pub progress_interval_secs: u64,
}

fn default_fanout() -> usize {
    64
}

impl Default for IseConfig {
    fn default() -> Self {
        Self {
            fanout: default_fanout(),
            force: false,
            progress_interval_secs: 0,
        }
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            rulestore: RuleStoreConfig::default(),
            dgm: DgmConfig::default(),
            ise: IseConfig::default(),
        }
    }
}

impl SequencerConfig {
    /// Load from the default location set: `sequencer.toml`,
    /// `sequencer.local.toml`, then `SEQUENCER_*` env vars.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("sequencer.toml"))
            .merge(Toml::file("sequencer.local.toml"))
            .merge(Env::prefixed("SEQUENCER_").split("__"))
            .extract()
    }

    /// Load from one specific TOML file plus env overrides.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("SEQUENCER_").split("__"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_fanout() {
        let config = SequencerConfig::default();
        assert_eq!(config.ise.fanout, 64);
        assert!(config.dgm.docache);
    }

    #[test]
    fn env_override_wins_over_default() {
        std::env::set_var("SEQUENCER_ISE__FANOUT", "8");
        let config = SequencerConfig::load().unwrap();
        assert_eq!(config.ise.fanout, 8);
        std::env::remove_var("SEQUENCER_ISE__FANOUT");
    }
}
