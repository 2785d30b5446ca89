//! File-backed `RuleStore`: one INI file per ruleset, one section per
//! rule. Async `tokio::fs` I/O, one artifact per logical collection.

use crate::error::{RuleStoreError, RuleStoreResult};
use crate::repository::RuleStore;
use async_trait::async_trait;
use hashbrown::HashMap;
use ini::Ini;
use sequencer_core::{Filter, FullType, Rule};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct FileRuleStoreConfig {
    pub base_dir: PathBuf,
}

/// Filesystem-backed implementation: `{base_dir}/{ruleset}.rules`.
#[derive(Debug, Clone)]
pub struct FileRuleStore {
    config: FileRuleStoreConfig,
}

impl FileRuleStore {
    pub fn new(config: FileRuleStoreConfig) -> Self {
        Self { config }
    }

    fn path_for(&self, ruleset: &str) -> PathBuf {
        self.config.base_dir.join(format!("{ruleset}.rules"))
    }

    async fn load(&self, ruleset: &str) -> RuleStoreResult<Ini> {
        let path = self.path_for(ruleset);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| RuleStoreError::UnknownRuleset(ruleset.to_string()))?;
        Ini::load_from_str(&content).map_err(|e| RuleStoreError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    async fn save(&self, ruleset: &str, ini: &Ini) -> RuleStoreResult<()> {
        tokio::fs::create_dir_all(&self.config.base_dir).await?;
        let path = self.path_for(ruleset);
        let mut buf = Vec::new();
        ini.write_to(&mut buf).map_err(|e| RuleStoreError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tokio::fs::write(&path, buf).await?;
        Ok(())
    }

    fn parse_section(ruleset: &str, name: &str, props: &ini::Properties) -> RuleStoreResult<Rule> {
        let path = format!("{ruleset}.rules");
        let get = |key: &str| props.get(key).map(|s| s.to_string());
        let types_raw = get("types").ok_or_else(|| RuleStoreError::Parse {
            path: path.clone(),
            message: format!("rule '{name}' is missing 'types'"),
        })?;
        let types = parse_types(&types_raw).map_err(|message| RuleStoreError::Parse {
            path: path.clone(),
            message,
        })?;
        let filter_raw = get("filter").unwrap_or_else(|| "ALL".to_string());
        let filter = Filter::parse(&filter_raw).map_err(|message| RuleStoreError::Parse { path: path.clone(), message })?;
        let dependson = get("dependson")
            .map(|s| split_list(&s))
            .unwrap_or_default();
        Ok(Rule {
            ruleset: ruleset.to_string(),
            name: name.to_string(),
            types,
            filter,
            action: non_empty(get("action")),
            depsfinder: non_empty(get("depsfinder")),
            dependson,
            comments: non_empty(get("comments")),
            help: non_empty(get("help")),
        })
    }

    fn write_section(ini: &mut Ini, rule: &Rule) {
        let types = rule
            .types
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut section = ini.with_section(Some(rule.name.clone()));
        section.set("types", types);
        section.set("filter", filter_to_string(&rule.filter));
        if let Some(action) = &rule.action {
            section.set("action", action.clone());
        }
        if let Some(depsfinder) = &rule.depsfinder {
            section.set("depsfinder", depsfinder.clone());
        }
        if !rule.dependson.is_empty() {
            section.set("dependson", rule.dependson.join(","));
        }
        if let Some(comments) = &rule.comments {
            section.set("comments", comments.clone());
        }
        if let Some(help) = &rule.help {
            section.set("help", help.clone());
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn parse_types(raw: &str) -> Result<Vec<FullType>, String> {
    if raw.trim() == "ALL" {
        return Ok(vec![FullType::all()]);
    }
    split_list(raw).iter().map(|s| FullType::from_str(s).map_err(|e| e.to_string())).collect()
}

fn filter_to_string(filter: &Filter) -> String {
    match filter {
        Filter::All => "ALL".to_string(),
        Filter::None => "NONE".to_string(),
        Filter::Regex { var, op, pattern } => {
            let op_str = match op {
                sequencer_core::RegexOp::Match => "=~",
                sequencer_core::RegexOp::NotMatch => "!~",
            };
            format!("{var} {op_str} {}", pattern.as_str())
        }
        Filter::Script { cmd } => cmd.clone(),
    }
}

#[async_trait]
impl RuleStore for FileRuleStore {
    #[instrument(skip(self))]
    async fn rules_for(&self, ruleset: &str) -> RuleStoreResult<HashMap<String, Rule>> {
        let ini = self.load(ruleset).await?;
        let mut rules = HashMap::new();
        for (section, props) in ini.iter() {
            let Some(name) = section else { continue };
            let rule = Self::parse_section(ruleset, name, props)?;
            rules.insert(name.to_string(), rule);
        }
        debug!(ruleset, count = rules.len(), "loaded ruleset from file");
        Ok(rules)
    }

    async fn all_rules(&self) -> RuleStoreResult<HashMap<String, HashMap<String, Rule>>> {
        let mut out = HashMap::new();
        let mut entries = tokio::fs::read_dir(&self.config.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("rules") {
                if let Some(ruleset) = path.file_stem().and_then(|s| s.to_str()) {
                    out.insert(ruleset.to_string(), self.rules_for(ruleset).await?);
                }
            }
        }
        Ok(out)
    }

    async fn add_rule(&self, rule: Rule) -> RuleStoreResult<()> {
        let mut ini = self.load(&rule.ruleset).await.unwrap_or_default();
        if ini.section(Some(rule.name.as_str())).is_some() {
            return Err(RuleStoreError::DuplicateRule {
                ruleset: rule.ruleset.clone(),
                rule: rule.name.clone(),
            });
        }
        Self::write_section(&mut ini, &rule);
        self.save(&rule.ruleset, &ini).await
    }

    async fn remove_rules(&self, ruleset: &str, names: &[String]) -> RuleStoreResult<()> {
        let mut ini = self.load(ruleset).await?;
        for name in names {
            ini.delete(Some(name.as_str()));
        }
        self.save(ruleset, &ini).await
    }

    async fn update_rule(&self, rule: Rule) -> RuleStoreResult<()> {
        let mut ini = self.load(&rule.ruleset).await?;
        if ini.section(Some(rule.name.as_str())).is_none() {
            return Err(RuleStoreError::NoSuchRule {
                ruleset: rule.ruleset.clone(),
                rule: rule.name.clone(),
            });
        }
        ini.delete(Some(rule.name.as_str()));
        Self::write_section(&mut ini, &rule);
        self.save(&rule.ruleset, &ini).await
    }

    async fn copy(&self, from_ruleset: &str, to_ruleset: &str) -> RuleStoreResult<()> {
        let rules = self.rules_for(from_ruleset).await?;
        let mut ini = self.load(to_ruleset).await.unwrap_or_default();
        for rule in rules.values() {
            let mut copied = rule.clone();
            copied.ruleset = to_ruleset.to_string();
            Self::write_section(&mut ini, &copied);
        }
        self.save(to_ruleset, &ini).await
    }
}

pub fn default_base_dir() -> &'static Path {
    Path::new(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileRuleStore {
        FileRuleStore::new(FileRuleStoreConfig {
            base_dir: dir.path().to_path_buf(),
        })
    }

    #[tokio::test]
    async fn round_trips_a_rule() {
        let dir = TempDir::new().unwrap();
        let fs = store(&dir);
        let rule = Rule {
            ruleset: "rs".into(),
            name: "R1".into(),
            types: vec![FullType::new("t", "c")],
            filter: Filter::All,
            action: Some("echo hello".into()),
            depsfinder: None,
            dependson: vec![],
            comments: Some("a comment".into()),
            help: Some("help text".into()),
        };
        fs.add_rule(rule.clone()).await.unwrap();

        let loaded = fs.rules_for("rs").await.unwrap();
        let got = loaded.get("R1").unwrap();
        assert_eq!(got.action.as_deref(), Some("echo hello"));
        assert_eq!(got.types, vec![FullType::new("t", "c")]);
    }

    #[tokio::test]
    async fn unknown_ruleset_is_an_error() {
        let dir = TempDir::new().unwrap();
        let fs = store(&dir);
        assert!(matches!(
            fs.rules_for("missing").await,
            Err(RuleStoreError::UnknownRuleset(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_add_rejected() {
        let dir = TempDir::new().unwrap();
        let fs = store(&dir);
        let rule = Rule {
            ruleset: "rs".into(),
            name: "R1".into(),
            types: vec![FullType::new("t", "c")],
            filter: Filter::All,
            action: None,
            depsfinder: None,
            dependson: vec![],
            comments: None,
            help: None,
        };
        fs.add_rule(rule.clone()).await.unwrap();
        assert!(matches!(
            fs.add_rule(rule).await,
            Err(RuleStoreError::DuplicateRule { .. })
        ));
    }

    #[tokio::test]
    async fn copy_duplicates_into_new_ruleset() {
        let dir = TempDir::new().unwrap();
        let fs = store(&dir);
        let rule = Rule {
            ruleset: "rs".into(),
            name: "R1".into(),
            types: vec![FullType::new("t", "c")],
            filter: Filter::All,
            action: Some("true".into()),
            depsfinder: None,
            dependson: vec![],
            comments: None,
            help: None,
        };
        fs.add_rule(rule).await.unwrap();
        fs.copy("rs", "rs2").await.unwrap();
        let copied = fs.rules_for("rs2").await.unwrap();
        assert_eq!(copied.get("R1").unwrap().ruleset, "rs2");
    }
}
