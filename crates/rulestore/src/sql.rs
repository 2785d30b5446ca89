//! SQLite-backed `RuleStore`, over a single table:
//!
//! ```sql
//! sequencer(ruleset, name, types, filter, action, depsfinder,
//!           dependson, comments, help)
//! PRIMARY KEY (ruleset, name)
//! CHECK (length(types) > 0 AND length(filter) > 0 AND
//!        (depsfinder IS NULL OR length(depsfinder) > 0))
//! ```
//!
//! `types` and `dependson` are stored as comma-joined `TEXT`, the same
//! wire shape the file-backed store uses, so both backends share the
//! same parse/format helpers in [`crate::file`]. Uses runtime `sqlx`
//! queries rather than the compile-time checked `query!` macro, since
//! there is no live database available at build time here.

use crate::error::{RuleStoreError, RuleStoreResult};
use crate::repository::RuleStore;
use async_trait::async_trait;
use hashbrown::HashMap;
use sequencer_core::{Filter, FullType, Rule};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub struct SqlRuleStore {
    pool: SqlitePool,
}

impl SqlRuleStore {
    pub async fn connect(database_url: &str) -> RuleStoreResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> RuleStoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sequencer (
                ruleset TEXT NOT NULL,
                name TEXT NOT NULL,
                types TEXT NOT NULL,
                filter TEXT NOT NULL,
                action TEXT,
                depsfinder TEXT,
                dependson TEXT,
                comments TEXT,
                help TEXT,
                PRIMARY KEY (ruleset, name),
                CHECK (length(types) > 0 AND length(filter) > 0 AND
                       (depsfinder IS NULL OR length(depsfinder) > 0))
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn row_to_rule(ruleset: &str, row: &sqlx::sqlite::SqliteRow) -> RuleStoreResult<Rule> {
        let name: String = row.try_get("name")?;
        let types_raw: String = row.try_get("types")?;
        let filter_raw: String = row.try_get("filter")?;
        let types = parse_types(&types_raw).map_err(|message| RuleStoreError::Parse {
            path: format!("sequencer[{ruleset}.{name}]"),
            message,
        })?;
        let filter = Filter::parse(&filter_raw).map_err(|message| RuleStoreError::Parse {
            path: format!("sequencer[{ruleset}.{name}]"),
            message,
        })?;
        let dependson: Option<String> = row.try_get("dependson")?;
        Ok(Rule {
            ruleset: ruleset.to_string(),
            name,
            types,
            filter,
            action: row.try_get("action")?,
            depsfinder: row.try_get("depsfinder")?,
            dependson: dependson.map(|s| split_list(&s)).unwrap_or_default(),
            comments: row.try_get("comments")?,
            help: row.try_get("help")?,
        })
    }
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
impl RuleStore for SqlRuleStore {
    async fn rules_for(&self, ruleset: &str) -> RuleStoreResult<HashMap<String, Rule>> {
        let rows = sqlx::query("SELECT * FROM sequencer WHERE ruleset = ?")
            .bind(ruleset)
            .fetch_all(&self.pool)
            .await?;
        if rows.is_empty() {
            return Err(RuleStoreError::UnknownRuleset(ruleset.to_string()));
        }
        let mut rules = HashMap::new();
        for row in &rows {
            let rule = Self::row_to_rule(ruleset, row)?;
            rules.insert(rule.name.clone(), rule);
        }
        Ok(rules)
    }

    async fn all_rules(&self) -> RuleStoreResult<HashMap<String, HashMap<String, Rule>>> {
        let rows = sqlx::query("SELECT DISTINCT ruleset FROM sequencer")
            .fetch_all(&self.pool)
            .await?;
        let mut out = HashMap::new();
        for row in &rows {
            let ruleset: String = row.try_get("ruleset")?;
            let rules = self.rules_for(&ruleset).await?;
            out.insert(ruleset, rules);
        }
        Ok(out)
    }

    async fn add_rule(&self, rule: Rule) -> RuleStoreResult<()> {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT name FROM sequencer WHERE ruleset = ? AND name = ?")
                .bind(&rule.ruleset)
                .bind(&rule.name)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Err(RuleStoreError::DuplicateRule {
                ruleset: rule.ruleset.clone(),
                rule: rule.name.clone(),
            });
        }
        let types = rule.types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(",");
        sqlx::query(
            "INSERT INTO sequencer (ruleset, name, types, filter, action, depsfinder, dependson, comments, help)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rule.ruleset)
        .bind(&rule.name)
        .bind(types)
        .bind(filter_to_string(&rule.filter))
        .bind(&rule.action)
        .bind(&rule.depsfinder)
        .bind((!rule.dependson.is_empty()).then(|| rule.dependson.join(",")))
        .bind(&rule.comments)
        .bind(&rule.help)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_rules(&self, ruleset: &str, names: &[String]) -> RuleStoreResult<()> {
        for name in names {
            sqlx::query("DELETE FROM sequencer WHERE ruleset = ? AND name = ?")
                .bind(ruleset)
                .bind(name)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn update_rule(&self, rule: Rule) -> RuleStoreResult<()> {
        let types = rule.types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(",");
        let result = sqlx::query(
            "UPDATE sequencer SET types = ?, filter = ?, action = ?, depsfinder = ?,
             dependson = ?, comments = ?, help = ? WHERE ruleset = ? AND name = ?",
        )
        .bind(types)
        .bind(filter_to_string(&rule.filter))
        .bind(&rule.action)
        .bind(&rule.depsfinder)
        .bind((!rule.dependson.is_empty()).then(|| rule.dependson.join(",")))
        .bind(&rule.comments)
        .bind(&rule.help)
        .bind(&rule.ruleset)
        .bind(&rule.name)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RuleStoreError::NoSuchRule {
                ruleset: rule.ruleset.clone(),
                rule: rule.name.clone(),
            });
        }
        Ok(())
    }

    async fn copy(&self, from_ruleset: &str, to_ruleset: &str) -> RuleStoreResult<()> {
        let rules = self.rules_for(from_ruleset).await?;
        for rule in rules.values() {
            let mut copied = rule.clone();
            copied.ruleset = to_ruleset.to_string();
            self.add_rule(copied).await?;
        }
        Ok(())
    }
}
