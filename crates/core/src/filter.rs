//! Filter evaluation and its per-rule cache.
//!
//! Three dispatch variants plus the always-true/always-false sentinels:
//! a single `evaluate` dispatch instead of a class hierarchy.

use hashbrown::HashMap;
use regex::Regex;
use std::process::Command;
use tracing::{debug, error};

const REGEX_VARS: &[&str] = &["%id", "%name", "%type", "%category", "%ruleset", "%rulename"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexOp {
    Match,
    NotMatch,
}

/// A rule's filter, one of four variants.
#[derive(Debug, Clone)]
pub enum Filter {
    All,
    None,
    Regex {
        var: String,
        op: RegexOp,
        pattern: Regex,
    },
    Script {
        cmd: String,
    },
}

impl Filter {
    /// Parse a filter string: `ALL`, `NONE`, `%var =~ pattern` /
    /// `%var !~ pattern`, or any other non-empty string taken as a
    /// shell command line.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed == "ALL" {
            return Ok(Filter::All);
        }
        if trimmed == "NONE" {
            return Ok(Filter::None);
        }
        if let Some(var) = REGEX_VARS.iter().find(|v| trimmed.starts_with(**v)) {
            let rest = trimmed[var.len()..].trim_start();
            let (op, pattern_src) = if let Some(p) = rest.strip_prefix("=~") {
                (RegexOp::Match, p.trim())
            } else if let Some(p) = rest.strip_prefix("!~") {
                (RegexOp::NotMatch, p.trim())
            } else {
                return Ok(Filter::Script { cmd: trimmed.to_string() });
            };
            let pattern = Regex::new(pattern_src).map_err(|e| e.to_string())?;
            return Ok(Filter::Regex {
                var: var.to_string(),
                op,
                pattern,
            });
        }
        if trimmed.is_empty() {
            return Err("filter must be non-empty".to_string());
        }
        Ok(Filter::Script { cmd: trimmed.to_string() })
    }

    /// Evaluate this filter against a component's substitution
    /// bindings. `ALL`/`NONE` never touch `bindings`; `Regex` looks the
    /// variable up directly (no shell involved); `Script` substitutes
    /// and spawns a child process.
    pub fn evaluate(&self, bindings: &[(&str, String)]) -> bool {
        match self {
            Filter::All => true,
            Filter::None => false,
            Filter::Regex { var, op, pattern } => {
                let value = bindings
                    .iter()
                    .find(|(k, _)| k == var)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("");
                let is_match = pattern.is_match(value);
                match op {
                    RegexOp::Match => is_match,
                    RegexOp::NotMatch => !is_match,
                }
            }
            Filter::Script { cmd } => {
                let substituted = crate::substitute::substitute(bindings, cmd);
                let argv = match shell_words::split(&substituted) {
                    Ok(argv) if !argv.is_empty() => argv,
                    Ok(_) => return false,
                    Err(e) => {
                        error!(error = %e, cmd = %substituted, "failed to tokenize filter script");
                        return false;
                    }
                };
                match Command::new(&argv[0]).args(&argv[1..]).output() {
                    Ok(output) => {
                        if !output.stderr.is_empty() {
                            debug!(stderr = %String::from_utf8_lossy(&output.stderr), "filter script stderr");
                        }
                        output.status.success()
                    }
                    Err(e) => {
                        error!(error = %e, cmd = %substituted, "failed to spawn filter script");
                        false
                    }
                }
            }
        }
    }
}

/// Per-rule filter cache keyed by component id. Populated lazily,
/// consulted before re-evaluating. DGM is single-threaded, so a plain
/// `HashMap` behind `&mut` is sufficient; no synchronization needed.
#[derive(Debug, Default)]
pub struct FilterCache {
    enabled: bool,
    entries: HashMap<String, bool>,
}

impl FilterCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: HashMap::new(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Evaluate `filter` for `component_id`, consulting and populating
    /// the cache when enabled.
    pub fn evaluate(&mut self, filter: &Filter, component_id: &str, bindings: &[(&str, String)]) -> bool {
        if !self.enabled {
            return filter.evaluate(bindings);
        }
        if let Some(cached) = self.entries.get(component_id) {
            return *cached;
        }
        let result = filter.evaluate(bindings);
        self.entries.insert(component_id.to_string(), result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_and_none() {
        assert!(matches!(Filter::parse("ALL").unwrap(), Filter::All));
        assert!(matches!(Filter::parse("NONE").unwrap(), Filter::None));
    }

    #[test]
    fn parses_and_evaluates_regex_filter() {
        let filter = Filter::parse("%name =~ ^foo").unwrap();
        let bindings_foo = vec![("%name", "foo1".to_string())];
        let bindings_bar = vec![("%name", "bar".to_string())];
        assert!(filter.evaluate(&bindings_foo));
        assert!(!filter.evaluate(&bindings_bar));
    }

    #[test]
    fn negated_regex_inverts() {
        let filter = Filter::parse("%name !~ ^foo").unwrap();
        let bindings_bar = vec![("%name", "bar".to_string())];
        assert!(filter.evaluate(&bindings_bar));
    }

    #[test]
    fn script_filter_runs_and_caches() {
        let filter = Filter::parse("true").unwrap();
        let mut cache = FilterCache::new(true);
        assert!(cache.evaluate(&filter, "a#t@c", &[]));
        // second call is served from cache; behavior unchanged
        assert!(cache.evaluate(&filter, "a#t@c", &[]));
    }

    #[test]
    fn false_script_filter_rejects() {
        let filter = Filter::parse("false").unwrap();
        assert!(!filter.evaluate(&[]));
    }
}
