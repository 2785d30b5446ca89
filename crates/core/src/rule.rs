//! [`Rule`] and [`RuleSet`]: the declarative input to the DGM engine.

use crate::error::SequencerError;
use crate::filter::Filter;
use crate::types::{Component, FullType};
use hashbrown::{HashMap, HashSet};
use sha2::{Digest, Sha512};

/// A named transformation. `(ruleset, name)` is globally unique.
#[derive(Debug, Clone)]
pub struct Rule {
    pub ruleset: String,
    pub name: String,
    pub types: Vec<FullType>,
    pub filter: Filter,
    /// Shell template; `None` means the rule contributes no action
    /// attribute (a "structural" rule used only for dependency wiring).
    pub action: Option<String>,
    /// Shell template producing one dependency component id per
    /// non-blank stdout line.
    pub depsfinder: Option<String>,
    pub dependson: Vec<String>,
    /// Excluded from the checksum.
    pub comments: Option<String>,
    /// Included in variable substitution and the checksum.
    pub help: Option<String>,
}

impl Rule {
    /// Validate this rule's invariants: non-empty `types`, and
    /// `depsfinder` non-empty when present.
    pub fn validate(&self) -> Result<(), SequencerError> {
        if self.types.is_empty() {
            return Err(SequencerError::InternalError(format!(
                "rule '{}' in ruleset '{}' has no types",
                self.name, self.ruleset
            )));
        }
        if let Some(df) = &self.depsfinder {
            if df.trim().is_empty() {
                return Err(SequencerError::InternalError(format!(
                    "rule '{}' in ruleset '{}' has an empty depsfinder",
                    self.name, self.ruleset
                )));
            }
        }
        Ok(())
    }

    /// Whether this rule's declared types match the given component's
    /// full type (ALL-wildcard aware on either side).
    pub fn matches_type(&self, component: &Component) -> bool {
        let full_type = component.full_type();
        self.types.iter().any(|t| t.matches(&full_type))
    }

    /// The full substitution environment for this rule applied to
    /// `component`: the component's own bindings plus
    /// `%ruleset, %rulename, %help`, in that order.
    pub fn env_for(&self, component: &Component) -> Vec<(&'static str, String)> {
        let mut bindings = component.bindings();
        bindings.push(("%ruleset", self.ruleset.clone()));
        bindings.push(("%rulename", self.name.clone()));
        bindings.push(("%help", self.help.clone().unwrap_or_default()));
        bindings
    }

    /// SHA-512 over `(ruleset, name, each type in stable order, action,
    /// depsfinder, help, each dependency)`. `filter` and `comments` are
    /// excluded.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha512::new();
        hasher.update(self.ruleset.as_bytes());
        hasher.update(self.name.as_bytes());
        let mut types: Vec<String> = self.types.iter().map(|t| t.to_string()).collect();
        types.sort();
        for t in &types {
            hasher.update(t.as_bytes());
        }
        hasher.update(self.action.as_deref().unwrap_or("").as_bytes());
        hasher.update(self.depsfinder.as_deref().unwrap_or("").as_bytes());
        hasher.update(self.help.as_deref().unwrap_or("").as_bytes());
        let mut deps = self.dependson.clone();
        deps.sort();
        for d in &deps {
            hasher.update(d.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// A named collection of rules sharing a `ruleset` field, plus the
/// derived rules graph and root-rule map.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: String,
    rules: HashMap<String, Rule>,
    root_rules_for: HashMap<FullType, HashSet<String>>,
}

impl RuleSet {
    /// Build a ruleset, checking that every `dependson` name resolves
    /// (`UnknownDep`). Cycles in the rules graph are permitted.
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Result<Self, SequencerError> {
        let name = name.into();
        let mut by_name = HashMap::new();
        for rule in rules {
            rule.validate()?;
            if by_name.insert(rule.name.clone(), rule).is_some() {
                let rule_name = by_name.keys().next().cloned().unwrap_or_default();
                return Err(SequencerError::DuplicateRule {
                    ruleset: name,
                    rule: rule_name,
                });
            }
        }
        for rule in by_name.values() {
            for dep in &rule.dependson {
                if !by_name.contains_key(dep) {
                    return Err(SequencerError::UnknownDep {
                        ruleset: name.clone(),
                        rule: rule.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        let root_rules_for = compute_root_rules_mapping(&by_name);
        Ok(Self {
            name,
            rules: by_name,
            root_rules_for,
        })
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn root_rules_for(&self) -> &HashMap<FullType, HashSet<String>> {
        &self.root_rules_for
    }

    /// Given a component, the set of root rule names that apply to it:
    /// the union of root rules for every FullType in the root map that
    /// matches the component, filtered down to type-match. Filter
    /// evaluation is the caller's job; root computation only narrows
    /// by type.
    pub fn roots_for(&self, component: &Component) -> HashSet<String> {
        let component_type = component.full_type();
        let mut roots = HashSet::new();
        for (full_type, names) in &self.root_rules_for {
            if full_type.matches(&component_type) {
                roots.extend(names.iter().cloned());
            }
        }
        roots
    }

    /// Every rule whose declared types match the component, regardless
    /// of filter (the "Match" capability minus filter evaluation,
    /// which callers apply with the rule's own `Filter`).
    pub fn matching(&self, component: &Component) -> Vec<&Rule> {
        self.rules.values().filter(|r| r.matches_type(component)).collect()
    }

    /// DOT export of the rules graph.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph rules {\n");
        for rule in self.rules.values() {
            out.push_str(&format!("    \"{}\";\n", rule.name));
            for dep in &rule.dependson {
                out.push_str(&format!("    \"{}\" -> \"{}\";\n", rule.name, dep));
            }
        }
        out.push_str("}\n");
        out
    }
}

/// Iteratively strip in-degree-zero rules (where in-degree counts only
/// rules still in `remaining`), recording each stripped generation's
/// types; a
/// generation whose type is already claimed by an earlier (more
/// general) generation is skipped unless the earlier claim's rule set
/// is itself contained in the current generation. If a round finds no
/// roots (a cycle blocks progress), the entire remainder becomes roots
/// for their types and the loop stops.
fn compute_root_rules_mapping(rules: &HashMap<String, Rule>) -> HashMap<FullType, HashSet<String>> {
    let mut types: HashMap<FullType, HashSet<String>> = HashMap::new();
    let mut remaining: HashSet<String> = rules.keys().cloned().collect();

    loop {
        if remaining.is_empty() {
            break;
        }
        let roots: HashSet<String> = remaining
            .iter()
            .filter(|name| {
                !remaining.iter().any(|other| {
                    other != *name
                        && rules
                            .get(other)
                            .map(|r| r.dependson.iter().any(|d| d == *name))
                            .unwrap_or(false)
                })
            })
            .cloned()
            .collect();

        if roots.is_empty() {
            update_types(&remaining, rules, &mut types);
            break;
        }
        update_types(&roots, rules, &mut types);
        for name in &roots {
            remaining.remove(name);
        }
    }
    types
}

fn update_types(
    generation: &HashSet<String>,
    rules: &HashMap<String, Rule>,
    types: &mut HashMap<FullType, HashSet<String>>,
) {
    for name in generation {
        let rule = match rules.get(name) {
            Some(r) => r,
            None => continue,
        };
        for full_type in &rule.types {
            let already_claimed_elsewhere = types
                .get(full_type)
                .map(|owners| !owners.is_subset(generation))
                .unwrap_or(false);
            if already_claimed_elsewhere {
                continue;
            }
            types.entry(full_type.clone()).or_default().insert(name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    fn rule(name: &str, types: &[(&str, &str)], dependson: &[&str]) -> Rule {
        Rule {
            ruleset: "rs".into(),
            name: name.into(),
            types: types.iter().map(|(t, c)| FullType::new(*t, *c)).collect(),
            filter: Filter::All,
            action: Some("true".into()),
            depsfinder: None,
            dependson: dependson.iter().map(|s| s.to_string()).collect(),
            comments: None,
            help: None,
        }
    }

    #[test]
    fn rejects_unknown_dependency() {
        let r = rule("R1", &[("t", "c")], &["Missing"]);
        let err = RuleSet::new("rs", vec![r]).unwrap_err();
        assert!(matches!(err, SequencerError::UnknownDep { .. }));
    }

    #[test]
    fn root_rule_excludes_dependency_only_rule() {
        let ra = rule("Ra", &[("ta", "c")], &["Rb"]);
        let rb = rule("Rb", &[("tb", "c")], &[]);
        let ruleset = RuleSet::new("rs", vec![ra, rb]).unwrap();
        let root_for_ta = ruleset.roots_for(&Component::new("x", "ta", "c"));
        assert!(root_for_ta.contains("Ra"));
        let root_for_tb = ruleset.roots_for(&Component::new("x", "tb", "c"));
        assert!(!root_for_tb.contains("Rb"), "Rb is only reachable via Ra.dependson, not a root");
    }

    #[test]
    fn cycle_makes_remainder_all_roots() {
        let ra = rule("Ra", &[("ta", "c")], &["Rb"]);
        let rb = rule("Rb", &[("tb", "c")], &["Ra"]);
        let ruleset = RuleSet::new("rs", vec![ra, rb]).unwrap();
        assert!(ruleset.roots_for(&Component::new("x", "ta", "c")).contains("Ra"));
        assert!(ruleset.roots_for(&Component::new("x", "tb", "c")).contains("Rb"));
    }

    #[test]
    fn checksum_excludes_filter_and_comments() {
        let mut r1 = rule("R1", &[("t", "c")], &[]);
        let mut r2 = r1.clone();
        r1.filter = Filter::All;
        r2.filter = Filter::None;
        r1.comments = Some("a".into());
        r2.comments = Some("b".into());
        assert_eq!(r1.checksum(), r2.checksum());

        let mut r3 = r1.clone();
        r3.action = Some("false".into());
        assert_ne!(r1.checksum(), r3.checksum());
    }
}
