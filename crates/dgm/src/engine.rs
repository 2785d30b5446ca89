//! The DGM engine: expands a requested component set into an
//! [`ActionDag`] by repeatedly finding root rules, applying them, and
//! recursing into their dependencies.

use crate::dag::ActionDag;
use crate::error::{DgmError, DgmResult};
use hashbrown::{HashMap, HashSet};
use sequencer_core::{Component, ForceMode, Rule, RuleSet};
use std::process::Command;
use std::str::FromStr;
use tracing::{error, instrument, warn};

/// Drives one run of the DGM algorithm over a fixed [`RuleSet`].
/// Single-threaded by design: every mutable structure here is owned
/// outright, no interior mutability.
#[derive(Debug)]
pub struct DgmEngine<'a> {
    ruleset: &'a RuleSet,
    force_for_rule: HashMap<String, ForceMode>,
    filter_caches: HashMap<String, sequencer_core::FilterCache>,
    docache: bool,
    /// `component_id/rule_name` pairs whose `apply` call is still on the
    /// stack. Rules may depend on each other cyclically; re-entering
    /// `apply` for a pair already in progress means the edge back has
    /// already been recorded, so recursion stops here instead of
    /// looping forever. The resulting cyclic DAG is ISM's problem to
    /// reject.
    in_progress: HashSet<String>,
}

impl<'a> DgmEngine<'a> {
    /// `force_rules` entries name a rule to force; a leading `^` means
    /// "never run" rather than "always run". Each named rule must exist
    /// in `ruleset`.
    pub fn new(ruleset: &'a RuleSet, force_rules: &[String], docache: bool) -> DgmResult<Self> {
        let mut force_for_rule = HashMap::new();
        for raw in force_rules {
            let (name, mode) = match raw.strip_prefix('^') {
                Some(rest) => (rest, ForceMode::Never),
                None => (raw.as_str(), ForceMode::Always),
            };
            if ruleset.rule(name).is_none() {
                return Err(DgmError::UnknownRule(name.to_string()));
            }
            force_for_rule.insert(name.to_string(), mode);
        }
        Ok(Self {
            ruleset,
            force_for_rule,
            filter_caches: HashMap::new(),
            docache,
            in_progress: HashSet::new(),
        })
    }

    /// Run the algorithm to completion: seed the DAG with `requested`,
    /// then repeatedly find and apply root rules until no component has
    /// one left.
    #[instrument(skip(self, requested), fields(ruleset = %self.ruleset.name, count = requested.len()))]
    pub fn build(&mut self, requested: Vec<Component>) -> DgmResult<ActionDag> {
        let mut dag = ActionDag::new();
        let mut components_map: HashMap<String, Component> = HashMap::new();
        let mut remaining: Vec<Component> = Vec::new();
        for component in requested {
            dag.ensure_node(component.clone());
            components_map.insert(component.id(), component.clone());
            remaining.push(component);
        }

        loop {
            let roots = self.find_roots(&remaining);
            if roots.is_empty() {
                break;
            }
            remaining.retain(|c| !roots.contains_key(&c.id()));
            for (component_id, rule_names) in &roots {
                let component = components_map[component_id].clone();
                for rule_name in rule_names {
                    let rule = self.ruleset.rule(rule_name).expect("root rule exists").clone();
                    self.apply(&mut dag, &mut components_map, &rule, &component)?;
                }
            }
        }
        Ok(dag)
    }

    /// For each component, intersect its candidate root rules (by type,
    /// from `ruleset.roots_for`) against the filter.
    fn find_roots(&mut self, components: &[Component]) -> HashMap<String, HashSet<String>> {
        let mut out = HashMap::new();
        for component in components {
            let candidates = self.ruleset.roots_for(component);
            let mut matched = HashSet::new();
            for rule_name in candidates {
                let rule = match self.ruleset.rule(&rule_name) {
                    Some(r) => r.clone(),
                    None => continue,
                };
                if self.matches_and_passes(&rule, component) {
                    matched.insert(rule_name);
                }
            }
            if !matched.is_empty() {
                out.insert(component.id(), matched);
            }
        }
        out
    }

    /// Cross-product match used both by root-finding and by
    /// `dependson`-restricted dependency resolution (`_find_match`).
    fn find_match(&mut self, rules: &[Rule], components: &[Component]) -> HashMap<String, HashSet<String>> {
        let mut out: HashMap<String, HashSet<String>> = HashMap::new();
        for component in components {
            for rule in rules {
                if self.matches_and_passes(rule, component) {
                    out.entry(component.id()).or_default().insert(rule.name.clone());
                }
            }
        }
        out
    }

    fn matches_and_passes(&mut self, rule: &Rule, component: &Component) -> bool {
        if !rule.matches_type(component) {
            return false;
        }
        let bindings = rule.env_for(component);
        let cache = self
            .filter_caches
            .entry(rule.name.clone())
            .or_insert_with(|| sequencer_core::FilterCache::new(self.docache));
        cache.evaluate(&rule.filter, &component.id(), &bindings)
    }

    /// Apply `rule` to `component`: idempotent (a rule already applied
    /// to a component is a no-op), recurses into dependencies first so
    /// edges point from dependent to dependency before the dependent's
    /// own action attribute is recorded.
    fn apply(
        &mut self,
        dag: &mut ActionDag,
        components_map: &mut HashMap<String, Component>,
        rule: &Rule,
        component: &Component,
    ) -> DgmResult<()> {
        if dag.has_attribute_for_rule(&component.id(), &rule.name) {
            return Ok(());
        }
        let in_progress_key = format!("{}/{}", component.id(), rule.name);
        if !self.in_progress.insert(in_progress_key.clone()) {
            return Ok(());
        }
        let deps = self.get_deps(dag, components_map, component, rule)?;
        for (dep_id, dep_rules) in &deps {
            dag.add_edge(&component.id(), dep_id, Vec::new());
            let mut edge_labels = Vec::new();
            for dep_rule_name in dep_rules {
                let dep_rule = self.ruleset.rule(dep_rule_name).expect("matched rule exists").clone();
                let dep_component = components_map[dep_id].clone();
                self.apply(dag, components_map, &dep_rule, &dep_component)?;
                edge_labels.push(dep_rule_name.clone());
            }
            edge_labels.sort();
            dag.add_edge(&component.id(), dep_id, edge_labels);
        }
        self.update_from(dag, rule, component);
        self.in_progress.remove(&in_progress_key);
        Ok(())
    }

    /// Run `rule.depsfinder`, if any, and resolve its stdout lines into
    /// components filtered down to rules named in `rule.dependson`.
    /// Spawn or tokenize failures are logged and yield no dependencies
    /// rather than failing the whole build.
    fn get_deps(
        &mut self,
        dag: &mut ActionDag,
        components_map: &mut HashMap<String, Component>,
        component: &Component,
        rule: &Rule,
    ) -> DgmResult<HashMap<String, HashSet<String>>> {
        let depsfinder = match &rule.depsfinder {
            Some(df) if !rule.dependson.is_empty() => df,
            _ => return Ok(HashMap::new()),
        };

        let bindings = rule.env_for(component);
        let substituted = sequencer_core::substitute(&bindings, depsfinder);
        let argv = match shell_words::split(&substituted) {
            Ok(argv) if !argv.is_empty() => argv,
            Ok(_) => return Ok(HashMap::new()),
            Err(e) => {
                error!(error = %e, cmd = %substituted, "failed to tokenize depsfinder");
                return Ok(HashMap::new());
            }
        };

        let output = match Command::new(&argv[0]).args(&argv[1..]).output() {
            Ok(output) => output,
            Err(e) => {
                error!(error = %e, cmd = %substituted, "failed to spawn depsfinder");
                return Ok(HashMap::new());
            }
        };
        if !output.stderr.is_empty() {
            warn!(stderr = %String::from_utf8_lossy(&output.stderr), rule = %rule.name, "depsfinder stderr");
        }
        let stdout = String::from_utf8_lossy(&output.stdout);

        let mut deps = Vec::new();
        for line in stdout.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let dep_component = match Component::from_str(trimmed) {
                Ok(c) => c,
                Err(e) => {
                    error!(error = %e, line = %trimmed, "depsfinder emitted an unparseable component id");
                    continue;
                }
            };
            components_map.entry(dep_component.id()).or_insert_with(|| dep_component.clone());
            dag.ensure_node(dep_component.clone());
            deps.push(dep_component);
        }

        let dependson_rules: Vec<Rule> = rule
            .dependson
            .iter()
            .filter_map(|name| self.ruleset.rule(name).cloned())
            .collect();
        Ok(self.find_match(&dependson_rules, &deps))
    }

    /// Substitute `rule.action` and, if present, record it on the DAG
    /// node under `rule.name[?force=mode]`.
    fn update_from(&self, dag: &mut ActionDag, rule: &Rule, component: &Component) {
        let Some(action_template) = &rule.action else {
            return;
        };
        let bindings = rule.env_for(component);
        let action = sequencer_core::substitute(&bindings, action_template);
        let mut key = rule.name.clone();
        if let Some(mode) = self.force_for_rule.get(&rule.name) {
            key.push_str("?force=");
            key.push_str(match mode {
                ForceMode::Allowed => "allowed",
                ForceMode::Always => "always",
                ForceMode::Never => "never",
            });
        }
        dag.add_attribute(&component.id(), key, action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_core::Filter;

    fn rule(
        name: &str,
        types: &[(&str, &str)],
        action: Option<&str>,
        dependson: &[&str],
        depsfinder: Option<&str>,
    ) -> Rule {
        Rule {
            ruleset: "rs".into(),
            name: name.into(),
            types: types.iter().map(|(t, c)| sequencer_core::FullType::new(*t, *c)).collect(),
            filter: Filter::All,
            action: action.map(|s| s.to_string()),
            depsfinder: depsfinder.map(|s| s.to_string()),
            dependson: dependson.iter().map(|s| s.to_string()).collect(),
            comments: None,
            help: None,
        }
    }

    #[test]
    fn single_root_rule_produces_one_action_attribute() {
        let r = rule("Provision", &[("node", "compute")], Some("echo %id"), &[], None);
        let ruleset = RuleSet::new("rs", vec![r]).unwrap();
        let mut engine = DgmEngine::new(&ruleset, &[], true).unwrap();
        let component = Component::new("n1", "node", "compute");
        let dag = engine.build(vec![component.clone()]).unwrap();
        let node = dag.node(&component.id()).unwrap();
        assert_eq!(node.attributes.len(), 1);
        assert_eq!(node.attributes[0].0, "Provision");
        assert_eq!(node.attributes[0].1, "echo n1#node@compute");
    }

    #[test]
    fn applying_a_rule_twice_is_idempotent() {
        let r = rule("Provision", &[("node", "compute")], Some("echo %id"), &[], None);
        let ruleset = RuleSet::new("rs", vec![r.clone()]).unwrap();
        let mut engine = DgmEngine::new(&ruleset, &[], true).unwrap();
        let component = Component::new("n1", "node", "compute");
        let mut dag = ActionDag::new();
        let mut components_map = HashMap::new();
        dag.ensure_node(component.clone());
        components_map.insert(component.id(), component.clone());
        engine.apply(&mut dag, &mut components_map, &r, &component).unwrap();
        engine.apply(&mut dag, &mut components_map, &r, &component).unwrap();
        assert_eq!(dag.node(&component.id()).unwrap().attributes.len(), 1);
    }

    #[test]
    fn unknown_force_rule_is_rejected() {
        let r = rule("Provision", &[("node", "compute")], Some("true"), &[], None);
        let ruleset = RuleSet::new("rs", vec![r]).unwrap();
        let err = DgmEngine::new(&ruleset, &["DoesNotExist".to_string()], true).unwrap_err();
        assert!(matches!(err, DgmError::UnknownRule(_)));
    }

    #[test]
    fn forced_rule_gets_force_suffix_on_its_key() {
        let r = rule("Provision", &[("node", "compute")], Some("true"), &[], None);
        let ruleset = RuleSet::new("rs", vec![r]).unwrap();
        let mut engine = DgmEngine::new(&ruleset, &["Provision".to_string()], true).unwrap();
        let component = Component::new("n1", "node", "compute");
        let dag = engine.build(vec![component.clone()]).unwrap();
        let node = dag.node(&component.id()).unwrap();
        assert_eq!(node.attributes[0].0, "Provision?force=always");
    }

    #[test]
    fn depsfinder_wires_an_edge_to_a_matched_dependency() {
        let parent = rule(
            "Deploy",
            &[("app", "service")],
            Some("deploy %id"),
            &["Provision"],
            Some("printf '%name#node@compute\\n' dep1"),
        );
        let dep = rule("Provision", &[("node", "compute")], Some("provision %id"), &[], None);
        let ruleset = RuleSet::new("rs", vec![parent, dep]).unwrap();
        let mut engine = DgmEngine::new(&ruleset, &[], true).unwrap();
        let app = Component::new("svc1", "app", "service");
        let dag = engine.build(vec![app.clone()]).unwrap();
        assert!(dag.contains("dep1#node@compute"));
        let deps = dag.dependencies(&app.id());
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].component.id(), "dep1#node@compute");
    }
}
