//! The working graph ISM's algorithms operate on: a local copy of the
//! DGM's [`sequencer_dgm::ActionDag`], mutable (edges/nodes get pruned
//! during preparation and the `mixed` algorithm peels leaves off it).

use crate::instruction::Action;
use hashbrown::HashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use sequencer_core::ForceMode;
use sequencer_dgm::{rule_name_of, ActionDag};

pub const REMOTE_CHAR: char = '@';

#[derive(Debug, Clone)]
pub struct WNode {
    pub id: String,
    /// `(rule.name[?force=mode], command)`, sorted by key for a
    /// deterministic iteration order.
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkGraph {
    pub graph: DiGraph<WNode, ()>,
    pub index: HashMap<String, NodeIndex>,
}

impl WorkGraph {
    pub fn from_action_dag(dag: &ActionDag) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        for id in dag.component_ids() {
            let mut attrs = dag.node(&id).map(|n| n.attributes.clone()).unwrap_or_default();
            attrs.sort();
            let idx = graph.add_node(WNode { id: id.clone(), attrs });
            index.insert(id, idx);
        }
        for (from, to) in dag.edges() {
            let a = index[&from];
            let b = index[&to];
            graph.update_edge(a, b, ());
        }
        Self { graph, index }
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.graph.node_weights().map(|n| n.id.clone()).collect()
    }

    /// A node's dependencies: the components it points at.
    pub fn successors(&self, id: &str) -> Vec<String> {
        let idx = self.index[id];
        self.graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].id.clone())
            .collect()
    }

    /// A node's dependents: the components that point at it.
    pub fn predecessors(&self, id: &str) -> Vec<String> {
        let idx = self.index[id];
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].id.clone())
            .collect()
    }

    pub fn remove_edge(&mut self, from: &str, to: &str) {
        if let (Some(&a), Some(&b)) = (self.index.get(from), self.index.get(to)) {
            if let Some(e) = self.graph.find_edge(a, b) {
                self.graph.remove_edge(e);
            }
        }
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        let a = self.index[from];
        let b = self.index[to];
        self.graph.update_edge(a, b, ());
    }

    /// Remove a node (no deps, no dependents by the time this is
    /// called) and drop it from the id index.
    pub fn remove_node(&mut self, id: &str) {
        if let Some(idx) = self.index.remove(id) {
            self.graph.remove_node(idx);
            // petgraph's remove_node swaps the last index into the
            // removed slot; refresh the index entry for whichever node
            // (if any) now sits there.
            if let Some(moved) = self.graph.node_weight(idx) {
                self.index.insert(moved.id.clone(), idx);
            }
        }
    }

    pub fn attrs(&self, id: &str) -> &[(String, String)] {
        self.index.get(id).map(|&idx| self.graph[idx].attrs.as_slice()).unwrap_or(&[])
    }
}

/// Parse `_get_cmd_remote_from`: a leading `@` (or a `@` in second
/// position, after some other single-char prefix) marks an action
/// remote and is stripped from the command.
pub fn extract_remote(cmd: &str) -> (String, bool) {
    let mut chars = cmd.chars();
    match (chars.next(), chars.next()) {
        (Some(first), _) if first == REMOTE_CHAR => (cmd[first.len_utf8()..].to_string(), true),
        (Some(first), Some(second)) if second == REMOTE_CHAR => {
            let mut out = String::new();
            out.push(first);
            out.push_str(&cmd[first.len_utf8() + second.len_utf8()..]);
            (out, true)
        }
        _ => (cmd.to_string(), false),
    }
}

/// Parse an attribute key's trailing `?k=v&k=v` params, returning the
/// bare rule name and its `force` value if present.
fn parse_force(attribute_key: &str) -> ForceMode {
    let Some(idx) = attribute_key.find('?') else {
        return ForceMode::Allowed;
    };
    let params = &attribute_key[idx + 1..];
    for kv in params.split('&') {
        if let Some(value) = kv.strip_prefix("force=") {
            return value.parse().unwrap_or(ForceMode::Allowed);
        }
    }
    ForceMode::Allowed
}

/// The action id ISM assigns: `{component_id}/{rule name}` (the
/// source's `node + "/" + rulename`).
pub fn action_id(component_id: &str, attribute_key: &str) -> String {
    format!("{component_id}/{}", rule_name_of(attribute_key))
}

/// Every action produced by a node's attributes, in their stored
/// (sorted) order. When `with_deps` is set, each action's explicit
/// `deps` are the ids of every action carried by the node's direct
/// dependencies.
pub fn actions_for(graph: &WorkGraph, id: &str, with_deps: bool) -> Vec<Action> {
    let explicit_deps: Vec<String> = if with_deps {
        graph
            .successors(id)
            .iter()
            .flat_map(|dep| graph.attrs(dep).iter().map(|(k, _)| action_id(dep, k)))
            .collect()
    } else {
        Vec::new()
    };

    graph
        .attrs(id)
        .iter()
        .map(|(key, command)| {
            let (command, remote) = extract_remote(command);
            Action {
                id: action_id(id, key),
                command,
                component_set: id.to_string(),
                remote,
                force: parse_force(key),
                deps: explicit_deps.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_leading_remote_marker() {
        assert_eq!(extract_remote("@echo hi"), ("echo hi".to_string(), true));
        assert_eq!(extract_remote("echo hi"), ("echo hi".to_string(), false));
        assert_eq!(extract_remote("+@echo hi"), ("+echo hi".to_string(), true));
    }

    #[test]
    fn parses_force_param_from_key() {
        assert_eq!(parse_force("Rule"), ForceMode::Allowed);
        assert_eq!(parse_force("Rule?force=always"), ForceMode::Always);
        assert_eq!(parse_force("Rule?force=never"), ForceMode::Never);
    }
}
