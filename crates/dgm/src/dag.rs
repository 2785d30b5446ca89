//! [`ActionDag`]: nodes are component identifiers, each carrying a
//! (possibly empty) list of `(attribute-key, command)` pairs; edges
//! express "depends on", labeled with the rule names that produced
//! them. Backed by a `petgraph::DiGraph` plus an id -> index map, with
//! a DOT/Mermaid/ASCII export trio.

use hashbrown::HashMap;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use sequencer_core::Component;

#[derive(Debug, Clone)]
pub struct ActionNode {
    pub component: Component,
    /// `(rule.name[?force=mode], substituted command)` pairs.
    pub attributes: Vec<(String, String)>,
}

/// Strip a trailing `?...` force-mode suffix, leaving the bare rule name.
pub fn rule_name_of(attribute_key: &str) -> &str {
    match attribute_key.find('?') {
        Some(idx) => &attribute_key[..idx],
        None => attribute_key,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionDag {
    graph: DiGraph<ActionNode, Vec<String>>,
    index: HashMap<String, NodeIndex>,
}

impl ActionDag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node for `component` if one doesn't already exist; return
    /// its index either way.
    pub fn ensure_node(&mut self, component: Component) -> NodeIndex {
        let id = component.id();
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(ActionNode {
            component,
            attributes: Vec::new(),
        });
        self.index.insert(id, idx);
        idx
    }

    pub fn contains(&self, component_id: &str) -> bool {
        self.index.contains_key(component_id)
    }

    /// Whether `component_id` already carries an attribute for
    /// `rule_name` (ignoring any `?force=` suffix), the idempotence
    /// check in DGM's apply step.
    pub fn has_attribute_for_rule(&self, component_id: &str, rule_name: &str) -> bool {
        self.index
            .get(component_id)
            .map(|&idx| {
                self.graph[idx]
                    .attributes
                    .iter()
                    .any(|(key, _)| rule_name_of(key) == rule_name)
            })
            .unwrap_or(false)
    }

    pub fn add_attribute(&mut self, component_id: &str, key: String, command: String) {
        if let Some(&idx) = self.index.get(component_id) {
            self.graph[idx].attributes.push((key, command));
        }
    }

    /// Add or update the `from -> to` edge, overwriting its label list
    /// if the edge already exists.
    pub fn add_edge(&mut self, from_id: &str, to_id: &str, labels: Vec<String>) {
        let from = self.index[from_id];
        let to = self.index[to_id];
        self.graph.update_edge(from, to, labels);
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ActionNode> {
        self.graph.node_weights()
    }

    pub fn node(&self, component_id: &str) -> Option<&ActionNode> {
        self.index.get(component_id).map(|&idx| &self.graph[idx])
    }

    /// Every component id currently in the DAG, in insertion order.
    pub fn component_ids(&self) -> Vec<String> {
        self.graph.node_weights().map(|n| n.component.id()).collect()
    }

    /// All `(dependent, dependency)` pairs in the DAG.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.graph
            .edge_indices()
            .map(|e| {
                let (a, b) = self.graph.edge_endpoints(e).unwrap();
                (self.graph[a].component.id(), self.graph[b].component.id())
            })
            .collect()
    }

    /// Every `(dependent, dependency, labels)` triple in the DAG, for
    /// wire serialization.
    pub fn edges_with_labels(&self) -> Vec<(String, String, Vec<String>)> {
        self.graph
            .edge_indices()
            .map(|e| {
                let (a, b) = self.graph.edge_endpoints(e).unwrap();
                (self.graph[a].component.id(), self.graph[b].component.id(), self.graph[e].clone())
            })
            .collect()
    }

    pub fn dependencies(&self, component_id: &str) -> Vec<&ActionNode> {
        match self.index.get(component_id) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|n| &self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    /// `petgraph::algo::toposort` over `is_cyclic_directed`: avoids a
    /// stack overflow on deep chains.
    pub fn is_cyclic(&self) -> bool {
        toposort(&self.graph, None).is_err()
    }

    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph action_dag {\n");
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            out.push_str(&format!("    \"{}\";\n", node.component.id()));
        }
        for edge in self.graph.edge_indices() {
            let (a, b) = self.graph.edge_endpoints(edge).unwrap();
            let label = self.graph[edge].join(", ");
            out.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
                self.graph[a].component.id(),
                self.graph[b].component.id(),
                label
            ));
        }
        out.push_str("}\n");
        out
    }

    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        for edge in self.graph.edge_indices() {
            let (a, b) = self.graph.edge_endpoints(edge).unwrap();
            out.push_str(&format!(
                "    {}-->{}\n",
                mermaid_id(&self.graph[a].component.id()),
                mermaid_id(&self.graph[b].component.id())
            ));
        }
        out
    }

    pub fn to_ascii(&self) -> String {
        let mut out = String::new();
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            out.push_str(&node.component.id());
            let deps: Vec<String> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|n| self.graph[n].component.id())
                .collect();
            if !deps.is_empty() {
                out.push_str(" -> ");
                out.push_str(&deps.join(", "));
            }
            out.push('\n');
        }
        out
    }
}

fn mermaid_id(component_id: &str) -> String {
    component_id.replace(['#', '@'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensures_node_once() {
        let mut dag = ActionDag::new();
        let a = Component::new("a", "t", "c");
        let idx1 = dag.ensure_node(a.clone());
        let idx2 = dag.ensure_node(a);
        assert_eq!(idx1, idx2);
        assert_eq!(dag.node_count(), 1);
    }

    #[test]
    fn rule_already_applied_detected_despite_force_suffix() {
        let mut dag = ActionDag::new();
        let a = Component::new("a", "t", "c");
        dag.ensure_node(a.clone());
        dag.add_attribute(&a.id(), "R1?force=always".into(), "echo hi".into());
        assert!(dag.has_attribute_for_rule(&a.id(), "R1"));
    }

    #[test]
    fn detects_cycles() {
        let mut dag = ActionDag::new();
        let a = Component::new("a", "t", "c");
        let b = Component::new("b", "t", "c");
        dag.ensure_node(a.clone());
        dag.ensure_node(b.clone());
        dag.add_edge(&a.id(), &b.id(), vec!["R".into()]);
        assert!(!dag.is_cyclic());
        dag.add_edge(&b.id(), &a.id(), vec!["R2".into()]);
        assert!(dag.is_cyclic());
    }
}
