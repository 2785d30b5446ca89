//! Graph preparation: validate acyclicity, drop transitive (redundant)
//! edges, and elide nodes that carry no action attributes.

use crate::error::{IsmError, IsmResult};
use crate::graph::WorkGraph;
use hashbrown::HashSet;
use petgraph::algo::{kosaraju_scc, toposort};
use tracing::{debug, info};

pub fn prepare(mut graph: WorkGraph) -> IsmResult<WorkGraph> {
    check_acyclic(&graph)?;
    remove_transitive_edges(&mut graph);
    remove_useless_nodes(&mut graph);
    Ok(graph)
}

fn check_acyclic(graph: &WorkGraph) -> IsmResult<()> {
    if toposort(&graph.graph, None).is_ok() {
        return Ok(());
    }
    let witness = kosaraju_scc(&graph.graph)
        .into_iter()
        .find(|scc| scc.len() > 1)
        .map(|scc| scc.into_iter().map(|idx| graph.graph[idx].id.clone()).collect())
        .unwrap_or_default();
    Err(IsmError::CyclesDetected(witness))
}

/// Remove an edge `u -> v` whenever `v` is reachable from `u` through
/// some other path, i.e. a redundant shortcut (`A->B->C, A->C`: the
/// `A->C` edge is useless).
fn remove_transitive_edges(graph: &mut WorkGraph) {
    let mut doomed = Vec::new();
    for id in graph.node_ids() {
        let direct = graph.successors(&id);
        for via in &direct {
            let mut visited: HashSet<String> = HashSet::new();
            let mut stack: Vec<String> = direct.iter().filter(|d| *d != via).cloned().collect();
            let mut reachable = false;
            while let Some(n) = stack.pop() {
                if &n == via {
                    reachable = true;
                    break;
                }
                if !visited.insert(n.clone()) {
                    continue;
                }
                stack.extend(graph.successors(&n));
            }
            if reachable {
                doomed.push((id.clone(), via.clone()));
            }
        }
    }
    for (from, to) in doomed {
        info!(from = %from, to = %to, "removing transitive dependency edge");
        graph.remove_edge(&from, &to);
    }
}

/// Elide a node with no action attributes, rewiring every
/// dependent-parent directly onto every one of its dependencies.
fn remove_useless_nodes(graph: &mut WorkGraph) {
    loop {
        let useless = graph.node_ids().into_iter().find(|id| graph.attrs(id).is_empty());
        let Some(id) = useless else { break };
        let parents = graph.predecessors(&id);
        let children = graph.successors(&id);
        debug!(node = %id, "removing useless node (no action)");
        for parent in &parents {
            graph.remove_edge(parent, &id);
            for child in &children {
                graph.remove_edge(&id, child);
                graph.add_edge(parent, child);
            }
        }
        graph.remove_node(&id);
    }
}

/// A node with no outstanding dependencies, the `mixed` algorithm's
/// leaves.
pub fn is_leaf(graph: &WorkGraph, id: &str) -> bool {
    graph.successors(id).is_empty()
}

/// A node nothing depends on, the `optimal` algorithm's roots.
pub fn is_root(graph: &WorkGraph, id: &str) -> bool {
    graph.predecessors(id).is_empty()
}

pub fn roots(graph: &WorkGraph) -> Vec<String> {
    graph.node_ids().into_iter().filter(|id| is_root(graph, id)).collect()
}

pub fn leaves(graph: &WorkGraph) -> Vec<String> {
    graph.node_ids().into_iter().filter(|id| is_leaf(graph, id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_core::Component;
    use sequencer_dgm::ActionDag;

    fn dag_with(edges: &[(&str, &str)], actioned: &[&str]) -> ActionDag {
        let mut dag = ActionDag::new();
        let mut seen = HashSet::new();
        for (a, b) in edges {
            seen.insert(*a);
            seen.insert(*b);
        }
        for id in &seen {
            let c: Component = id.parse().unwrap();
            dag.ensure_node(c);
        }
        for name in actioned {
            dag.add_attribute(name, "Rule".into(), "true".into());
        }
        for (a, b) in edges {
            dag.add_edge(a, b, vec!["Rule".into()]);
        }
        dag
    }

    #[test]
    fn detects_cycles_with_a_witness() {
        let dag = dag_with(&[("a#t@c", "b#t@c"), ("b#t@c", "a#t@c")], &["a#t@c", "b#t@c"]);
        let graph = WorkGraph::from_action_dag(&dag);
        let err = prepare(graph).unwrap_err();
        match err {
            IsmError::CyclesDetected(witness) => assert_eq!(witness.len(), 2),
            _ => panic!("expected CyclesDetected"),
        }
    }

    #[test]
    fn removes_transitive_shortcut_edge() {
        let dag = dag_with(
            &[("a#t@c", "b#t@c"), ("b#t@c", "c#t@c"), ("a#t@c", "c#t@c")],
            &["a#t@c", "b#t@c", "c#t@c"],
        );
        let graph = prepare(WorkGraph::from_action_dag(&dag)).unwrap();
        assert_eq!(graph.successors("a#t@c"), vec!["b#t@c".to_string()]);
    }

    #[test]
    fn elides_actionless_node_and_rewires_around_it() {
        let dag = dag_with(&[("a#t@c", "b#t@c"), ("b#t@c", "c#t@c")], &["a#t@c", "c#t@c"]);
        let graph = prepare(WorkGraph::from_action_dag(&dag)).unwrap();
        assert_eq!(graph.node_ids().len(), 2);
        assert_eq!(graph.successors("a#t@c"), vec!["c#t@c".to_string()]);
    }
}
