//! The four ordering algorithms that reduce a prepared [`WorkGraph`]
//! into an [`Instruction`] tree: sequential, parallel, layered-mixed,
//! and a minimal-tree optimal builder.

use crate::graph::{action_id, actions_for, WorkGraph};
use crate::instruction::{Action, Instruction};
use crate::prepare;
use hashbrown::HashSet;
use petgraph::algo::toposort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Seq,
    Par,
    Mixed,
    Optimal,
}

/// `0 -> None, 1 -> that element, many -> many(items)`, the shared
/// top/layer-level collapsing rule used by every ordering algorithm.
fn fold_many(mut items: Vec<Instruction>, many: fn(Vec<Instruction>) -> Instruction) -> Option<Instruction> {
    match items.len() {
        0 => None,
        1 => Some(items.pop().unwrap()),
        _ => Some(many(items)),
    }
}

/// All actions in dependency-first order, flattened into a single
/// sequence.
pub fn order_seq(graph: &WorkGraph) -> Option<Instruction> {
    let mut order = toposort(&graph.graph, None).expect("graph is acyclic after prepare");
    order.reverse();
    let mut actions = Vec::new();
    for idx in order {
        let id = graph.graph[idx].id.clone();
        actions.extend(actions_for(graph, &id, false));
    }
    Instruction::from_actions(actions)
}

/// Every node runs in parallel; ordering is enforced only through
/// explicit dependency ids.
pub fn order_par(graph: &WorkGraph) -> Option<Instruction> {
    let instructions: Vec<Instruction> = graph
        .node_ids()
        .into_iter()
        .filter_map(|id| Instruction::from_actions(actions_for(graph, &id, true)))
        .collect();
    fold_many(instructions, Instruction::Par)
}

/// Peel leaves (nodes with no remaining dependency) into successive
/// parallel layers, then sequence the layers.
pub fn order_mixed(mut graph: WorkGraph) -> Option<Instruction> {
    let mut layers = Vec::new();
    loop {
        let remaining = graph.node_ids();
        if remaining.is_empty() {
            break;
        }
        let leaves = prepare::leaves(&graph);
        let instructions: Vec<Instruction> = leaves
            .iter()
            .filter_map(|id| Instruction::from_actions(actions_for(&graph, id, false)))
            .collect();
        if let Some(layer) = fold_many(instructions, Instruction::Par) {
            layers.push(layer);
        }
        for leaf in &leaves {
            graph.remove_node(leaf);
        }
    }
    fold_many(layers, Instruction::Seq)
}

/// Build a minimal tree bottom-up from each root, sharing already-built
/// subtrees across roots via explicit deps instead of duplicating their
/// execution.
pub fn order_optimal(graph: &WorkGraph) -> Option<Instruction> {
    let mut computed: HashSet<String> = HashSet::new();
    let instructions: Vec<Instruction> = prepare::roots(graph)
        .into_iter()
        .filter_map(|id| xml_block_for(&id, &mut computed, graph))
        .collect();
    fold_many(instructions, Instruction::Par)
}

fn xml_block_for(id: &str, computed: &mut HashSet<String>, graph: &WorkGraph) -> Option<Instruction> {
    if computed.contains(id) {
        return None;
    }
    computed.insert(id.to_string());
    let mut actions = actions_for(graph, id, false);
    let deps = graph.successors(id);
    Some(make_deps(&mut actions, &deps, computed, graph))
}

fn make_explicit_deps(actions: &mut [Action], dep: &str, graph: &WorkGraph) {
    let dep_ids: Vec<String> = graph.attrs(dep).iter().map(|(k, _)| action_id(dep, k)).collect();
    for action in actions.iter_mut() {
        action.deps.extend(dep_ids.iter().cloned());
    }
}

fn make_deps(actions: &mut Vec<Action>, deps: &[String], computed: &mut HashSet<String>, graph: &WorkGraph) -> Instruction {
    match deps.len() {
        0 => Instruction::from_actions(std::mem::take(actions)).expect("node carries at least one action"),
        1 => make_deps_single(actions, &deps[0], computed, graph),
        _ => make_deps_several(actions, deps, computed, graph),
    }
}

fn make_deps_single(actions: &mut Vec<Action>, dep: &str, computed: &mut HashSet<String>, graph: &WorkGraph) -> Instruction {
    match xml_block_for(dep, computed, graph) {
        None => {
            make_explicit_deps(actions, dep, graph);
            Instruction::from_actions(std::mem::take(actions)).expect("node carries at least one action")
        }
        Some(Instruction::Seq(mut items)) => {
            items.extend(actions.drain(..).map(Instruction::Action));
            Instruction::Seq(items)
        }
        Some(other) => Instruction::Seq(vec![
            other,
            Instruction::from_actions(std::mem::take(actions)).expect("node carries at least one action"),
        ]),
    }
}

fn make_deps_several(actions: &mut Vec<Action>, deps: &[String], computed: &mut HashSet<String>, graph: &WorkGraph) -> Instruction {
    let mut par_dep = Vec::new();
    for dep in deps {
        match xml_block_for(dep, computed, graph) {
            None => make_explicit_deps(actions, dep, graph),
            Some(block) => par_dep.push(block),
        }
    }
    match par_dep.len() {
        0 => Instruction::from_actions(std::mem::take(actions)).expect("node carries at least one action"),
        1 => {
            let only = par_dep.pop().unwrap();
            if let Instruction::Seq(mut items) = only {
                items.extend(actions.drain(..).map(Instruction::Action));
                Instruction::Seq(items)
            } else {
                Instruction::Seq(vec![
                    only,
                    Instruction::from_actions(std::mem::take(actions)).expect("node carries at least one action"),
                ])
            }
        }
        _ => Instruction::Seq(vec![
            Instruction::Par(par_dep),
            Instruction::from_actions(std::mem::take(actions)).expect("node carries at least one action"),
        ]),
    }
}
