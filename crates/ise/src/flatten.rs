//! Flattens an [`sequencer_ism::Instruction`] tree into the flat
//! execution graph ISE schedules over: one node per action, its
//! dependency set being the union of whatever explicit `deps` ISM
//! attached plus the implicit ordering a `Seq` imposes between
//! consecutive children (`starting_set`/`ending_set`).

use crate::error::{IseError, IseResult};
use hashbrown::{HashMap, HashSet};
use sequencer_core::ForceMode;
use sequencer_ism::{Instruction, IsmError};

#[derive(Debug, Clone)]
pub struct FlatAction {
    pub id: String,
    pub command: String,
    pub component_set: String,
    pub remote: bool,
    pub force: ForceMode,
}

#[derive(Debug, Clone, Default)]
pub struct ExecGraph {
    pub actions: HashMap<String, FlatAction>,
    pub deps: HashMap<String, HashSet<String>>,
    pub dependents: HashMap<String, HashSet<String>>,
}

impl ExecGraph {
    pub fn from_instruction(instr: &Instruction) -> IseResult<Self> {
        let mut graph = ExecGraph::default();
        flatten(instr, &mut graph);

        for (id, deps) in &graph.deps {
            for dep in deps {
                if !graph.actions.contains_key(dep) {
                    return Err(IseError::UnknownDep(format!("{id} -> {dep}")));
                }
            }
        }
        check_cycles(&graph.deps)?;
        for (id, deps) in &graph.deps {
            for dep in deps {
                graph.dependents.entry(dep.clone()).or_default().insert(id.clone());
            }
        }
        Ok(graph)
    }

    pub fn all_deps(&self, id: &str) -> impl Iterator<Item = &String> {
        self.deps.get(id).into_iter().flatten()
    }

    pub fn dependents_of(&self, id: &str) -> impl Iterator<Item = &String> {
        self.dependents.get(id).into_iter().flatten()
    }
}

fn check_cycles(deps: &HashMap<String, HashSet<String>>) -> IseResult<()> {
    let mut visited: HashSet<String> = HashSet::new();
    for id in deps.keys() {
        if visited.contains(id) {
            continue;
        }
        let mut stack = Vec::new();
        let mut on_stack = HashSet::new();
        if let Some(cycle) = find_cycle(id, deps, &mut visited, &mut stack, &mut on_stack) {
            return Err(IseError::Ism(IsmError::CyclesDetected(cycle)));
        }
    }
    Ok(())
}

fn find_cycle(
    id: &str,
    deps: &HashMap<String, HashSet<String>>,
    visited: &mut HashSet<String>,
    stack: &mut Vec<String>,
    on_stack: &mut HashSet<String>,
) -> Option<Vec<String>> {
    visited.insert(id.to_string());
    on_stack.insert(id.to_string());
    stack.push(id.to_string());
    if let Some(children) = deps.get(id) {
        for child in children {
            if on_stack.contains(child) {
                let idx = stack.iter().position(|x| x == child).unwrap();
                return Some(stack[idx..].to_vec());
            }
            if !visited.contains(child) {
                if let Some(cycle) = find_cycle(child, deps, visited, stack, on_stack) {
                    return Some(cycle);
                }
            }
        }
    }
    stack.pop();
    on_stack.remove(id);
    None
}

fn flatten(instr: &Instruction, graph: &mut ExecGraph) {
    match instr {
        Instruction::Action(action) => {
            graph.actions.insert(
                action.id.clone(),
                FlatAction {
                    id: action.id.clone(),
                    command: action.command.clone(),
                    component_set: action.component_set.clone(),
                    remote: action.remote,
                    force: action.force,
                },
            );
            graph.deps.entry(action.id.clone()).or_default().extend(action.deps.iter().cloned());
        }
        Instruction::Seq(items) => {
            for item in items {
                flatten(item, graph);
            }
            for window in items.windows(2) {
                let prev_ending = window[0].ending_set();
                let cur_starting = window[1].starting_set();
                for start_id in cur_starting {
                    graph.deps.entry(start_id).or_default().extend(prev_ending.iter().cloned());
                }
            }
        }
        Instruction::Par(items) => {
            for item in items {
                flatten(item, graph);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequencer_ism::Action;

    fn action(id: &str, deps: &[&str]) -> Instruction {
        Instruction::Action(Action {
            id: id.to_string(),
            command: "true".to_string(),
            component_set: "x".to_string(),
            remote: false,
            force: ForceMode::Allowed,
            deps: deps.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn seq_adds_implicit_ordering_between_children() {
        let tree = Instruction::Seq(vec![action("a", &[]), action("b", &[])]);
        let graph = ExecGraph::from_instruction(&tree).unwrap();
        assert!(graph.deps["b"].contains("a"));
    }

    #[test]
    fn par_adds_no_implicit_edges() {
        let tree = Instruction::Par(vec![action("a", &[]), action("b", &[])]);
        let graph = ExecGraph::from_instruction(&tree).unwrap();
        assert!(graph.deps.get("a").map(|d| d.is_empty()).unwrap_or(true));
        assert!(graph.deps.get("b").map(|d| d.is_empty()).unwrap_or(true));
    }

    #[test]
    fn explicit_dep_pointing_nowhere_is_rejected() {
        let tree = action("a", &["missing"]);
        let err = ExecGraph::from_instruction(&tree).unwrap_err();
        assert!(matches!(err, IseError::UnknownDep(_)));
    }

    #[test]
    fn dependents_is_the_reverse_of_deps() {
        let tree = Instruction::Seq(vec![action("a", &[]), action("b", &[])]);
        let graph = ExecGraph::from_instruction(&tree).unwrap();
        assert!(graph.dependents_of("a").any(|d| d == "b"));
    }

    #[test]
    fn cyclic_explicit_deps_are_rejected() {
        let tree = Instruction::Par(vec![action("a", &["b"]), action("b", &["a"])]);
        let err = ExecGraph::from_instruction(&tree).unwrap_err();
        assert!(matches!(err, IseError::Ism(IsmError::CyclesDetected(_))));
    }
}
