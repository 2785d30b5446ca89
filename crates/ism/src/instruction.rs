//! The result of ISM reduction: an [`Instruction`] tree, owned by ISM
//! and read-only once handed to ISE. A single action, a sequential
//! group, or a parallel group, modeled as one enum rather than a class
//! hierarchy.

use hashbrown::HashSet;
use sequencer_core::ForceMode;

/// A single scheduled command. `id` is always `"{component_id}/{rule}"`
/// here (ISM always sets it explicitly; ISE only falls back to a
/// generated id for actions arriving without one over the wire).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub id: String,
    pub command: String,
    pub component_set: String,
    pub remote: bool,
    pub force: ForceMode,
    /// Extra dependency action ids beyond what tree nesting implies.
    pub deps: Vec<String>,
}

impl Action {
    pub fn add_dep(&mut self, dep_id: impl Into<String>) {
        self.deps.push(dep_id.into());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Action(Action),
    /// Executed in order; each element depends on the previous one's
    /// `ending_set`.
    Seq(Vec<Instruction>),
    /// No implicit ordering between elements.
    Par(Vec<Instruction>),
}

impl Instruction {
    /// Build the 1-or-many-or-none instruction for a flat action list,
    /// matching `_make_instruction_from`: empty -> `None`, one -> that
    /// action, many -> wrapped in a `Seq`.
    pub fn from_actions(mut actions: Vec<Action>) -> Option<Instruction> {
        match actions.len() {
            0 => None,
            1 => Some(Instruction::Action(actions.pop().unwrap())),
            _ => Some(Instruction::Seq(actions.into_iter().map(Instruction::Action).collect())),
        }
    }

    /// Action ids with nothing before them in this subtree.
    pub fn starting_set(&self) -> HashSet<String> {
        match self {
            Instruction::Action(a) => HashSet::from_iter([a.id.clone()]),
            Instruction::Seq(items) => items.first().map(Instruction::starting_set).unwrap_or_default(),
            Instruction::Par(items) => items.iter().flat_map(Instruction::starting_set).collect(),
        }
    }

    /// Action ids with nothing after them in this subtree.
    pub fn ending_set(&self) -> HashSet<String> {
        match self {
            Instruction::Action(a) => HashSet::from_iter([a.id.clone()]),
            Instruction::Seq(items) => items.last().map(Instruction::ending_set).unwrap_or_default(),
            Instruction::Par(items) => items.iter().flat_map(Instruction::ending_set).collect(),
        }
    }

    pub fn action_ids(&self) -> HashSet<String> {
        match self {
            Instruction::Action(a) => HashSet::from_iter([a.id.clone()]),
            Instruction::Seq(items) | Instruction::Par(items) => {
                items.iter().flat_map(Instruction::action_ids).collect()
            }
        }
    }
}
