//! Structured per-level summary of an instruction tree, for
//! `--dostats`-style reporting. Repurposes the "execution levels"
//! layering idea (dependency level = one past the deepest dependency)
//! from rule-execution levels to the ordering an `Instruction` tree
//! already encodes: a `Seq` step is a later stage than what came
//! before it; a `Par` branch contributes its own stages in parallel
//! with its siblings'.

use crate::instruction::Instruction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStage {
    pub index: usize,
    pub action_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionPlan {
    pub stages: Vec<ExecutionStage>,
}

pub fn execution_plan(instr: &Instruction) -> ExecutionPlan {
    let stages = levels_of(instr)
        .into_iter()
        .enumerate()
        .map(|(index, action_ids)| ExecutionStage { index, action_ids })
        .collect();
    ExecutionPlan { stages }
}

fn levels_of(instr: &Instruction) -> Vec<Vec<String>> {
    match instr {
        Instruction::Action(action) => vec![vec![action.id.clone()]],
        Instruction::Seq(items) => items.iter().flat_map(levels_of).collect(),
        Instruction::Par(items) => {
            let branches: Vec<Vec<Vec<String>>> = items.iter().map(levels_of).collect();
            let depth = branches.iter().map(|b| b.len()).max().unwrap_or(0);
            let mut merged = vec![Vec::new(); depth];
            for branch in branches {
                for (i, level) in branch.into_iter().enumerate() {
                    merged[i].extend(level);
                }
            }
            merged
        }
    }
}
