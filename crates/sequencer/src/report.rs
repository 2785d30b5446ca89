//! Slices an instruction tree plus its execution report down to the
//! action ids a caller asked for: every modeled action, only the ones
//! that ran, only the ones that errored, or only the ones the model
//! named but execution never got to.

use sequencer_ism::Instruction;
use sequencer_ise::ExecutionReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFilter {
    All,
    None,
    /// Every action id named in the instruction tree, executed or not.
    Model,
    /// Only actions that actually ran.
    Exec,
    /// Only actions in the execution's error set.
    Error,
    /// Actions named in the model that never got an execution record.
    Unexec,
}

pub fn filter_report(instr: &Instruction, report: &ExecutionReport, filter: ReportFilter) -> Vec<String> {
    match filter {
        ReportFilter::All | ReportFilter::Model => model_action_ids(instr),
        ReportFilter::None => Vec::new(),
        ReportFilter::Exec => report.records.keys().cloned().collect(),
        ReportFilter::Error => report.errors.iter().cloned().collect(),
        ReportFilter::Unexec => model_action_ids(instr)
            .into_iter()
            .filter(|id| !report.records.contains_key(id))
            .collect(),
    }
}

fn model_action_ids(instr: &Instruction) -> Vec<String> {
    match instr {
        Instruction::Action(action) => vec![action.id.clone()],
        Instruction::Seq(items) | Instruction::Par(items) => {
            items.iter().flat_map(model_action_ids).collect()
        }
    }
}
