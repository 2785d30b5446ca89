//! Facade chaining the three core engines: `depmake` builds an
//! [`ActionDag`] from a ruleset and a requested component set,
//! `seqmake` reduces it into an [`Instruction`] tree, `seqexec` runs
//! that tree, and [`chain`] does all three in one call. There is no
//! CLI front end here; callers build [`ChainOptions`] directly.

mod config;
mod error;
mod report;

pub use config::{DgmConfig, IseConfig, RuleStoreConfig, SequencerConfig};
pub use error::{PipelineError, PipelineResult};
pub use report::{filter_report, ReportFilter};
pub use sequencer_dgm::ActionDag;
pub use sequencer_ise::{ActionRecord, ExecutionConfig, ExecutionReport};
pub use sequencer_ism::{execution_plan, Action, Algorithm, ExecutionPlan, ExecutionStage, Instruction};
pub use sequencer_rulestore::{FileRuleStore, FileRuleStoreConfig, RuleStore};

use sequencer_core::{Component, RuleSet};
use sequencer_dgm::DgmEngine;

/// Load one ruleset's rules out of a [`RuleStore`] and assemble them
/// into a [`RuleSet`], ready for [`depmake`].
pub async fn load_ruleset(store: &dyn RuleStore, ruleset: &str) -> PipelineResult<RuleSet> {
    let rules = store.rules_for(ruleset).await?;
    Ok(RuleSet::new(ruleset, rules.into_values().collect())?)
}

/// Build the ActionDAG for `requested` against `ruleset`. `force_rules`
/// entries name a rule to force-always; a leading `^` forces-never.
/// `docache` enables DGM's per-rule filter cache.
pub fn depmake(
    ruleset: &RuleSet,
    requested: Vec<Component>,
    force_rules: &[String],
    docache: bool,
) -> PipelineResult<ActionDag> {
    let mut engine = DgmEngine::new(ruleset, force_rules, docache)?;
    Ok(engine.build(requested)?)
}

/// Reduce an ActionDAG into an instruction tree under `algorithm`.
/// `None` means the DAG carried no actions at all.
pub fn seqmake(dag: &ActionDag, algorithm: Algorithm) -> PipelineResult<Option<Instruction>> {
    Ok(sequencer_ism::reduce(dag, algorithm)?)
}

/// Execute an instruction tree to completion.
pub async fn seqexec(instr: &Instruction, config: ExecutionConfig) -> PipelineResult<ExecutionReport> {
    Ok(sequencer_ise::execute(instr, config).await?)
}

/// Serialize an ActionDAG to the XML wire format.
pub fn dag_to_xml(dag: &ActionDag) -> PipelineResult<String> {
    Ok(sequencer_wire::action_dag_to_xml(dag)?)
}

/// Parse an ActionDAG back from the XML wire format.
pub fn dag_from_xml(xml: &str) -> PipelineResult<ActionDag> {
    Ok(sequencer_wire::action_dag_from_xml(xml)?)
}

/// Serialize an instruction tree to the XML wire format.
pub fn instruction_to_xml(instr: &Instruction) -> PipelineResult<String> {
    Ok(sequencer_wire::instruction_tree_to_xml(instr)?)
}

/// Parse an instruction tree back from the XML wire format.
pub fn instruction_from_xml(xml: &str) -> PipelineResult<Instruction> {
    Ok(sequencer_wire::instruction_tree_from_xml(xml)?)
}

#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub force_rules: Vec<String>,
    pub docache: bool,
    pub algorithm: Algorithm,
    pub execution: ExecutionConfig,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            force_rules: Vec::new(),
            docache: true,
            algorithm: Algorithm::Mixed,
            execution: ExecutionConfig::default(),
        }
    }
}

pub struct ChainResult {
    pub dag: ActionDag,
    pub instr: Option<Instruction>,
    pub report: Option<ExecutionReport>,
}

/// Run depmake -> seqmake -> seqexec in one call. If the DAG carries no
/// actions, `instr`/`report` come back `None` rather than erroring: an
/// empty result is a valid (if uninteresting) outcome, matching
/// `Instruction::from_actions`'s own `0 -> None` collapsing.
pub async fn chain(
    ruleset: &RuleSet,
    requested: Vec<Component>,
    options: ChainOptions,
) -> PipelineResult<ChainResult> {
    let dag = depmake(ruleset, requested, &options.force_rules, options.docache)?;
    let instr = seqmake(&dag, options.algorithm)?;
    let report = match &instr {
        Some(instr) => Some(seqexec(instr, options.execution).await?),
        None => None,
    };
    Ok(ChainResult { dag, instr, report })
}
