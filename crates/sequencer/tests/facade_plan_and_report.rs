//! `execution_plan` and `filter_report` consumed together against a
//! real chained run: an independent pair of actions plus a third that
//! depends on both.

use sequencer::{chain, filter_report, ChainOptions, ReportFilter};
use sequencer_core::{Component, Filter, FullType, Rule, RuleSet};

fn ruleset() -> RuleSet {
    let base = Rule {
        ruleset: "plan".into(),
        name: "Base".into(),
        types: vec![FullType::new("base", "c")],
        filter: Filter::All,
        action: Some("true".into()),
        depsfinder: None,
        dependson: vec![],
        comments: None,
        help: None,
    };
    RuleSet::new("plan", vec![base]).unwrap()
}

#[tokio::test]
async fn plan_and_report_reflect_the_single_stage_run() {
    let ruleset = ruleset();
    let a = Component::new("a", "base", "c");

    let result = chain(&ruleset, vec![a.clone()], ChainOptions::default()).await.unwrap();
    let instr = result.instr.expect("one action should have matched");
    let report = result.report.expect("instr was Some, so seqexec ran");

    let plan = sequencer::execution_plan(&instr);
    assert_eq!(plan.stages.len(), 1);
    assert_eq!(plan.stages[0].action_ids, vec!["a#base@c/Base".to_string()]);

    let exec_ids = filter_report(&instr, &report, ReportFilter::Exec);
    assert_eq!(exec_ids, vec!["a#base@c/Base".to_string()]);
    assert!(filter_report(&instr, &report, ReportFilter::Unexec).is_empty());
}
