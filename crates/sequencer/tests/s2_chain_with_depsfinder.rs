//! Rules `Ra:types=[ta@c],depsfinder=prints "b#tb@c",dependson=[Rb]`,
//! `Rb:types=[tb@c],action="true"`. Input `a#ta@c`. Expect: edge
//! `a#ta@c -> b#tb@c`; optimal tree = SEQ(Rb, Ra); rc = OK.

use sequencer::{depmake, seqexec, seqmake, Algorithm, ExecutionConfig, Instruction};
use sequencer_core::{ActionRc, Component, Filter, FullType, Rule, RuleSet};

fn ruleset() -> RuleSet {
    let ra = Rule {
        ruleset: "s2".into(),
        name: "Ra".into(),
        types: vec![FullType::new("ta", "c")],
        filter: Filter::All,
        action: Some("echo ra".into()),
        depsfinder: Some("printf 'b#tb@c\\n'".into()),
        dependson: vec!["Rb".into()],
        comments: None,
        help: None,
    };
    let rb = Rule {
        ruleset: "s2".into(),
        name: "Rb".into(),
        types: vec![FullType::new("tb", "c")],
        filter: Filter::All,
        action: Some("true".into()),
        depsfinder: None,
        dependson: vec![],
        comments: None,
        help: None,
    };
    RuleSet::new("s2", vec![ra, rb]).unwrap()
}

#[tokio::test]
async fn depsfinder_wires_an_edge_and_orders_the_dependency_first() {
    let ruleset = ruleset();
    let a = Component::new("a", "ta", "c");

    let dag = depmake(&ruleset, vec![a.clone()], &[], true).unwrap();
    assert!(dag.contains("b#tb@c"));
    let deps = dag.dependencies(&a.id());
    assert_eq!(deps.len(), 1);
    assert_eq!(deps[0].component.id(), "b#tb@c");

    let instr = seqmake(&dag, Algorithm::Optimal).unwrap().unwrap();
    match &instr {
        Instruction::Seq(items) => {
            assert_eq!(items.len(), 2);
            match (&items[0], &items[1]) {
                (Instruction::Action(first), Instruction::Action(second)) => {
                    assert_eq!(first.id, "b#tb@c/Rb");
                    assert_eq!(second.id, "a#ta@c/Ra");
                }
                other => panic!("expected two actions, got {other:?}"),
            }
        }
        other => panic!("expected a SEQ, got {other:?}"),
    }

    let report = seqexec(&instr, ExecutionConfig::default()).await.unwrap();
    assert_eq!(report.rc, ActionRc::Ok);
}
