//! Rule with `filter = %name =~ ^foo`. Inputs `foo1#t@c` and `bar#t@c`.
//! Expect: only `foo1#t@c` receives the action attribute.

use sequencer::depmake;
use sequencer_core::{Component, Filter, FullType, Rule, RuleSet};

fn ruleset() -> RuleSet {
    let r = Rule {
        ruleset: "s5".into(),
        name: "R".into(),
        types: vec![FullType::new("t", "c")],
        filter: Filter::parse("%name =~ ^foo").unwrap(),
        action: Some("true".into()),
        depsfinder: None,
        dependson: vec![],
        comments: None,
        help: None,
    };
    RuleSet::new("s5", vec![r]).unwrap()
}

#[tokio::test]
async fn regex_filter_only_matches_the_named_component() {
    let ruleset = ruleset();
    let matching = Component::new("foo1", "t", "c");
    let other = Component::new("bar", "t", "c");

    let dag = depmake(&ruleset, vec![matching.clone(), other.clone()], &[], true).unwrap();

    let matched = dag.node(&matching.id()).unwrap();
    assert_eq!(matched.attributes, vec![("R".to_string(), "true".to_string())]);

    let unmatched = dag.node(&other.id()).unwrap();
    assert!(unmatched.attributes.is_empty());
}
