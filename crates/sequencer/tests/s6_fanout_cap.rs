//! 100 independent actions, fanout = 8. Expect: no more than 8 run
//! concurrently (`best_fanout <= fanout`), and wall time reflects the
//! cap rather than running everything at once.

use sequencer::{seqexec, ExecutionConfig, Instruction};
use sequencer_core::{ActionRc, ForceMode};
use sequencer_ism::Action;
use std::time::Instant;

fn independent_actions(n: usize) -> Instruction {
    let actions = (0..n)
        .map(|i| {
            Instruction::Action(Action {
                id: format!("a{i}"),
                command: "sleep 0.05".into(),
                component_set: "c".into(),
                remote: false,
                force: ForceMode::Allowed,
                deps: vec![],
            })
        })
        .collect();
    Instruction::Par(actions)
}

#[tokio::test]
async fn fanout_caps_concurrency_and_stretches_wall_time() {
    let tree = independent_actions(100);
    let config = ExecutionConfig { fanout: 8, ..ExecutionConfig::default() };

    let start = Instant::now();
    let report = seqexec(&tree, config).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.rc, ActionRc::Ok);
    assert_eq!(report.records.len(), 100);
    assert!(report.best_fanout <= 8, "best_fanout was {}", report.best_fanout);
    // 100 actions / fanout 8 = 13 batches of ~0.05s each; running them
    // all at once would finish in well under a single batch's time.
    assert!(elapsed.as_secs_f64() > 0.3, "elapsed was {:?}, looks unthrottled", elapsed);
}
