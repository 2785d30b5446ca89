//! The ISE coordinator: a single task owns all scheduling state, no
//! shared mutable state behind a lock; actions run as separate tokio
//! tasks bounded by a fanout semaphore, reporting back over a channel.

use crate::error::IseResult;
use crate::flatten::ExecGraph;
use crate::transport::{self, RemoteConfig};
use chrono::{DateTime, Utc};
use hashbrown::{HashMap, HashSet};
use sequencer_core::{aggregate, should_stop, ActionRc};
use sequencer_ism::Instruction;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Global force flag: when true, a `Warning` never stops scheduling
    /// regardless of the action's own force mode.
    pub force: bool,
    pub fanout: usize,
    pub progress_interval: Option<Duration>,
    pub remote: RemoteConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            force: false,
            fanout: 64,
            progress_interval: None,
            remote: RemoteConfig::default(),
        }
    }
}

/// One scheduled action's full lifecycle: when it was queued, started,
/// and finished, its return code, and the output it produced.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub submitted_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub rc: ActionRc,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub records: HashMap<String, ActionRecord>,
    pub errors: HashSet<String>,
    pub best_fanout: usize,
    pub rc: ActionRc,
}

enum Event {
    Completed(String, ActionRecord),
    Tick,
}

/// Execute every action reachable in `instr`, in dependency order,
/// bounded by `config.fanout` concurrent actions.
pub async fn execute(instr: &Instruction, config: ExecutionConfig) -> IseResult<ExecutionReport> {
    let graph = ExecGraph::from_instruction(instr)?;
    let total = graph.actions.len();
    let start_time: DateTime<Utc> = Utc::now();

    let (tx, mut rx) = mpsc::channel(total.max(1));
    let semaphore = std::sync::Arc::new(Semaphore::new(config.fanout.max(1)));

    let mut executed: HashMap<String, ActionRecord> = HashMap::new();
    let mut errors: HashSet<String> = HashSet::new();
    let mut queued: HashSet<String> = HashSet::new();
    let mut pending: VecDeque<String> = VecDeque::new();
    let mut running: usize = 0;
    let mut best_fanout: usize = 0;

    let is_ready = |id: &str, executed: &HashMap<String, ActionRecord>, errors: &HashSet<String>| {
        graph.all_deps(id).all(|dep| executed.contains_key(dep) && !errors.contains(dep))
    };

    for id in graph.actions.keys() {
        if is_ready(id, &executed, &errors) && queued.insert(id.clone()) {
            pending.push_back(id.clone());
        }
    }
    drain(&graph, &mut pending, &semaphore, &tx, &config.remote, &mut running, &mut best_fanout);

    let mut ticker = config.progress_interval.map(tokio::time::interval);

    loop {
        let event = if let Some(ticker) = ticker.as_mut() {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some((id, rc)) => Event::Completed(id, rc),
                    None => break,
                },
                _ = ticker.tick() => Event::Tick,
            }
        } else {
            match rx.recv().await {
                Some((id, rc)) => Event::Completed(id, rc),
                None => break,
            }
        };

        match event {
            Event::Tick => {
                report_progress(start_time, total, executed.len(), errors.len(), running, config.fanout);
            }
            Event::Completed(id, record) => {
                running -= 1;
                let force = graph.actions.get(&id).map(|a| a.force).unwrap_or_default();
                let rc = record.rc.clone();
                executed.insert(id.clone(), record);
                if should_stop(&rc, config.force, force) {
                    error!(action = %id, rc = ?rc, "action stopped its dependents");
                    errors.insert(id.clone());
                } else {
                    for dep_id in graph.dependents_of(&id) {
                        if is_ready(dep_id, &executed, &errors) && queued.insert(dep_id.clone()) {
                            pending.push_back(dep_id.clone());
                        }
                    }
                }
                drain(&graph, &mut pending, &semaphore, &tx, &config.remote, &mut running, &mut best_fanout);
                if running == 0 && pending.is_empty() {
                    break;
                }
            }
        }
    }

    let rc = aggregate(executed.values().map(|r| &r.rc));
    info!(executed = executed.len(), errors = errors.len(), ?rc, "execution finished");
    Ok(ExecutionReport {
        records: executed,
        errors,
        best_fanout,
        rc,
    })
}

/// Pull as many ready actions off `pending` as the fanout semaphore
/// allows right now, spawning one task per action. Non-blocking: if no
/// permit is free, leaves the rest queued for the next drain.
fn drain(
    graph: &ExecGraph,
    pending: &mut VecDeque<String>,
    semaphore: &std::sync::Arc<Semaphore>,
    tx: &mpsc::Sender<(String, ActionRecord)>,
    remote: &RemoteConfig,
    running: &mut usize,
    best_fanout: &mut usize,
) {
    while let Some(id) = pending.front() {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let id = pending.pop_front().unwrap();
        let action = graph.actions.get(&id).cloned();
        let Some(action) = action else {
            continue;
        };
        *running += 1;
        *best_fanout = (*best_fanout).max(*running);
        let tx = tx.clone();
        let remote = remote.clone();
        let submitted_at = Utc::now();
        tokio::spawn(async move {
            let _permit = permit;
            let started_at = Utc::now();
            info!(action = %action.id, command = %action.command, "executing action");
            let (rc, stdout, stderr) = if action.remote {
                let nodes = transport::nodes_from(&action.component_set);
                if nodes.is_empty() {
                    (ActionRc::Unexecuted, String::new(), String::new())
                } else {
                    let mut outcomes = Vec::with_capacity(nodes.len());
                    let mut stdout = String::new();
                    let mut stderr = String::new();
                    for node in &nodes {
                        let outcome = transport::run_remote(&action.command, node, &remote).await;
                        stdout.push_str(&format!("{node}: {}\n", outcome.stdout));
                        stderr.push_str(&format!("{node}: {}\n", outcome.stderr));
                        outcomes.push(outcome.rc);
                    }
                    (aggregate(&outcomes), stdout, stderr)
                }
            } else {
                let outcome = transport::run_local(&action.command).await;
                (outcome.rc, outcome.stdout, outcome.stderr)
            };
            let record = ActionRecord {
                submitted_at,
                started_at,
                ended_at: Utc::now(),
                rc,
                stdout,
                stderr,
            };
            let _ = tx.send((action.id, record)).await;
        });
    }
}

fn report_progress(start_time: DateTime<Utc>, total: usize, done: usize, errors: usize, running: usize, fanout: usize) {
    let elapsed = Utc::now().signed_duration_since(start_time);
    let done_pct = if total == 0 { 100.0 } else { done as f64 / total as f64 * 100.0 };
    let errors_pct = if total == 0 { 0.0 } else { errors as f64 / total as f64 * 100.0 };
    let pending_pct = if fanout == 0 { 0.0 } else { running as f64 / fanout as f64 * 100.0 };
    info!(
        elapsed_ms = elapsed.num_milliseconds(),
        done,
        total,
        done_pct,
        errors,
        errors_pct,
        running,
        pending_pct,
        "progress"
    );
}
