//! Runs a single action's command, local or remote. Local actions are
//! spawned directly (`tokio::process::Command`); remote actions are
//! fanned out over `ssh`, one connection per node in `component_set`,
//! multiplexed through a shared `ControlMaster` socket so N remote
//! actions against the same host reuse one TCP/SSH session instead of
//! paying a fresh handshake each time.

use sequencer_core::ActionRc;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::warn;

/// Per-node fanout target list. A bare `component_set` is used as the
/// local action's description only; the actual process runs once.
/// Remote actions run once per entry in `nodes`.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub control_path_dir: PathBuf,
    pub ssh_options: Vec<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            control_path_dir: std::env::temp_dir().join("sequencer-ssh"),
            ssh_options: vec![
                "-o".into(),
                "ControlMaster=auto".into(),
                "-o".into(),
                "ControlPersist=60".into(),
            ],
        }
    }
}

pub struct ActionOutcome {
    pub rc: ActionRc,
    pub stdout: String,
    pub stderr: String,
}

pub async fn run_local(command: &str) -> ActionOutcome {
    match Command::new("sh").arg("-c").arg(command).output().await {
        Ok(output) => outcome_from(output.status.code(), output.stdout, output.stderr),
        Err(e) => {
            warn!(error = %e, command, "failed to spawn local action");
            ActionOutcome {
                rc: ActionRc::Unexecuted,
                stdout: String::new(),
                stderr: e.to_string(),
            }
        }
    }
}

pub async fn run_remote(command: &str, node: &str, config: &RemoteConfig) -> ActionOutcome {
    let control_path = config.control_path_dir.join(format!("{node}.sock"));
    let mut ssh = Command::new("ssh");
    ssh.args(&config.ssh_options);
    ssh.arg("-o").arg(format!("ControlPath={}", control_path.display()));
    ssh.arg(node).arg(command);
    match ssh.output().await {
        Ok(output) => outcome_from(output.status.code(), output.stdout, output.stderr),
        Err(e) => {
            warn!(error = %e, command, node, "failed to spawn remote action");
            ActionOutcome {
                rc: ActionRc::Unexecuted,
                stdout: String::new(),
                stderr: e.to_string(),
            }
        }
    }
}

/// `sysexits.h`'s `EX_TEMPFAIL` (75), reused as the action-level
/// convention for "warning, not failure" exit status.
const EX_TEMPFAIL: i32 = 75;

fn outcome_from(code: Option<i32>, stdout: Vec<u8>, stderr: Vec<u8>) -> ActionOutcome {
    let rc = match code {
        Some(0) => ActionRc::Ok,
        Some(EX_TEMPFAIL) => ActionRc::Warning,
        Some(n) => ActionRc::Error(n.to_string()),
        None => ActionRc::Error("terminated by signal".to_string()),
    };
    ActionOutcome {
        rc,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    }
}

/// `component_set` parsed into the node list a remote action fans out
/// to: a comma-separated list, matching the wire format actions carry
/// their target set in.
pub fn nodes_from(component_set: &str) -> Vec<String> {
    component_set.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_separated_node_list() {
        assert_eq!(nodes_from("n1,n2, n3"), vec!["n1", "n2", "n3"]);
    }

    #[tokio::test]
    async fn local_action_success_yields_ok() {
        let outcome = run_local("true").await;
        assert_eq!(outcome.rc, ActionRc::Ok);
    }

    #[tokio::test]
    async fn local_action_failure_yields_error_with_exit_code() {
        let outcome = run_local("exit 3").await;
        assert_eq!(outcome.rc, ActionRc::Error("3".to_string()));
    }

    #[tokio::test]
    async fn local_action_ex_tempfail_yields_warning() {
        let outcome = run_local("exit 75").await;
        assert_eq!(outcome.rc, ActionRc::Warning);
    }
}
