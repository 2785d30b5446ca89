//! Action return codes, force modes, the `should_stop` propagation
//! policy and final return-code aggregation.

use serde::{Deserialize, Serialize};

/// An action's outcome. `Error` is deliberately open-ended: the wrapped
/// string is whatever label the process exit status or transport
/// failure produced (an exit code, a signal name, "spawn failed", ...).
/// It is never given numeric meaning inside the sequencer itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionRc {
    Ok,
    Warning,
    /// Distinguished code for an action that could not even be
    /// submitted (spawn failure, unreachable transport).
    Unexecuted,
    Error(String),
}

impl ActionRc {
    pub fn is_ok(&self) -> bool {
        matches!(self, ActionRc::Ok)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, ActionRc::Warning)
    }

    /// Anything that is neither `Ok` nor `Warning` belongs to the error
    /// set, including `Unexecuted`.
    pub fn is_error(&self) -> bool {
        matches!(self, ActionRc::Unexecuted | ActionRc::Error(_))
    }
}

/// Per-action policy governing whether a `Warning` from this action
/// blocks its successors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForceMode {
    #[default]
    Allowed,
    Always,
    Never,
}

impl std::str::FromStr for ForceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allowed" => Ok(ForceMode::Allowed),
            "always" => Ok(ForceMode::Always),
            "never" => Ok(ForceMode::Never),
            other => Err(format!("invalid force mode: {other}")),
        }
    }
}

/// Decide whether a close event should stop scheduling of this action's
/// successors.
pub fn should_stop(rc: &ActionRc, force_global: bool, force: ForceMode) -> bool {
    if rc.is_ok() {
        return false;
    }
    if !rc.is_warning() || force == ForceMode::Never {
        return true;
    }
    if force_global || force == ForceMode::Always {
        return false;
    }
    true
}

/// Aggregate the rcs of every *executed* action into the run's final
/// code: the first error code if any, else `Warning` if any action
/// warned, else `Ok`.
pub fn aggregate<'a>(rcs: impl IntoIterator<Item = &'a ActionRc>) -> ActionRc {
    let mut saw_warning = false;
    for rc in rcs {
        if rc.is_error() {
            return rc.clone();
        }
        if rc.is_warning() {
            saw_warning = true;
        }
    }
    if saw_warning {
        ActionRc::Warning
    } else {
        ActionRc::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_never_stops() {
        assert!(!should_stop(&ActionRc::Ok, false, ForceMode::Allowed));
        assert!(!should_stop(&ActionRc::Ok, true, ForceMode::Never));
    }

    #[test]
    fn error_always_stops() {
        assert!(should_stop(&ActionRc::Error("1".into()), true, ForceMode::Always));
        assert!(should_stop(&ActionRc::Unexecuted, true, ForceMode::Always));
    }

    #[test]
    fn warning_respects_force() {
        assert!(should_stop(&ActionRc::Warning, false, ForceMode::Allowed));
        assert!(!should_stop(&ActionRc::Warning, true, ForceMode::Allowed));
        assert!(!should_stop(&ActionRc::Warning, false, ForceMode::Always));
        assert!(should_stop(&ActionRc::Warning, true, ForceMode::Never));
    }

    #[test]
    fn aggregation_prefers_first_error() {
        let rcs = vec![ActionRc::Ok, ActionRc::Warning, ActionRc::Error("2".into())];
        assert_eq!(aggregate(&rcs), ActionRc::Error("2".into()));
        let rcs = vec![ActionRc::Ok, ActionRc::Warning];
        assert_eq!(aggregate(&rcs), ActionRc::Warning);
        let rcs = vec![ActionRc::Ok, ActionRc::Ok];
        assert_eq!(aggregate(&rcs), ActionRc::Ok);
    }
}
