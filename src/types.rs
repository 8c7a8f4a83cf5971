use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle stage of a single stack within a run.
///
/// The only legal path is `pending -> running -> {ok | failed | canceled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Pending,
    Running,
    Ok,
    Failed,
    Canceled,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 5] = [
        LifecycleState::Pending,
        LifecycleState::Running,
        LifecycleState::Ok,
        LifecycleState::Failed,
        LifecycleState::Canceled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Running => "running",
            LifecycleState::Ok => "ok",
            LifecycleState::Failed => "failed",
            LifecycleState::Canceled => "canceled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LifecycleState::Ok | LifecycleState::Failed | LifecycleState::Canceled
        )
    }

    /// Whether `self -> next` is an edge of the transition graph.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        matches!(
            (self, next),
            (LifecycleState::Pending, LifecycleState::Running)
                | (
                    LifecycleState::Running,
                    LifecycleState::Ok | LifecycleState::Failed | LifecycleState::Canceled
                )
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(LifecycleState::Pending),
            "running" => Ok(LifecycleState::Running),
            "ok" => Ok(LifecycleState::Ok),
            "failed" => Ok(LifecycleState::Failed),
            "canceled" | "cancelled" => Ok(LifecycleState::Canceled),
            other => Err(format!("invalid lifecycle state: {other}")),
        }
    }
}

/// What the orchestrator does with the remaining stacks once one fails.
///
/// - `Abort` (default): stop the run; stacks not yet started stay `pending`.
/// - `Continue`: keep going and run every selected stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Abort,
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!(
                "invalid on_stack_failure: {other} (expected \"abort\" or \"continue\")"
            )),
        }
    }
}

/// How a persistent failure to deliver a lifecycle event affects the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFailureMode {
    /// Log the failure; the exit code reflects only the stacks' own results.
    #[default]
    Warn,
    /// Treat undelivered events as a run failure (exit code 1).
    Fail,
}

impl FromStr for ReportFailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(ReportFailureMode::Warn),
            "fail" => Ok(ReportFailureMode::Fail),
            other => Err(format!(
                "invalid on_report_failure: {other} (expected \"warn\" or \"fail\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_round_trip_through_from_str() {
        for state in LifecycleState::ALL {
            assert_eq!(state.as_str().parse::<LifecycleState>(), Ok(state));
        }
        assert!("done".parse::<LifecycleState>().is_err());
    }

    #[test]
    fn only_running_may_reach_a_terminal_state() {
        use LifecycleState::*;
        assert!(Pending.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Ok));
        assert!(Running.can_transition_to(Canceled));
        assert!(!Ok.can_transition_to(Failed));
        assert!(!Canceled.can_transition_to(Canceled));
    }

    #[test]
    fn states_serialize_as_lowercase_names() {
        let json = serde_json::to_string(&vec![LifecycleState::Pending, LifecycleState::Canceled])
            .unwrap();
        assert_eq!(json, r#"["pending","canceled"]"#);
    }
}
