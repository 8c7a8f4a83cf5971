// src/lifecycle/mod.rs

//! Per-stack lifecycle state machine.
//!
//! A [`StackLifecycle`] starts out empty (the stack is not part of the run
//! yet) and then only accepts the edges of
//! `pending -> running -> {ok | failed | canceled}`. Every accepted edge is
//! timestamped, appended to the history and handed back as a [`Transition`];
//! the orchestrator forwards that value to the event sink. Nothing in here
//! talks to the network.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use crate::types::LifecycleState;

/// Rejected transition. Reaching this means the orchestrator drove the
/// machine wrongly; no user input can produce it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("illegal lifecycle transition for stack '{stack}': {from} -> {to}")]
    IllegalTransition {
        stack: String,
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("stack '{stack}' must enter pending before {to}")]
    NotQueued { stack: String, to: LifecycleState },
}

/// One accepted state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Stack name the transition belongs to.
    pub stack: String,
    pub state: LifecycleState,
    /// Zero-based index of this transition in the stack's history.
    pub position: usize,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StackLifecycle {
    stack: String,
    history: Vec<Transition>,
}

impl StackLifecycle {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            history: Vec::new(),
        }
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    /// Current state, or `None` before the stack entered `pending`.
    pub fn current(&self) -> Option<LifecycleState> {
        self.history.last().map(|t| t.state)
    }

    pub fn is_terminal(&self) -> bool {
        self.current().is_some_and(LifecycleState::is_terminal)
    }

    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// States in the order they were entered.
    pub fn states(&self) -> Vec<LifecycleState> {
        self.history.iter().map(|t| t.state).collect()
    }

    pub fn transition(&mut self, next: LifecycleState) -> Result<Transition, LifecycleError> {
        match self.current() {
            None if next == LifecycleState::Pending => {}
            None => {
                return Err(LifecycleError::NotQueued {
                    stack: self.stack.clone(),
                    to: next,
                });
            }
            Some(from) if from.can_transition_to(next) => {}
            Some(from) => {
                return Err(LifecycleError::IllegalTransition {
                    stack: self.stack.clone(),
                    from,
                    to: next,
                });
            }
        }

        let transition = Transition {
            stack: self.stack.clone(),
            state: next,
            position: self.history.len(),
            at: Utc::now(),
        };
        debug!(stack = %self.stack, state = %next, position = transition.position, "lifecycle transition");
        self.history.push(transition.clone());
        Ok(transition)
    }
}

/// Check that `states` could have been produced by a [`StackLifecycle`],
/// i.e. it is a prefix of a legal path through the graph.
pub fn validate_sequence(stack: &str, states: &[LifecycleState]) -> Result<(), LifecycleError> {
    let mut lifecycle = StackLifecycle::new(stack);
    for state in states {
        lifecycle.transition(*state)?;
    }
    Ok(())
}
