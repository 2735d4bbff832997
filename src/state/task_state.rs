/// Task state definitions for tracking crawl progress
///
/// Every crawl task walks the same small state machine:
/// `Pending -> InFlight -> (Succeeded | Retrying -> InFlight | Failed | Skipped)`.
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Represents the current state of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task is queued and waiting for a worker
    Pending,

    /// Task is currently being fetched
    InFlight,

    /// A transient failure occurred and the task is backing off
    Retrying,

    // ===== Terminal States =====
    /// Page was fetched and processed
    Succeeded,

    /// Page could not be fetched (permanent error or retries exhausted)
    Failed,

    /// Page was never fetched (robots exclusion, duplicate, budget, cancellation)
    Skipped,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Returns true if the task may legally move from this state to `next`
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, InFlight)
                | (Pending, Skipped)
                | (InFlight, Succeeded)
                | (InFlight, Retrying)
                | (InFlight, Failed)
                | (InFlight, Skipped)
                | (Retrying, InFlight)
                | (Retrying, Failed)
                | (Retrying, Skipped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Returns all possible task states
    #[cfg(test)]
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::InFlight,
            Self::Retrying,
            Self::Succeeded,
            Self::Failed,
            Self::Skipped,
        ]
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Attempted move between two states the machine does not connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal task transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TaskState,
    pub to: TaskState,
}

/// Drives one task through its states and counts fetch attempts
#[derive(Debug, Clone)]
pub struct TaskLifecycle {
    state: TaskState,
    attempts: u32,
    last_backoff: Option<Duration>,
}

impl TaskLifecycle {
    pub fn new() -> Self {
        Self {
            state: TaskState::Pending,
            attempts: 0,
            last_backoff: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Number of times the task has entered `InFlight`
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Backoff chosen for the most recent retry, if any
    pub fn last_backoff(&self) -> Option<Duration> {
        self.last_backoff
    }

    fn transition(&mut self, to: TaskState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Begins a fetch attempt
    pub fn start_attempt(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TaskState::InFlight)?;
        self.attempts += 1;
        Ok(())
    }

    /// Records a transient failure and the backoff before the next attempt
    pub fn schedule_retry(&mut self, backoff: Duration) -> Result<(), InvalidTransition> {
        self.transition(TaskState::Retrying)?;
        self.last_backoff = Some(backoff);
        Ok(())
    }

    pub fn succeed(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TaskState::Succeeded)
    }

    pub fn fail(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TaskState::Failed)
    }

    pub fn skip(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TaskState::Skipped)
    }
}

impl Default for TaskLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
