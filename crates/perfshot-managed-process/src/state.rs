//! Lifecycle state of a managed child process.

use chrono::{DateTime, Utc};
use perfshot_common::{ShotError, ShotResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a managed child is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Spawned and not yet asked to stop.
    Running,
    /// A stop signal has been delivered; exit not observed yet.
    Stopping,
    /// Exit observed and status recorded. Terminal.
    Exited,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Running => write!(f, "running"),
            ProcessState::Stopping => write!(f, "stopping"),
            ProcessState::Exited => write!(f, "exited"),
        }
    }
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessState::Exited)
    }
}

/// A recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: ProcessState,
    pub to_state: ProcessState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Validates and records transitions for one child.
///
/// Exactly one terminal transition can happen; re-entering the current
/// state is accepted and ignored.
#[derive(Debug, Clone)]
pub struct ProcessStateMachine {
    label: String,
    current_state: ProcessState,
    history: Vec<StateTransition>,
}

impl ProcessStateMachine {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            current_state: ProcessState::Running,
            history: Vec::new(),
        }
    }

    pub fn current_state(&self) -> ProcessState {
        self.current_state
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    pub fn is_valid_transition(&self, target: ProcessState) -> bool {
        match (self.current_state, target) {
            (ProcessState::Running, ProcessState::Stopping) => true,
            (ProcessState::Running, ProcessState::Exited) => true,
            (ProcessState::Stopping, ProcessState::Exited) => true,
            (state, target) if state == target => true,
            _ => false,
        }
    }

    pub fn transition_to(&mut self, target: ProcessState, reason: Option<String>) -> ShotResult<()> {
        if !self.is_valid_transition(target) {
            return Err(ShotError::invalid_state(
                &self.label,
                self.current_state.to_string(),
                target.to_string(),
            ));
        }
        if self.current_state == target {
            return Ok(());
        }

        self.history.push(StateTransition {
            from_state: self.current_state,
            to_state: target,
            timestamp: Utc::now(),
            reason,
        });
        tracing::debug!(
            "Process {} transitioned from {} to {}",
            self.label,
            self.current_state,
            target
        );
        self.current_state = target;
        Ok(())
    }
}
