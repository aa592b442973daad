//! Run lifecycle.
//!
//! ```text
//! Idle -> TargetStarting -> ProfilerAttaching -> WarmingUp -> ShootingLoad
//!      -> ProfilerStopping -> TargetStopping -> CoolingDown -> Rendering -> Done
//! ```
//!
//! Failure edges only ever move forward into the teardown states:
//! `TargetStarting -> Failed` (nothing to tear down),
//! `ProfilerAttaching -> TargetStopping` (no profiler to stop),
//! `WarmingUp -> ProfilerStopping`, and `TargetStopping -> Failed` once a
//! failure has been recorded.

use chrono::{DateTime, Utc};
use perfshot_common::{ShotError, ShotResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    TargetStarting,
    ProfilerAttaching,
    WarmingUp,
    ShootingLoad,
    ProfilerStopping,
    TargetStopping,
    CoolingDown,
    Rendering,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::TargetStarting => "target_starting",
            RunState::ProfilerAttaching => "profiler_attaching",
            RunState::WarmingUp => "warming_up",
            RunState::ShootingLoad => "shooting_load",
            RunState::ProfilerStopping => "profiler_stopping",
            RunState::TargetStopping => "target_stopping",
            RunState::CoolingDown => "cooling_down",
            RunState::Rendering => "rendering",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTransition {
    pub from_state: RunState,
    pub to_state: RunState,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Enforces the run order and keeps the full transition history.
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    current_state: RunState,
    history: Vec<RunTransition>,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: RunState::Idle,
            history: Vec::new(),
        }
    }

    pub fn current_state(&self) -> RunState {
        self.current_state
    }

    pub fn history(&self) -> &[RunTransition] {
        &self.history
    }

    /// States entered so far, in order.
    pub fn visited(&self) -> Vec<RunState> {
        self.history.iter().map(|t| t.to_state).collect()
    }

    pub fn is_valid_transition(&self, target: RunState) -> bool {
        use crate::state::RunState::*;

        match (self.current_state, target) {
            // Happy path
            (Idle, TargetStarting) => true,
            (TargetStarting, ProfilerAttaching) => true,
            (ProfilerAttaching, WarmingUp) => true,
            (WarmingUp, ShootingLoad) => true,
            (ShootingLoad, ProfilerStopping) => true,
            (ProfilerStopping, TargetStopping) => true,
            (TargetStopping, CoolingDown) => true,
            (CoolingDown, Rendering) => true,
            (Rendering, Done) => true,

            // Teardown path
            (TargetStarting, Failed) => true,
            (ProfilerAttaching, TargetStopping) => true,
            (WarmingUp, ProfilerStopping) => true,
            (TargetStopping, Failed) => true,

            _ => false,
        }
    }

    pub fn transition_to(&mut self, target: RunState, reason: Option<String>) -> ShotResult<()> {
        if !self.is_valid_transition(target) {
            return Err(ShotError::invalid_state(
                "run",
                self.current_state.to_string(),
                target.to_string(),
            ));
        }

        let from = self.current_state;
        self.history.push(RunTransition {
            from_state: from,
            to_state: target,
            timestamp: Utc::now(),
            reason,
        });
        self.current_state = target;

        tracing::debug!("Run transitioned from {} to {}", from, target);
        Ok(())
    }
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RunState::*;

    const HAPPY_PATH: [RunState; 9] = [
        TargetStarting,
        ProfilerAttaching,
        WarmingUp,
        ShootingLoad,
        ProfilerStopping,
        TargetStopping,
        CoolingDown,
        Rendering,
        Done,
    ];

    #[test]
    fn test_happy_path_in_order() {
        let mut machine = RunStateMachine::new();
        for state in HAPPY_PATH {
            machine.transition_to(state, None).unwrap();
        }
        assert_eq!(machine.visited(), HAPPY_PATH);
        assert!(machine.current_state().is_terminal());
    }

    #[test]
    fn test_no_skipping() {
        let mut machine = RunStateMachine::new();
        machine.transition_to(TargetStarting, None).unwrap();

        let err = machine.transition_to(ShootingLoad, None).unwrap_err();
        assert!(matches!(err, ShotError::InvalidState { .. }));
        assert_eq!(machine.current_state(), TargetStarting);
        assert_eq!(machine.history().len(), 1);
    }

    #[test]
    fn test_attach_failure_goes_straight_to_target_stop() {
        let mut machine = RunStateMachine::new();
        machine.transition_to(TargetStarting, None).unwrap();
        machine.transition_to(ProfilerAttaching, None).unwrap();
        machine
            .transition_to(TargetStopping, Some("attach failed".into()))
            .unwrap();
        machine.transition_to(Failed, None).unwrap();

        assert!(!machine.is_valid_transition(Rendering));
        assert_eq!(
            machine.history()[2].reason.as_deref(),
            Some("attach failed")
        );
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut machine = RunStateMachine::new();
        machine.transition_to(TargetStarting, None).unwrap();
        machine.transition_to(Failed, None).unwrap();

        for state in HAPPY_PATH {
            assert!(!machine.is_valid_transition(state));
        }
        assert!(!machine.is_valid_transition(Failed));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ShootingLoad.to_string(), "shooting_load");
        assert_eq!(
            serde_json::to_string(&ProfilerStopping).unwrap(),
            "\"profiler_stopping\""
        );
    }
}
