//! What a run did, for humans and for `--report` JSON.

use crate::state::{RunState, RunTransition};
use chrono::{DateTime, Utc};
use perfshot_common::ShotError;
use perfshot_load::LoadReport;
use perfshot_profiler::TraceFile;
use perfshot_render::RenderedGraph;
use serde::Serialize;

/// A failure and the state the run was in when it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedFailure {
    pub state: RunState,
    pub error: ShotError,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiler_pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub final_state: RunState,
    pub history: Vec<RunTransition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<RenderedGraph>,
    pub failures: Vec<RecordedFailure>,
}

impl RunReport {
    pub fn new(target: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            target: target.into(),
            target_pid: None,
            profiler_pid: None,
            started_at: now,
            finished_at: now,
            final_state: RunState::Idle,
            history: Vec::new(),
            load: None,
            trace: None,
            graph: None,
            failures: Vec::new(),
        }
    }

    /// Reached `Done` with nothing recorded.
    pub fn succeeded(&self) -> bool {
        self.final_state == RunState::Done && self.failures.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }

    /// The states the run passed through, in order.
    pub fn states(&self) -> Vec<RunState> {
        self.history.iter().map(|t| t.to_state).collect()
    }

    pub fn failure_kinds(&self) -> Vec<&'static str> {
        self.failures.iter().map(|f| f.error.kind()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lone_render_error_is_still_a_failed_exit() {
        let mut report = RunReport::new("./server");
        report.final_state = RunState::Done;
        assert_eq!(report.exit_code(), 0);

        report.failures.push(RecordedFailure {
            state: RunState::Rendering,
            error: ShotError::render("trace perf.data is not readable"),
        });
        assert!(!report.succeeded());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failure_kinds(), ["render"]);
    }

    #[test]
    fn test_report_serializes_failures_with_kind() {
        let mut report = RunReport::new("./server --port 8080");
        report.final_state = RunState::Failed;
        report.failures.push(RecordedFailure {
            state: RunState::ProfilerAttaching,
            error: ShotError::profiler_attach(42, "perf exited during settle time"),
        });

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert_eq!(json["final_state"], "failed");
        assert_eq!(json["failures"][0]["state"], "profiler_attaching");
        assert_eq!(json["failures"][0]["error"]["kind"], "profiler_attach");
        assert_eq!(json["failures"][0]["error"]["target_pid"], 42);
        assert!(json.get("graph").is_none());
    }
}
