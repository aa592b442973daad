//! Orchestrator - one profiling run, start to finish.
//!
//! The run is strictly sequential. Each child process is owned by the scope
//! that started it, so leaving [`Orchestrator::run`] early (an error, or the
//! future being dropped on Ctrl-C) still signals whatever is running: the
//! target gets SIGTERM, the profiler SIGINT.

use crate::config::PerfshotConfig;
use crate::report::{RecordedFailure, RunReport};
use crate::state::{RunState, RunStateMachine};
use chrono::Utc;
use perfshot_common::{ShotError, ShotResult};
use perfshot_load::{HttpIssuer, LoadConfig, LoadScheduler, RequestIssuer};
use perfshot_managed_process::{CommandTool, ExternalTool, ManagedProcess};
use perfshot_process::CommandLine;
use perfshot_profiler::{ProfilerSession, ProfilerTool};
use perfshot_render::GraphRenderer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};


/// At most one run per process; later callers queue behind it.
static RUN_LOCK: Mutex<()> = Mutex::const_new(());

/// Timings and paths for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub trace_path: PathBuf,
    pub graph_path: PathBuf,
    pub settle: Duration,
    pub warmup: Duration,
    pub profiler_stop_timeout: Duration,
    pub target_stop_timeout: Duration,
    pub teardown_cooldown: Duration,
    pub inherit_target_output: bool,
}

impl RunSettings {
    pub fn from_config(config: &PerfshotConfig) -> Self {
        Self {
            trace_path: config.profiler.output.clone(),
            graph_path: config.render.output.clone(),
            settle: config.profiler.settle,
            warmup: config.load.warmup,
            profiler_stop_timeout: config.profiler.stop_timeout,
            target_stop_timeout: config.target.stop_timeout,
            teardown_cooldown: config.teardown.cooldown,
            inherit_target_output: config.target.inherit_output,
        }
    }
}

pub struct Orchestrator {
    target: CommandLine,
    load: LoadConfig,
    settings: RunSettings,
    profiler: Arc<dyn ProfilerTool>,
    issuer: Arc<dyn RequestIssuer>,
    renderer: GraphRenderer,
}

impl Orchestrator {
    /// `perf record`, HTTP requests and the FlameGraph pipeline, as
    /// configured.
    pub fn from_config(target: CommandLine, config: &PerfshotConfig) -> ShotResult<Self> {
        let renderer = GraphRenderer::new(config.render_pipeline()?)
            .with_stage_timeout(Some(config.render.stage_timeout));

        Ok(Self {
            target,
            load: config.load_config()?,
            settings: RunSettings::from_config(config),
            profiler: Arc::new(config.perf_record()?),
            issuer: Arc::new(HttpIssuer::new(config.load.request_timeout)),
            renderer,
        })
    }

    pub fn with_profiler(mut self, profiler: Arc<dyn ProfilerTool>) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_issuer(mut self, issuer: Arc<dyn RequestIssuer>) -> Self {
        self.issuer = issuer;
        self
    }

    pub fn with_renderer(mut self, renderer: GraphRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn target(&self) -> &CommandLine {
        &self.target
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn load_config(&self) -> &LoadConfig {
        &self.load
    }

    /// Endpoint indices the load phase will select, without running anything.
    pub fn plan(&self) -> ShotResult<Vec<usize>> {
        Ok(LoadScheduler::new(self.load.clone())?.plan())
    }

    /// Drive one run to `Done` or `Failed`.
    ///
    /// Never returns early with an error: every failure is recorded in the
    /// report together with the state it happened in, and teardown runs for
    /// everything already started.
    pub async fn run(&self) -> RunReport {
        let _guard = RUN_LOCK.lock().await;
        let mut run = RunContext::new(self.target.to_string());
        info!("Starting profiling run: {}", self.target);

        run.enter(RunState::TargetStarting, None);
        let mut target = match self.start_target() {
            Ok(target) => target,
            Err(e) => {
                error!("Target could not be started: {}", e);
                run.record(e);
                run.enter(RunState::Failed, Some("target could not be started"));
                return run.finish();
            }
        };
        run.report.target_pid = Some(target.pid());
        let mut target_exit_reported = false;

        run.enter(RunState::ProfilerAttaching, None);
        match ProfilerSession::attach(
            self.profiler.as_ref(),
            target.pid(),
            &self.settings.trace_path,
            self.settings.settle,
        )
        .await
        {
            Ok(mut session) => {
                run.report.profiler_pid = session.profiler_pid();

                run.enter(RunState::WarmingUp, None);
                tokio::time::sleep(self.settings.warmup).await;

                match target.try_status() {
                    Ok(None) => {
                        run.enter(RunState::ShootingLoad, None);
                        match LoadScheduler::new(self.load.clone()) {
                            Ok(scheduler) => {
                                let load = scheduler.run(self.issuer.as_ref()).await;
                                info!("Shooting complete");
                                run.report.load = Some(load);
                            }
                            Err(e) => run.record(e),
                        }
                        run.enter(RunState::ProfilerStopping, None);
                    }
                    Ok(Some(exit)) => {
                        warn!("Target exited during warm-up: {}", exit);
                        run.record(ShotError::no_such_process(target.label(), target.pid()));
                        target_exit_reported = true;
                        run.enter(RunState::ProfilerStopping, Some("target exited during warm-up"));
                    }
                    Err(e) => {
                        run.record(e);
                        run.enter(RunState::ProfilerStopping, Some("target status unknown"));
                    }
                }

                if let Err(e) = session.stop(Some(self.settings.profiler_stop_timeout)).await {
                    run.record(e);
                }
                run.report.trace = session.trace().cloned();
                run.enter(RunState::TargetStopping, None);
            }
            Err(e) => {
                error!("Profiler could not attach: {}", e);
                run.record(e);
                run.enter(RunState::TargetStopping, Some("profiler could not attach"));
            }
        }

        match self.stop_target(&mut target).await {
            Ok(()) => {}
            Err(e) if e.is_no_such_process() && target_exit_reported => {}
            Err(e) => run.record(e),
        }
        drop(target);

        if run.has_failures() {
            run.enter(RunState::Failed, Some("teardown complete after failure"));
            return run.finish();
        }

        run.enter(RunState::CoolingDown, None);
        tokio::time::sleep(self.settings.teardown_cooldown).await;

        run.enter(RunState::Rendering, None);
        match self
            .renderer
            .render(&self.settings.trace_path, &self.settings.graph_path)
            .await
        {
            Ok(graph) => run.report.graph = Some(graph),
            Err(e) => run.record(e),
        }

        run.enter(RunState::Done, None);
        run.finish()
    }

    fn start_target(&self) -> ShotResult<ManagedProcess> {
        perfshot_process::validate_executable(&self.target)?;

        CommandTool::new("target", self.target.clone())
            .with_inherited_output(self.settings.inherit_target_output)
            .spawn(&[])
    }

    /// SIGTERM, bounded wait, then SIGKILL. A target that is already gone
    /// is reported as [`ShotError::NoSuchProcess`].
    async fn stop_target(&self, target: &mut ManagedProcess) -> ShotResult<()> {
        if let Some(exit) = target.try_status()? {
            warn!("Target (PID {}) had already exited: {}", target.pid(), exit);
            return Err(ShotError::no_such_process(target.label(), target.pid()));
        }

        target.terminate()?;
        let limit = self.settings.target_stop_timeout;
        if target.wait_timeout(limit).await?.is_none() {
            warn!(
                "Target (PID {}) still running {:?} after SIGTERM, force killing",
                target.pid(),
                limit
            );
            target.kill()?;
            target.wait().await?;
        }
        Ok(())
    }
}

/// State machine plus the report being filled in.
struct RunContext {
    machine: RunStateMachine,
    report: RunReport,
}

impl RunContext {
    fn new(target: String) -> Self {
        Self {
            machine: RunStateMachine::new(),
            report: RunReport::new(target),
        }
    }

    fn enter(&mut self, state: RunState, reason: Option<&str>) {
        info!("Run state: {}", state);
        if let Err(e) = self.machine.transition_to(state, reason.map(str::to_string)) {
            error!("{}", e);
            self.record(e);
        }
    }

    fn record(&mut self, error: ShotError) {
        let state = self.machine.current_state();
        warn!("Failure during {}: {}", state, error);
        self.report.failures.push(RecordedFailure { state, error });
    }

    fn has_failures(&self) -> bool {
        !self.report.failures.is_empty()
    }

    fn finish(mut self) -> RunReport {
        self.report.final_state = self.machine.current_state();
        self.report.history = self.machine.history().to_vec();
        self.report.finished_at = Utc::now();

        if self.report.succeeded() {
            info!("Run finished: {}", self.report.final_state);
        } else {
            warn!(
                "Run finished: {} with {} failure(s)",
                self.report.final_state,
                self.report.failures.len()
            );
        }
        self.report
    }
}
