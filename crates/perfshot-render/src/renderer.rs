//! GraphRenderer - run the pipeline once and check what it produced.

use crate::pipeline::RenderPipeline;
use perfshot_common::{ShotError, ShotResult};
use perfshot_managed_process::{ExternalTool, ManagedProcess, ProcessIo};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{info, warn};

/// A flame graph written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedGraph {
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct GraphRenderer {
    pipeline: RenderPipeline,
    stage_timeout: Option<Duration>,
}

impl GraphRenderer {
    pub fn new(pipeline: RenderPipeline) -> Self {
        Self {
            pipeline,
            stage_timeout: None,
        }
    }

    /// Bound the wait for each stage; a stage still running is killed.
    pub fn with_stage_timeout(mut self, limit: Option<Duration>) -> Self {
        self.stage_timeout = limit;
        self
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Render `trace` into `output`.
    ///
    /// Every failure is a [`ShotError::Render`]: absent or empty trace, a
    /// stage that cannot start or exits unsuccessfully, an empty graph.
    pub async fn render(&self, trace: &Path, output: &Path) -> ShotResult<RenderedGraph> {
        check_trace(trace)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ShotError::render(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let sink = File::create(output)
            .map_err(|e| ShotError::render(format!("cannot create {}: {}", output.display(), e)))?;

        info!("Rendering {} -> {}", trace.display(), output.display());

        let script_args = vec!["-i".to_string(), trace.to_string_lossy().into_owned()];
        let mut script = spawn_stage(
            self.pipeline.script.as_ref(),
            &script_args,
            ProcessIo::quiet().with_stdout(Stdio::piped()),
        )?;
        let mut collapse = spawn_stage(
            self.pipeline.collapse.as_ref(),
            &[],
            ProcessIo::quiet()
                .with_stdin(pipe_from(&mut script)?)
                .with_stdout(Stdio::piped()),
        )?;
        let mut flamegraph = spawn_stage(
            self.pipeline.flamegraph.as_ref(),
            &[],
            ProcessIo::quiet()
                .with_stdin(pipe_from(&mut collapse)?)
                .with_stdout(sink),
        )?;

        let mut failure = None;
        for stage in [&mut script, &mut collapse, &mut flamegraph] {
            if let Err(e) = self.finish_stage(stage).await {
                warn!("{}", e);
                failure.get_or_insert(e);
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let size_bytes = std::fs::metadata(output)
            .map(|m| m.len())
            .map_err(|e| ShotError::render(format!("cannot read {}: {}", output.display(), e)))?;
        if size_bytes == 0 {
            return Err(ShotError::render(format!(
                "{} is empty after rendering",
                output.display()
            )));
        }

        info!("Flame graph written: {} ({} bytes)", output.display(), size_bytes);
        Ok(RenderedGraph {
            path: output.to_path_buf(),
            size_bytes,
        })
    }

    async fn finish_stage(&self, stage: &mut ManagedProcess) -> ShotResult<()> {
        let exit = match self.stage_timeout {
            None => stage.wait().await?,
            Some(limit) => match stage.wait_timeout(limit).await? {
                Some(exit) => exit,
                None => {
                    stage.kill()?;
                    stage.wait().await?;
                    return Err(ShotError::render(format!(
                        "{} stage still running after {:?}",
                        stage.label(),
                        limit
                    )));
                }
            },
        };

        if exit.success() {
            Ok(())
        } else {
            Err(ShotError::render(format!("{} stage failed: {}", stage.label(), exit)))
        }
    }
}

fn check_trace(trace: &Path) -> ShotResult<()> {
    match std::fs::metadata(trace) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(ShotError::render(format!("trace {} is empty", trace.display()))),
        Err(e) => Err(ShotError::render(format!(
            "trace {} is not readable: {}",
            trace.display(),
            e
        ))),
    }
}

fn spawn_stage(tool: &dyn ExternalTool, args: &[String], io: ProcessIo) -> ShotResult<ManagedProcess> {
    tool.spawn_with_io(args, io.with_stderr(Stdio::inherit()))
        .map_err(|e| ShotError::render(format!("{} stage could not start: {}", tool.name(), e)))
}

fn pipe_from(stage: &mut ManagedProcess) -> ShotResult<Stdio> {
    let stdout = stage
        .take_stdout()
        .ok_or_else(|| ShotError::render(format!("{} stage has no stdout pipe", stage.label())))?;
    stdout
        .try_into()
        .map_err(|e: std::io::Error| ShotError::render(format!("cannot chain {}: {}", stage.label(), e)))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use perfshot_managed_process::CommandTool;
    use perfshot_process::CommandLine;
    use std::sync::Arc;

    fn sh(name: &str, script: &str) -> Arc<dyn ExternalTool> {
        Arc::new(CommandTool::new(
            name,
            CommandLine::new("sh").args(["-c", script, "sh"]),
        ))
    }

    /// Dumps the trace (`$2` after `-i`), upper-cases it and wraps it.
    fn fake_pipeline() -> RenderPipeline {
        RenderPipeline::new(
            sh("script", "cat \"$2\""),
            sh("collapse", "tr a-z A-Z"),
            sh("flamegraph", "echo '<svg>'; cat; echo '</svg>'"),
        )
    }

    fn write_trace(dir: &Path, contents: &str) -> PathBuf {
        let trace = dir.join("perf.data");
        std::fs::write(&trace, contents).unwrap();
        trace
    }

    #[tokio::test]
    async fn test_pipeline_chains_stages() {
        let dir = tempfile::tempdir().unwrap();
        let trace = write_trace(dir.path(), "main;work 12\n");
        let output = dir.path().join("out").join("graph.svg");

        let graph = GraphRenderer::new(fake_pipeline())
            .render(&trace, &output)
            .await
            .unwrap();

        let svg = std::fs::read_to_string(&output).unwrap();
        assert_eq!(svg, "<svg>\nMAIN;WORK 12\n</svg>\n");
        assert_eq!(graph.path, output);
        assert_eq!(graph.size_bytes, svg.len() as u64);
    }

    #[tokio::test]
    async fn test_missing_trace_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("graph.svg");

        let err = GraphRenderer::new(fake_pipeline())
            .render(&dir.path().join("perf.data"), &output)
            .await
            .unwrap_err();
        assert!(matches!(err, ShotError::Render { .. }));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_empty_trace_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let trace = write_trace(dir.path(), "");

        let err = GraphRenderer::new(fake_pipeline())
            .render(&trace, &dir.path().join("graph.svg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"), "unexpected: {err}");
    }

    #[tokio::test]
    async fn test_failing_stage_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let trace = write_trace(dir.path(), "a 1\n");
        let mut pipeline = fake_pipeline();
        pipeline.collapse = sh("collapse", "cat > /dev/null; exit 3");

        let err = GraphRenderer::new(pipeline)
            .render(&trace, &dir.path().join("graph.svg"))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("collapse"), "unexpected: {message}");
        assert!(message.contains("exit code 3"), "unexpected: {message}");
    }

    #[tokio::test]
    async fn test_missing_stage_binary() {
        let dir = tempfile::tempdir().unwrap();
        let trace = write_trace(dir.path(), "a 1\n");
        let mut pipeline = fake_pipeline();
        pipeline.flamegraph = Arc::new(CommandTool::new(
            "flamegraph",
            CommandLine::new("/no/such/flamegraph.pl"),
        ));

        let err = GraphRenderer::new(pipeline)
            .render(&trace, &dir.path().join("graph.svg"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShotError::Render { .. }));
        assert!(err.to_string().contains("could not start"));
    }

    #[tokio::test]
    async fn test_empty_output_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let trace = write_trace(dir.path(), "a 1\n");
        let mut pipeline = fake_pipeline();
        pipeline.flamegraph = sh("flamegraph", "cat > /dev/null");

        let err = GraphRenderer::new(pipeline)
            .render(&trace, &dir.path().join("graph.svg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is empty after rendering"));
    }

    #[tokio::test]
    async fn test_stage_timeout_kills_stage() {
        let dir = tempfile::tempdir().unwrap();
        let trace = write_trace(dir.path(), "a 1\n");
        let mut pipeline = fake_pipeline();
        pipeline.flamegraph = sh("flamegraph", "cat > /dev/null; exec sleep 30");

        let err = GraphRenderer::new(pipeline)
            .with_stage_timeout(Some(Duration::from_millis(500)))
            .render(&trace, &dir.path().join("graph.svg"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("still running"), "unexpected: {err}");
    }
}
