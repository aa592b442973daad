//! The three external tools a render runs.

use perfshot_common::ShotResult;
use perfshot_managed_process::{CommandTool, ExternalTool};
use std::sync::Arc;

pub const DEFAULT_SCRIPT: &str = "perf script";
pub const DEFAULT_COLLAPSE: &str = "./FlameGraph/stackcollapse-perf.pl";
pub const DEFAULT_FLAMEGRAPH: &str = "./FlameGraph/flamegraph.pl";

/// Sample dump, stack collapse and graph drawing, in that order.
///
/// The script stage receives `-i <trace>`; the other two get no arguments
/// and talk only through stdin/stdout.
#[derive(Clone)]
pub struct RenderPipeline {
    pub script: Arc<dyn ExternalTool>,
    pub collapse: Arc<dyn ExternalTool>,
    pub flamegraph: Arc<dyn ExternalTool>,
}

impl RenderPipeline {
    pub fn new(
        script: Arc<dyn ExternalTool>,
        collapse: Arc<dyn ExternalTool>,
        flamegraph: Arc<dyn ExternalTool>,
    ) -> Self {
        Self {
            script,
            collapse,
            flamegraph,
        }
    }

    /// Build from three shell-word command strings.
    pub fn parse(script: &str, collapse: &str, flamegraph: &str) -> ShotResult<Self> {
        Ok(Self::new(
            Arc::new(CommandTool::parse("script", script)?),
            Arc::new(CommandTool::parse("collapse", collapse)?),
            Arc::new(CommandTool::parse("flamegraph", flamegraph)?),
        ))
    }

    /// `perf script` feeding Brendan Gregg's FlameGraph scripts from
    /// `./FlameGraph`.
    pub fn perf_default() -> ShotResult<Self> {
        Self::parse(DEFAULT_SCRIPT, DEFAULT_COLLAPSE, DEFAULT_FLAMEGRAPH)
    }
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("script", &self.script.command_line(&[]).to_string())
            .field("collapse", &self.collapse.command_line(&[]).to_string())
            .field("flamegraph", &self.flamegraph.command_line(&[]).to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_commands() {
        let pipeline = RenderPipeline::perf_default().unwrap();

        let script = pipeline
            .script
            .command_line(&["-i".to_string(), "perf.data".to_string()]);
        assert_eq!(script.program(), "perf");
        assert_eq!(script.arguments(), ["script", "-i", "perf.data"]);

        assert_eq!(
            pipeline.collapse.command_line(&[]).program(),
            "./FlameGraph/stackcollapse-perf.pl"
        );
        assert_eq!(pipeline.flamegraph.name(), "flamegraph");
    }

    #[test]
    fn test_unbalanced_quotes_rejected() {
        assert!(RenderPipeline::parse("perf script", "'oops", "fg").is_err());
    }
}
