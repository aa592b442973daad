use perfshot_common::ShotResult;
use perfshot_load::{Ammunition, LoadConfig};
use perfshot_profiler::PerfRecord;
use perfshot_render::pipeline::{DEFAULT_COLLAPSE, DEFAULT_FLAMEGRAPH, DEFAULT_SCRIPT};
use perfshot_render::RenderPipeline;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result};

pub mod validation;

/// Top-level configuration. Every section and field is optional in YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerfshotConfig {
    #[serde(default)]
    pub target: TargetOptions,
    #[serde(default)]
    pub profiler: ProfilerOptions,
    #[serde(default)]
    pub load: LoadOptions,
    #[serde(default)]
    pub render: RenderOptions,
    #[serde(default)]
    pub teardown: TeardownOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetOptions {
    /// Bounded wait after SIGTERM before the target is force killed.
    #[serde(default = "default_target_stop_timeout", with = "duration_serde")]
    pub stop_timeout: Duration,
    #[serde(default = "default_true")]
    pub inherit_output: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilerOptions {
    /// Profiler command, possibly prefixed (`sudo perf`).
    #[serde(default = "default_profiler_program")]
    pub program: String,
    #[serde(default = "default_trace_output")]
    pub output: PathBuf,
    #[serde(default = "default_true")]
    pub call_graph: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_settle", with = "duration_serde")]
    pub settle: Duration,
    /// Bounded wait after SIGINT; a profiler still running is killed and
    /// its trace reported truncated.
    #[serde(default = "default_profiler_stop_timeout", with = "duration_serde")]
    pub stop_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadOptions {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_random_limit")]
    pub random_limit: u32,
    #[serde(default = "default_shot_count")]
    pub shot_count: u32,
    #[serde(default = "default_cooldown", with = "duration_serde")]
    pub cooldown: Duration,
    #[serde(default = "default_warmup", with = "duration_serde")]
    pub warmup: Duration,
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
    #[serde(default = "default_ammunition")]
    pub ammunition: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderOptions {
    #[serde(default = "default_script")]
    pub script: String,
    #[serde(default = "default_collapse")]
    pub collapse: String,
    #[serde(default = "default_flamegraph")]
    pub flamegraph: String,
    #[serde(default = "default_graph_output")]
    pub output: PathBuf,
    #[serde(default = "default_stage_timeout", with = "duration_serde")]
    pub stage_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeardownOptions {
    /// Pause between stopping the target and rendering.
    #[serde(default = "default_teardown_cooldown", with = "duration_serde")]
    pub cooldown: Duration,
}

impl PerfshotConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: PerfshotConfig = serde_yaml::from_str(content)
            .context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Re-root relative trace and graph paths under `dir`.
    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        if self.profiler.output.is_relative() {
            self.profiler.output = dir.join(&self.profiler.output);
        }
        if self.render.output.is_relative() {
            self.render.output = dir.join(&self.render.output);
        }
        self
    }

    pub fn load_config(&self) -> ShotResult<LoadConfig> {
        Ok(LoadConfig {
            shot_count: self.load.shot_count,
            cooldown: self.load.cooldown,
            ammunition: Ammunition::new(self.load.ammunition.clone())?,
            seed: self.load.seed,
            random_limit: self.load.random_limit,
        })
    }

    pub fn perf_record(&self) -> ShotResult<PerfRecord> {
        Ok(PerfRecord::parse(&self.profiler.program)?
            .with_call_graph(self.profiler.call_graph)
            .with_frequency(self.profiler.frequency)
            .with_extra_args(self.profiler.extra_args.clone()))
    }

    pub fn render_pipeline(&self) -> ShotResult<RenderPipeline> {
        RenderPipeline::parse(&self.render.script, &self.render.collapse, &self.render.flamegraph)
    }
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            stop_timeout: default_target_stop_timeout(),
            inherit_output: default_true(),
        }
    }
}

impl Default for ProfilerOptions {
    fn default() -> Self {
        Self {
            program: default_profiler_program(),
            output: default_trace_output(),
            call_graph: default_true(),
            frequency: None,
            extra_args: Vec::new(),
            settle: default_settle(),
            stop_timeout: default_profiler_stop_timeout(),
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            random_limit: default_random_limit(),
            shot_count: default_shot_count(),
            cooldown: default_cooldown(),
            warmup: default_warmup(),
            request_timeout: default_request_timeout(),
            ammunition: default_ammunition(),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            script: default_script(),
            collapse: default_collapse(),
            flamegraph: default_flamegraph(),
            output: default_graph_output(),
            stage_timeout: default_stage_timeout(),
        }
    }
}

impl Default for TeardownOptions {
    fn default() -> Self {
        Self {
            cooldown: default_teardown_cooldown(),
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_target_stop_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_profiler_program() -> String {
    "perf".to_string()
}

fn default_trace_output() -> PathBuf {
    PathBuf::from("perf.data")
}

fn default_settle() -> Duration {
    Duration::from_secs(1)
}

fn default_profiler_stop_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_seed() -> u64 {
    123456789
}

fn default_random_limit() -> u32 {
    1000
}

fn default_shot_count() -> u32 {
    100
}

fn default_cooldown() -> Duration {
    Duration::from_millis(100)
}

fn default_warmup() -> Duration {
    Duration::from_millis(500)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_ammunition() -> Vec<String> {
    vec![
        "http://localhost:8080/api/v1/maps/map1".to_string(),
        "http://localhost:8080/api/v1/maps".to_string(),
    ]
}

fn default_script() -> String {
    DEFAULT_SCRIPT.to_string()
}

fn default_collapse() -> String {
    DEFAULT_COLLAPSE.to_string()
}

fn default_flamegraph() -> String {
    DEFAULT_FLAMEGRAPH.to_string()
}

fn default_graph_output() -> PathBuf {
    PathBuf::from("graph.svg")
}

fn default_stage_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_teardown_cooldown() -> Duration {
    Duration::from_secs(1)
}

// Durations as "250ms", "1s" or "5m"
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis();
        if millis % 1000 == 0 {
            serializer.serialize_str(&format!("{}s", millis / 1000))
        } else {
            serializer.serialize_str(&format!("{}ms", millis))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

pub(crate) fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let invalid = || format!("Invalid duration: {}", s);

    // "ms" before "s": "ms" ends with 's'
    if let Some(num) = s.strip_suffix("ms") {
        let millis: u64 = num.trim().parse().map_err(|_| invalid())?;
        Ok(Duration::from_millis(millis))
    } else if let Some(num) = s.strip_suffix('s') {
        let secs: u64 = num.trim().parse().map_err(|_| invalid())?;
        Ok(Duration::from_secs(secs))
    } else if let Some(num) = s.strip_suffix('m') {
        let mins: u64 = num.trim().parse().map_err(|_| invalid())?;
        Ok(Duration::from_secs(mins * 60))
    } else {
        Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PerfshotConfig::load_from_string("{}").unwrap();
        assert_eq!(config, PerfshotConfig::default());

        assert_eq!(config.load.seed, 123456789);
        assert_eq!(config.load.random_limit, 1000);
        assert_eq!(config.load.shot_count, 100);
        assert_eq!(config.load.cooldown, Duration::from_millis(100));
        assert_eq!(config.load.ammunition.len(), 2);
        assert_eq!(config.profiler.output, PathBuf::from("perf.data"));
        assert_eq!(config.profiler.settle, Duration::from_secs(1));
        assert_eq!(config.render.output, PathBuf::from("graph.svg"));
        assert_eq!(config.teardown.cooldown, Duration::from_secs(1));
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = r#"
profiler:
  program: sudo perf
  frequency: 99
  settle: 250ms
load:
  shot_count: 10
  cooldown: 0ms
  ammunition:
    - http://127.0.0.1:9000/health
teardown:
  cooldown: 2s
"#;
        let config = PerfshotConfig::load_from_string(yaml).unwrap();
        assert_eq!(config.profiler.frequency, Some(99));
        assert_eq!(config.profiler.settle, Duration::from_millis(250));
        assert!(config.profiler.call_graph);
        assert_eq!(config.load.shot_count, 10);
        assert_eq!(config.load.cooldown, Duration::ZERO);
        assert_eq!(config.teardown.cooldown, Duration::from_secs(2));
        assert_eq!(config.render.script, "perf script");

        let perf = config.perf_record().unwrap();
        let cmd = perfshot_managed_process::ExternalTool::command_line(&perf, &[]);
        assert_eq!(cmd.program(), "sudo");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PerfshotConfig::load_from_string("load:\n  shots: 5\n").unwrap_err();
        assert!(format!("{:#}", err).contains("shots"));
    }

    #[test]
    fn test_durations_round_trip_through_yaml() {
        let mut config = PerfshotConfig::default();
        config.load.warmup = Duration::from_millis(1500);
        config.profiler.stop_timeout = Duration::from_secs(120);

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("warmup: 1500ms"));
        assert!(yaml.contains("stop_timeout: 120s"));
        assert_eq!(PerfshotConfig::load_from_string(&yaml).unwrap(), config);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("fast").is_err());
    }

    #[test]
    fn test_output_dir_only_moves_relative_paths() {
        let mut config = PerfshotConfig::default();
        config.render.output = PathBuf::from("/srv/graphs/out.svg");

        let config = config.with_output_dir(Path::new("/tmp/run1"));
        assert_eq!(config.profiler.output, PathBuf::from("/tmp/run1/perf.data"));
        assert_eq!(config.render.output, PathBuf::from("/srv/graphs/out.svg"));
    }

    #[test]
    fn test_load_config_from_options() {
        let load = PerfshotConfig::default().load_config().unwrap();
        assert_eq!(load.ammunition.len(), 2);
        assert_eq!(load.seed, 123456789);
    }
}
