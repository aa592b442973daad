use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &PerfshotConfig) -> Result<()> {
    validate_target_options(&config.target)?;
    validate_profiler_options(&config.profiler)?;
    validate_load_options(&config.load)?;
    validate_render_options(&config.render)?;
    Ok(())
}

fn validate_target_options(options: &TargetOptions) -> Result<()> {
    if options.stop_timeout.is_zero() {
        return Err(anyhow!("target.stop_timeout must be greater than 0"));
    }
    Ok(())
}

fn validate_profiler_options(options: &ProfilerOptions) -> Result<()> {
    validate_command("profiler.program", &options.program)?;

    if options.output.as_os_str().is_empty() {
        return Err(anyhow!("profiler.output cannot be empty"));
    }
    if options.stop_timeout.is_zero() {
        return Err(anyhow!("profiler.stop_timeout must be greater than 0"));
    }
    if options.frequency == Some(0) {
        return Err(anyhow!("profiler.frequency must be greater than 0 when set"));
    }
    Ok(())
}

fn validate_load_options(options: &LoadOptions) -> Result<()> {
    if options.shot_count == 0 {
        return Err(anyhow!("load.shot_count must be greater than 0"));
    }
    if options.random_limit == 0 {
        return Err(anyhow!("load.random_limit must be greater than 0"));
    }
    if options.request_timeout.is_zero() {
        return Err(anyhow!("load.request_timeout must be greater than 0"));
    }
    if options.ammunition.is_empty() {
        return Err(anyhow!("load.ammunition must contain at least one URL"));
    }

    for url in &options.ammunition {
        validate_url(url)?;
    }
    Ok(())
}

fn validate_render_options(options: &RenderOptions) -> Result<()> {
    validate_command("render.script", &options.script)?;
    validate_command("render.collapse", &options.collapse)?;
    validate_command("render.flamegraph", &options.flamegraph)?;

    if options.output.as_os_str().is_empty() {
        return Err(anyhow!("render.output cannot be empty"));
    }
    if options.stage_timeout.is_zero() {
        return Err(anyhow!("render.stage_timeout must be greater than 0"));
    }
    Ok(())
}

fn validate_command(field: &str, command: &str) -> Result<()> {
    perfshot_process::CommandLine::parse(command)
        .map(|_| ())
        .map_err(|e| anyhow!("{}: {}", field, e))
}

/// Accepts exactly the URLs the HTTP issuer can request.
fn validate_url(url: &str) -> Result<()> {
    perfshot_load::parse_endpoint(url)
        .map(|_| ())
        .map_err(|e| anyhow!("load.ammunition: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        validate_config(&PerfshotConfig::default()).unwrap();
    }

    #[test]
    fn test_zero_shot_count_rejected() {
        let mut config = PerfshotConfig::default();
        config.load.shot_count = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("shot_count"));
    }

    #[test]
    fn test_zero_random_limit_rejected() {
        let mut config = PerfshotConfig::default();
        config.load.random_limit = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_ammunition_urls() {
        validate_url("http://localhost:8080/api/v1/maps").unwrap();
        validate_url("http://127.0.0.1/").unwrap();
        validate_url("http://example.com").unwrap();
        validate_url("http://[::1]/maps").unwrap();
        validate_url("http://[::1]:8080/api/v1/maps").unwrap();

        assert!(validate_url("localhost:8080/api/v1/maps").is_err());
        assert!(validate_url("https://example.com/").is_err());
        assert!(validate_url("http:///path").is_err());
        assert!(validate_url("http://host:port/").is_err());
        assert!(validate_url("http://host/a b").is_err());
        assert!(validate_url("http://[::1/maps").is_err());

        let mut config = PerfshotConfig::default();
        config.load.ammunition.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_and_unbalanced_commands_rejected() {
        let mut config = PerfshotConfig::default();
        config.profiler.program = "  ".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = PerfshotConfig::default();
        config.render.collapse = "'./stackcollapse".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("render.collapse"));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = PerfshotConfig::default();
        config.target.stop_timeout = Duration::ZERO;
        assert!(validate_config(&config).is_err());

        let mut config = PerfshotConfig::default();
        config.profiler.stop_timeout = Duration::ZERO;
        assert!(validate_config(&config).is_err());
    }
}
