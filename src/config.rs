// Configuration File Support
//
// Defaults, overridden by an optional TOML file, overridden by environment
// variables. The resulting `Config` is read-only after startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tools::{
    ExecutionTarget, ProcessRunner, RunnerConfig, ToolKind, ToolTimeouts, Toolbox,
};

/// Containers reported by `/services`
pub const DEFAULT_EXPECTED_SERVICES: [&str; 4] = [
    "kalidocker-postgres-1",
    "kalidocker-api-1",
    "kalidocker-ui-1",
    "kalidocker-kali-1",
];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Where and how tools run
    pub runner: RunnerSettings,

    /// Per-tool timeouts in seconds
    pub timeouts: ToolTimeouts,

    /// HTTP API configuration
    pub api: ApiConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Execution environment configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerSettings {
    /// Directory holding `docker-compose.yml`
    pub compose_path: PathBuf,

    /// Compose service tools run in (compose target)
    pub service: String,

    /// Container tools run in (container target)
    pub container: String,

    /// `compose` or `container`
    pub target: String,

    /// Run tools inside docker; when false they run on this host
    pub use_docker: bool,

    /// Seconds between SIGTERM and SIGKILL on timeout
    pub kill_grace_secs: u64,

    /// Working directory for spawned processes (defaults to `compose_path`)
    pub working_dir: Option<PathBuf>,

    /// Directory searched ahead of `PATH` for tool binaries
    pub tool_dir: Option<PathBuf>,

    /// Enforce the program whitelist
    pub validate_commands: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            compose_path: PathBuf::from("."),
            service: "kali-msf".to_string(),
            container: "kalidocker-kali-msf-1".to_string(),
            target: "compose".to_string(),
            use_docker: true,
            kill_grace_secs: 5,
            working_dir: None,
            tool_dir: None,
            validate_commands: true,
        }
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Container names reported by `/services`
    pub expected_services: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            expected_services: DEFAULT_EXPECTED_SERVICES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file
    ///
    /// Without a path, defaults are used. Environment overrides and
    /// validation apply either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => {
                let config = Self::default().apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the result fails validation. A missing file yields defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - KALIDOCKER_COMPOSE_PATH, KALIDOCKER_SERVICE, KALIDOCKER_CONTAINER
    /// - KALIDOCKER_EXEC_TARGET, USE_DOCKER, KALIDOCKER_KILL_GRACE_SECS
    /// - KALIDOCKER_TOOL_DIR
    /// - NMAP_TIMEOUT, NUCLEI_TIMEOUT, FFUF_TIMEOUT, ARJUN_TIMEOUT,
    ///   HTTPX_TIMEOUT, NIKTO_TIMEOUT, DIRB_TIMEOUT
    /// - KALIDOCKER_API_HOST, KALIDOCKER_API_PORT
    /// - KALIDOCKER_LOG_LEVEL, KALIDOCKER_LOG_FORMAT
    fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Unparsable numeric values are ignored and keep the previous value.
    fn apply_overrides<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Logging overrides
        if let Some(level) = var("KALIDOCKER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("KALIDOCKER_LOG_FORMAT") {
            self.logging.format = format;
        }

        // Runner overrides
        if let Some(path) = var("KALIDOCKER_COMPOSE_PATH") {
            self.runner.compose_path = PathBuf::from(path);
        }
        if let Some(service) = var("KALIDOCKER_SERVICE") {
            self.runner.service = service;
        }
        if let Some(container) = var("KALIDOCKER_CONTAINER") {
            self.runner.container = container;
        }
        if let Some(target) = var("KALIDOCKER_EXEC_TARGET") {
            self.runner.target = target;
        }
        if let Some(use_docker) = var("USE_DOCKER") {
            self.runner.use_docker = use_docker.eq_ignore_ascii_case("true");
        }
        if let Some(grace) = var("KALIDOCKER_KILL_GRACE_SECS").and_then(|v| v.parse().ok()) {
            self.runner.kill_grace_secs = grace;
        }
        if let Some(dir) = var("KALIDOCKER_TOOL_DIR") {
            self.runner.tool_dir = Some(PathBuf::from(dir));
        }

        // Timeout overrides
        for kind in ToolKind::ALL {
            let key = format!("{}_TIMEOUT", kind.binary().to_uppercase());
            if let Some(secs) = var(&key).and_then(|v| v.parse().ok()) {
                *self.timeouts.secs_mut(kind) = secs;
            }
        }

        // API overrides
        if let Some(host) = var("KALIDOCKER_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = var("KALIDOCKER_API_PORT").and_then(|v| v.parse().ok()) {
            self.api.port = port;
        }

        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        // Validate runner configuration
        match self.runner.target.to_lowercase().as_str() {
            "compose" | "container" => {}
            _ => anyhow::bail!(
                "Invalid execution target: {}. Must be 'compose' or 'container'",
                self.runner.target
            ),
        }
        if self.runner.service.trim().is_empty() {
            anyhow::bail!("Compose service name must not be empty");
        }
        if self.runner.container.trim().is_empty() {
            anyhow::bail!("Container name must not be empty");
        }

        for kind in ToolKind::ALL {
            if self.timeouts.secs(kind) == 0 {
                anyhow::bail!("Timeout for {} must be > 0", kind);
            }
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    /// Execution target selected by the runner settings
    pub fn execution_target(&self) -> ExecutionTarget {
        if !self.runner.use_docker {
            return ExecutionTarget::Host;
        }
        if self.runner.target.eq_ignore_ascii_case("container") {
            ExecutionTarget::Container {
                name: self.runner.container.clone(),
            }
        } else {
            ExecutionTarget::Compose {
                compose_file: self.runner.compose_path.join("docker-compose.yml"),
                service: self.runner.service.clone(),
            }
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            working_dir: Some(
                self.runner
                    .working_dir
                    .clone()
                    .unwrap_or_else(|| self.runner.compose_path.clone()),
            ),
            tool_dir: self.runner.tool_dir.clone(),
            kill_grace: Duration::from_secs(self.runner.kill_grace_secs),
            validate_commands: self.runner.validate_commands,
        }
    }

    /// Build the toolbox both front-ends dispatch through
    pub fn toolbox(&self, shutdown: tokio_util::sync::CancellationToken) -> Toolbox {
        let runner = ProcessRunner::new(self.execution_target(), self.runner_config())
            .with_shutdown(shutdown);
        Toolbox::new(runner, self.timeouts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.runner.service, "kali-msf");
        assert_eq!(config.runner.container, "kalidocker-kali-msf-1");
        assert!(config.runner.use_docker);
        assert_eq!(config.timeouts.nmap, 300);
        assert_eq!(config.timeouts.nuclei, 600);
        assert_eq!(config.timeouts.httpx, 120);
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.api.expected_services.len(), 4);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_target() {
        let mut config = Config::default();
        config.runner.target = "kubernetes".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.timeouts.ffuf = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ffuf"));
    }

    #[test]
    fn test_config_validation_empty_service() {
        let mut config = Config::default();
        config.runner.service = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.runner.service, "kali-msf");
    }

    #[test]
    fn test_load_valid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[runner]
compose_path = "/opt/kalidocker"
target = "container"
container = "kali-lab"
kill_grace_secs = 2

[timeouts]
nmap = 60
httpx = 30

[api]
port = 9000
expected_services = ["kalidocker-kali-1"]
"#;
        fs::write(temp_file.path(), toml_content).unwrap();

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.runner.compose_path, PathBuf::from("/opt/kalidocker"));
        assert_eq!(config.runner.target, "container");
        assert_eq!(config.runner.kill_grace_secs, 2);
        assert_eq!(config.timeouts.nmap, 60);
        assert_eq!(config.timeouts.httpx, 30);
        // Unset timeouts keep their defaults
        assert_eq!(config.timeouts.nuclei, 600);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.expected_services, vec!["kalidocker-kali-1"]);

        assert!(Config::load_from_path(temp_file.path()).is_ok());
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging
level = "debug"
"#; // Invalid TOML

        fs::write(temp_file.path(), toml_content).unwrap();
        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[timeouts]\nnuclei = 0\n").unwrap();
        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().apply_overrides(overrides(&[
            ("KALIDOCKER_LOG_LEVEL", "debug"),
            ("KALIDOCKER_LOG_FORMAT", "json"),
            ("KALIDOCKER_COMPOSE_PATH", "/srv/kalidocker"),
            ("KALIDOCKER_CONTAINER", "kali-lab"),
            ("KALIDOCKER_EXEC_TARGET", "container"),
            ("KALIDOCKER_KILL_GRACE_SECS", "1"),
            ("NMAP_TIMEOUT", "45"),
            ("NUCLEI_TIMEOUT", "900"),
            ("DIRB_TIMEOUT", "10"),
            ("KALIDOCKER_API_PORT", "8080"),
        ]));

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.runner.compose_path, PathBuf::from("/srv/kalidocker"));
        assert_eq!(config.runner.container, "kali-lab");
        assert_eq!(config.runner.kill_grace_secs, 1);
        assert_eq!(config.timeouts.nmap, 45);
        assert_eq!(config.timeouts.nuclei, 900);
        assert_eq!(config.timeouts.dirb, 10);
        assert_eq!(config.timeouts.ffuf, 300);
        assert_eq!(config.api.port, 8080);
        assert_eq!(
            config.execution_target(),
            ExecutionTarget::Container {
                name: "kali-lab".to_string()
            }
        );
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        let config = Config::default().apply_overrides(overrides(&[
            ("NMAP_TIMEOUT", "soon"),
            ("KALIDOCKER_API_PORT", "99999"),
        ]));

        // Should keep defaults for invalid values
        assert_eq!(config.timeouts.nmap, 300);
        assert_eq!(config.api.port, 8000);
    }

    #[test]
    fn test_use_docker_toggle() {
        let config = Config::default().apply_overrides(overrides(&[("USE_DOCKER", "false")]));
        assert!(!config.runner.use_docker);
        assert_eq!(config.execution_target(), ExecutionTarget::Host);

        let config = Config::default().apply_overrides(overrides(&[("USE_DOCKER", "TRUE")]));
        assert!(config.runner.use_docker);
    }

    #[test]
    fn test_default_execution_target_is_compose() {
        let mut config = Config::default();
        config.runner.compose_path = PathBuf::from("/srv/kalidocker");

        assert_eq!(
            config.execution_target(),
            ExecutionTarget::Compose {
                compose_file: PathBuf::from("/srv/kalidocker/docker-compose.yml"),
                service: "kali-msf".to_string(),
            }
        );
    }

    #[test]
    fn test_runner_config_defaults_working_dir_to_compose_path() {
        let mut config = Config::default();
        config.runner.compose_path = PathBuf::from("/srv/kalidocker");
        config.runner.kill_grace_secs = 3;

        let runner = config.runner_config();
        assert_eq!(runner.working_dir, Some(PathBuf::from("/srv/kalidocker")));
        assert_eq!(runner.kill_grace, Duration::from_secs(3));
        assert!(runner.validate_commands);

        config.runner.working_dir = Some(PathBuf::from("/tmp"));
        assert_eq!(config.runner_config().working_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "WARN".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::WARN);

        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }

    #[test]
    fn test_valid_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = Config::default();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "Log level {} should be valid", level);
        }
    }
}
