//! Launcher configuration

use anyhow::Result;
use serde::Deserialize;

/// Launcher configuration, loaded from `GESTOR_`-prefixed environment
/// variables with sensible defaults. CLI flags override these afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct LauncherConfig {
    /// Host the application serves on
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port the application serves on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bound on the wait for the application to become ready, in seconds
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    /// Runtime binary that executes the application
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// Application entry point passed to the runtime
    #[serde(default = "default_app_entry")]
    pub app_entry: String,

    /// Working directory for the application process
    #[serde(default)]
    pub app_dir: Option<String>,

    /// Directory for launcher and application log files
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Default output path for standalone check reports
    #[serde(default = "default_check_output")]
    pub check_output: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_startup_timeout() -> u64 {
    60
}

fn default_runtime() -> String {
    "python3".to_string()
}

fn default_app_entry() -> String {
    "main.py".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_check_output() -> String {
    "system_check_results.json".to_string()
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            startup_timeout_secs: default_startup_timeout(),
            runtime: default_runtime(),
            app_entry: default_app_entry(),
            app_dir: None,
            log_dir: default_log_dir(),
            check_output: default_check_output(),
        }
    }
}

impl LauncherConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("GESTOR"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LauncherConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.startup_timeout_secs, 60);
        assert_eq!(config.runtime, "python3");
        assert_eq!(config.check_output, "system_check_results.json");
    }
}
