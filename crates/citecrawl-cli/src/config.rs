//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use citecrawl_core::HttpSettings;
use citecrawl_explore::ControlSettings;
use serde::Deserialize;

/// Global configuration for citecrawl
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub lookup: LookupConfig,
    pub explore: ExploreConfig,
    pub tor: TorConfig,
    pub checkpoint: CheckpointConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// IP echo endpoint checked after each rotation (e.g. https://httpbin.org/ip)
    pub ip_check_url: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.semanticscholar.org/v1/paper/".to_string(),
            api_key: std::env::var("S2_API_KEY").ok(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            ip_check_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExploreConfig {
    pub root: Option<String>,
    pub budget: usize,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            root: None,
            budget: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TorConfig {
    /// SOCKS proxy all lookups are routed through
    pub proxy: String,
    pub control_host: String,
    pub control_port: u16,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub password: Option<String>,
    pub control_timeout_secs: u64,
}

impl Default for TorConfig {
    fn default() -> Self {
        Self {
            proxy: "socks5h://127.0.0.1:9050".to_string(),
            control_host: "127.0.0.1".to_string(),
            control_port: 9051,
            password: std::env::var("TOR_CONTROL_PASSWORD").ok(),
            control_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Where new checkpoints are written (and `--resume-latest` looks)
    pub dir: PathBuf,
    /// Checkpoint pair to resume from, if both files exist
    pub visited: Option<PathBuf>,
    pub frontier: Option<PathBuf>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./checkpoints"),
            visited: None,
            frontier: None,
        }
    }
}

/// Deserialize a string that may contain an environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    match s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).ok(),
        None => Some(s.to_string()),
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./citecrawl.toml (current directory)
    /// 2. ~/.config/citecrawl/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("citecrawl.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "citecrawl") {
            let user_config = dirs.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// HTTP settings for lookup clients, routed through Tor
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.lookup.timeout_secs),
            connect_timeout: Duration::from_secs(self.lookup.connect_timeout_secs),
            proxy: Some(self.tor.proxy.clone()),
        }
    }

    pub fn control_settings(&self) -> ControlSettings {
        ControlSettings {
            host: self.tor.control_host.clone(),
            port: self.tor.control_port,
            password: self.tor.password.clone(),
            timeout: Duration::from_secs(self.tor.control_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.explore.budget, 1000);
        assert_eq!(config.tor.control_port, 9051);
        assert_eq!(config.checkpoint.dir, PathBuf::from("./checkpoints"));
        assert!(config.lookup.base_url.ends_with("/v1/paper/"));
    }

    #[test]
    fn expand_env_var_literal() {
        assert_eq!(expand_env_var("literal"), Some("literal".to_string()));
    }

    #[test]
    fn expand_env_var_missing() {
        assert_eq!(expand_env_var("${CITECRAWL_NONEXISTENT_12345}"), None);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[lookup]
base_url = "http://localhost:8080/paper"
timeout_secs = 5

[explore]
root = "f9ae5196908d21336ab02f5c20258dc760d125d6"
budget = 250

[tor]
control_port = 9151
password = "hunter2"

[checkpoint]
dir = "/tmp/crawl"
visited = "/tmp/crawl/visited-a.json"
frontier = "/tmp/crawl/frontier-a.json"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.lookup.base_url, "http://localhost:8080/paper");
        assert_eq!(config.lookup.connect_timeout_secs, 10);
        assert_eq!(config.explore.budget, 250);
        assert_eq!(
            config.explore.root.as_deref(),
            Some("f9ae5196908d21336ab02f5c20258dc760d125d6")
        );
        assert_eq!(config.tor.control_port, 9151);
        assert_eq!(config.tor.password.as_deref(), Some("hunter2"));
        assert_eq!(config.tor.proxy, "socks5h://127.0.0.1:9050");
        assert_eq!(
            config.checkpoint.visited,
            Some(PathBuf::from("/tmp/crawl/visited-a.json"))
        );

        let http = config.http_settings();
        assert_eq!(http.timeout, Duration::from_secs(5));
        assert_eq!(http.proxy.as_deref(), Some("socks5h://127.0.0.1:9050"));
        assert_eq!(config.control_settings().port, 9151);
    }

    #[test]
    fn from_file_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("citecrawl.toml");
        std::fs::write(&path, "[explore]\nbudget = \"lots\"\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(format!("{err}").contains("citecrawl.toml"));
    }
}
