//! Configuration management for CZDS Fetcher
//!
//! This module provides TOML configuration loading with zero-config defaults.
//! Every section is optional; anything left out keeps its built-in default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, Endpoints, OrchestratorConfig};
use crate::constants::{czds, files, http, limits, orchestrator};
use crate::errors::{ConfigError, ConfigResult};

/// Name of the per-user configuration directory
const CONFIG_DIR_NAME: &str = "czds-fetcher";

/// Placeholder shown instead of a configured password
const REDACTED: &str = "********";

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// ICANN account credentials
    pub credentials: CredentialsConfigToml,
    /// Service base URLs
    pub endpoints: EndpointsConfigToml,
    /// Batch download settings
    pub download: DownloadConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly credentials; environment and prompt fill in what is missing
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CredentialsConfigToml {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// TOML-friendly endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfigToml {
    /// Base URL of the account API (token exchange)
    pub auth_base_url: String,
    /// Base URL of the CZDS API (links and zone files)
    pub czds_base_url: String,
}

impl Default for EndpointsConfigToml {
    fn default() -> Self {
        Self {
            auth_base_url: czds::AUTH_BASE_URL.to_string(),
            czds_base_url: czds::CZDS_BASE_URL.to_string(),
        }
    }
}

/// TOML-friendly batch download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfigToml {
    /// Directory zone files are saved into
    pub working_dir: PathBuf,
    /// Maximum concurrent transfers
    pub concurrency_limit: usize,
    /// Extra rounds for URLs that failed transiently
    pub retry_rounds: u32,
    /// Pause before each retry round in milliseconds
    pub retry_round_delay_ms: u64,
    /// Deadline for a single transfer in seconds (0 = no deadline)
    pub transfer_timeout_secs: u64,
    /// Progress refresh interval in milliseconds
    pub progress_interval_ms: u64,
}

impl Default for DownloadConfigToml {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from(files::DEFAULT_WORKING_DIR),
            concurrency_limit: orchestrator::DEFAULT_CONCURRENCY_LIMIT,
            retry_rounds: orchestrator::DEFAULT_RETRY_ROUNDS,
            retry_round_delay_ms: orchestrator::DEFAULT_RETRY_ROUND_DELAY.as_millis() as u64,
            transfer_timeout_secs: orchestrator::DEFAULT_TRANSFER_TIMEOUT.as_secs(),
            progress_interval_ms: orchestrator::PROGRESS_TICK.as_millis() as u64,
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// TCP keep-alive timeout in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// API request timeout in seconds; zone file downloads are not bound by it
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: Some(30),
            tcp_nodelay: true,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no -v/-q flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Runtime configuration derived from an [`AppConfig`]
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub client: ClientConfig,
    pub endpoints: Endpoints,
    pub orchestrator: OrchestratorConfig,
}

impl AppConfig {
    /// Convert TOML-friendly configuration to validated runtime configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for malformed URLs or zero limits
    pub fn to_runtime_config(&self) -> ConfigResult<RuntimeConfig> {
        let client = self.client.to_runtime_config()?;
        let endpoints = self.endpoints.to_runtime_config()?;
        let orchestrator = self.download.to_runtime_config();
        orchestrator.validate()?;

        Ok(RuntimeConfig {
            client,
            endpoints,
            orchestrator,
        })
    }

    /// Load configuration
    ///
    /// An explicitly named file must exist. Otherwise the standard locations
    /// are searched and built-in defaults are used if none exists.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        match Self::locate(config_file_override).await? {
            Some(path) => Self::load_from_file(&path).await,
            None => {
                debug!("Using built-in default configuration");
                Ok(Self::default())
            }
        }
    }

    /// The file [`AppConfig::load`] would read, if any
    pub async fn locate(config_file_override: Option<PathBuf>) -> ConfigResult<Option<PathBuf>> {
        match config_file_override {
            Some(path) if path.exists() => Ok(Some(path)),
            Some(path) => Err(ConfigError::NotFound { path }),
            None => Ok(Self::find_config_file()),
        }
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![
            // Project-local config
            PathBuf::from("./czds.toml"),
            PathBuf::from("./config.toml"),
        ];
        // User config
        if let Ok(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        debug!("No config file found in standard locations");
        None
    }

    /// Get the default config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Write a commented default configuration file
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub async fn write_default(path: &Path, force: bool) -> ConfigResult<()> {
        if path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                field: "path".to_string(),
                value: path.display().to_string(),
                reason: "File already exists; pass --force to overwrite".to_string(),
            });
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(path, Self::generate_default_config_content())
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Copy of this configuration that is safe to print
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.credentials.password.is_some() {
            config.credentials.password = Some(REDACTED.to_string());
        }
        config
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# CZDS Fetcher Configuration
# Every setting is optional; remove a line to fall back to its default.

[credentials]
# ICANN account. If omitted, CZDS_USERNAME / CZDS_PASSWORD are used,
# then you are prompted.
# username = "you@example.com"
# password = "..."

[endpoints]
auth_base_url = "{auth}"
czds_base_url = "{czds}"

[download]
# Directory zone files are saved into
working_dir = "{working_dir}"
# Maximum concurrent downloads
concurrency_limit = {concurrency}
# Extra rounds for zone files that failed with a transient error
retry_rounds = {retry_rounds}
retry_round_delay_ms = {retry_delay}
# Give up on a single download after this many seconds (0 = never)
transfer_timeout_secs = {transfer_timeout}
progress_interval_ms = {progress}

[client]
tcp_keepalive_secs = 30
tcp_nodelay = true
pool_idle_timeout_secs = {pool_idle}
pool_max_per_host = {pool_max}
request_timeout_secs = {request_timeout}  # token exchange and link listing only
connect_timeout_secs = {connect_timeout}
rate_limit_rps = {rps}

[logging]
level = "warn"  # error, warn, info, debug, trace
"#,
            auth = czds::AUTH_BASE_URL,
            czds = czds::CZDS_BASE_URL,
            working_dir = files::DEFAULT_WORKING_DIR,
            concurrency = orchestrator::DEFAULT_CONCURRENCY_LIMIT,
            retry_rounds = orchestrator::DEFAULT_RETRY_ROUNDS,
            retry_delay = orchestrator::DEFAULT_RETRY_ROUND_DELAY.as_millis(),
            transfer_timeout = orchestrator::DEFAULT_TRANSFER_TIMEOUT.as_secs(),
            progress = orchestrator::PROGRESS_TICK.as_millis(),
            pool_idle = http::POOL_IDLE_TIMEOUT.as_secs(),
            pool_max = http::POOL_MAX_PER_HOST,
            request_timeout = http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout = http::CONNECT_TIMEOUT.as_secs(),
            rps = limits::DEFAULT_RATE_LIMIT_RPS,
        )
    }
}

impl EndpointsConfigToml {
    /// Convert to runtime Endpoints
    pub fn to_runtime_config(&self) -> ConfigResult<Endpoints> {
        Endpoints::new(&self.auth_base_url, &self.czds_base_url)
    }
}

impl DownloadConfigToml {
    /// Convert to runtime OrchestratorConfig
    pub fn to_runtime_config(&self) -> OrchestratorConfig {
        let transfer_timeout = match self.transfer_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        OrchestratorConfig::default()
            .with_destination_dir(self.working_dir.clone())
            .with_concurrency_limit(self.concurrency_limit)
            .with_retry_rounds(self.retry_rounds)
            .with_retry_round_delay(Duration::from_millis(self.retry_round_delay_ms))
            .with_transfer_timeout(transfer_timeout)
            .with_progress_interval(Duration::from_millis(self.progress_interval_ms))
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ConfigResult<ClientConfig> {
        if self.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be non-zero".to_string(),
            });
        }
        for (field, secs) in [
            ("request_timeout_secs", self.request_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                    reason: "Timeout must be at least one second".to_string(),
                });
            }
        }

        Ok(ClientConfig {
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            rate_limit_rps: self.rate_limit_rps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_creation() {
        let config = AppConfig::default();

        assert_eq!(
            config.download.concurrency_limit,
            orchestrator::DEFAULT_CONCURRENCY_LIMIT
        );
        assert_eq!(config.download.retry_rounds, 1);
        assert_eq!(config.client.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);
        assert_eq!(config.logging.level, "warn");
        assert!(config.credentials.username.is_none());
        assert!(config.to_runtime_config().is_ok());
    }

    #[test]
    fn test_config_file_generation() {
        let content = AppConfig::generate_default_config_content();

        let parsed: AppConfig = toml::from_str(&content).unwrap();
        assert_eq!(
            parsed.download.concurrency_limit,
            orchestrator::DEFAULT_CONCURRENCY_LIMIT
        );
        assert_eq!(parsed.endpoints.auth_base_url, czds::AUTH_BASE_URL);
        assert!(content.contains("# CZDS Fetcher Configuration"));
        assert!(content.contains("[download]"));

        let runtime = parsed.to_runtime_config().unwrap();
        assert_eq!(runtime.orchestrator.progress_interval, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("czds.toml");
        let test_config = r#"
[credentials]
username = "ops@example.net"

[download]
working_dir = "/var/lib/zones"
concurrency_limit = 4
transfer_timeout_secs = 0

[logging]
level = "debug"
"#;
        tokio::fs::write(&config_path, test_config).await.unwrap();

        let config = AppConfig::load(Some(config_path)).await.unwrap();
        assert_eq!(config.credentials.username.as_deref(), Some("ops@example.net"));
        assert_eq!(config.download.concurrency_limit, 4);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.download.retry_rounds, orchestrator::DEFAULT_RETRY_ROUNDS);
        assert_eq!(config.client.rate_limit_rps, limits::DEFAULT_RATE_LIMIT_RPS);

        let runtime = config.to_runtime_config().unwrap();
        assert_eq!(runtime.orchestrator.destination_dir, PathBuf::from("/var/lib/zones"));
        assert!(runtime.orchestrator.transfer_timeout.is_none());
    }

    #[tokio::test]
    async fn test_invalid_toml_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        tokio::fs::write(&config_path, "[download\nconcurrency_limit = ")
            .await
            .unwrap();

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = AppConfig::default();
        config.download.concurrency_limit = 0;
        assert!(config.to_runtime_config().is_err());

        let mut config = AppConfig::default();
        config.endpoints.czds_base_url = "czds-api.icann.org".to_string();
        assert!(matches!(
            config.to_runtime_config(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "czds_base_url"
        ));

        let mut config = AppConfig::default();
        config.client.rate_limit_rps = 0;
        assert!(config.to_runtime_config().is_err());
    }

    #[test]
    fn test_zero_client_timeouts_are_rejected() {
        let mut config = AppConfig::default();
        config.client.request_timeout_secs = 0;
        assert!(matches!(
            config.to_runtime_config(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "request_timeout_secs"
        ));

        let mut config = AppConfig::default();
        config.client.connect_timeout_secs = 0;
        assert!(matches!(
            config.to_runtime_config(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "connect_timeout_secs"
        ));

        let mut config = AppConfig::default();
        config.client.request_timeout_secs = 1;
        config.client.connect_timeout_secs = 1;
        assert!(config.to_runtime_config().is_ok());
    }

    #[tokio::test]
    async fn test_write_default_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        AppConfig::write_default(&path, false).await.unwrap();
        assert!(path.exists());

        assert!(AppConfig::write_default(&path, false).await.is_err());
        assert!(AppConfig::write_default(&path, true).await.is_ok());
    }

    #[test]
    fn test_redacted_hides_password() {
        let mut config = AppConfig::default();
        config.credentials.username = Some("ops@example.net".to_string());
        config.credentials.password = Some("hunter2".to_string());

        let shown = config.redacted().to_toml_string().unwrap();
        assert!(shown.contains("ops@example.net"));
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains(REDACTED));
    }
}
