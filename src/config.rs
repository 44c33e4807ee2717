use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionConfig,
    /// Command that receives share URLs on stdin. Platform default when unset.
    pub clipboard_command: Option<String>,
    /// Maximum upload size in bytes, checked before any request is sent
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base of the file service, also the prefix of every share URL
    pub base_url: String,
    pub connect_timeout_ms: u64,
    /// Upper bound for a single dispatched action
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory holding the credential database
    pub data_dir: String,
    /// Token supplied through the environment, takes precedence over the stored one
    pub token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            token: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            session: SessionConfig::default(),
            clipboard_command: None,
            max_upload_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let base_url = std::env::var("FILES_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let token = std::env::var("FILES_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let request_timeout_ms = std::env::var("REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30_000);

        let connect_timeout_ms = std::env::var("CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10_000);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024);

        let clipboard_command = std::env::var("CLIPBOARD_COMMAND")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let config = Config {
            service: ServiceConfig {
                base_url,
                connect_timeout_ms,
                request_timeout_ms,
            },
            session: SessionConfig { data_dir, token },
            clipboard_command,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.service.base_url.starts_with("http://")
            && !self.service.base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "FILES_BASE_URL must be an http(s) URL, got '{}'",
                self.service.base_url
            )));
        }

        if self.service.request_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "REQUEST_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.service.base_url.starts_with("http://")
            && !self.service.base_url.contains("localhost")
            && !self.service.base_url.contains("127.0.0.1")
        {
            tracing::warn!(
                "FILES_BASE_URL {} is not TLS. Bearer tokens will be sent in cleartext.",
                self.service.base_url
            );
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.service.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.service.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut config = Config::default();
        config.service.base_url = "ftp://files.example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = Config::default();
        config.service.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeouts_as_durations() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }
}
