//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::{Result, ServerError};

/// Default max body size for requests and translated responses (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default deadline for one request across every provider hop.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Enable rate limiting on `/ai` routes.
    pub rate_limiting: bool,

    /// Rate limit: requests per minute for `/ai` routes.
    pub api_rpm: u32,

    /// Enable request logging.
    pub request_logging: bool,

    /// Maximum body size in bytes, for requests and for responses the
    /// translation boundary buffers.
    pub max_body_size: usize,

    /// Deadline applied to each request's provider calls.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            rate_limiting: true,
            api_rpm: 120,
            request_logging: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[server]` config section.
    ///
    /// Fails when `bind` is not an IP address.
    pub fn from_settings(settings: &kebele_config::ServerConfig) -> Result<Self> {
        let ip: IpAddr = settings
            .bind
            .parse()
            .map_err(|e| {
                ServerError::Config(format!("invalid bind address '{}': {}", settings.bind, e))
            })?;

        Ok(Self::default()
            .with_bind_address(SocketAddr::new(ip, settings.port))
            .with_rate_limiting(settings.rate_limiting)
            .with_api_rpm(settings.api_rpm)
            .with_request_logging(settings.request_logging))
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Enable or disable rate limiting.
    pub fn with_rate_limiting(mut self, enabled: bool) -> Self {
        self.rate_limiting = enabled;
        self
    }

    /// Set the API rate limit (requests per minute).
    pub fn with_api_rpm(mut self, rpm: u32) -> Self {
        self.api_rpm = rpm;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Set the maximum body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Set the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.port(), 8080);
        assert!(config.rate_limiting);
        assert_eq!(config.api_rpm, 120);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_from_settings() {
        let settings = kebele_config::ServerConfig {
            port: 9090,
            bind: "0.0.0.0".to_string(),
            rate_limiting: false,
            api_rpm: 30,
            request_logging: false,
        };
        let config = ServerConfig::from_settings(&settings).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:9090");
        assert!(!config.rate_limiting);
        assert_eq!(config.api_rpm, 30);
        assert!(!config.request_logging);
    }

    #[test]
    fn test_from_settings_rejects_hostname() {
        let settings = kebele_config::ServerConfig {
            bind: "localhost".to_string(),
            ..Default::default()
        };
        assert!(ServerConfig::from_settings(&settings).is_err());
    }
}
