use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_max_body() -> u64 {
    10 * 1024 * 1024
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteEntry {
    pub method: String,
    pub path: String,
    pub handler_id: String,
    /// Wire field is `is_typescript` (the hosting runtime's own name for
    /// "handled by the script side"); kept distinct from native routes.
    #[serde(rename = "is_typescript")]
    pub is_script: bool,
    /// True when this route is a WebSocket upgrade rather than an ordinary
    /// request/response handler. Compiled into its own route tree keyed
    /// under the pseudo-method `"WS"`.
    #[serde(default)]
    pub is_websocket: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StaticFileMapping {
    pub prefix: String,
    pub directory: PathBuf,
    #[serde(default)]
    pub options: Option<StaticFileOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StaticFileOptions {
    #[serde(default)]
    pub index_file: Option<String>,
    #[serde(default)]
    pub cache_control: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MiddlewareConfig {
    #[serde(default)]
    pub enable_cors: bool,
    #[serde(default)]
    pub enable_logging: bool,
    #[serde(default)]
    pub enable_compression: bool,
}

/// The JSON configuration record written by the script process and read by
/// the native binary on startup (and again on a route-change respawn).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub port: u16,
    pub hostname: String,
    pub ipc_socket_path: PathBuf,
    pub routes: Vec<RouteEntry>,
    #[serde(default)]
    pub static_files: Vec<StaticFileMapping>,
    #[serde(default)]
    pub middleware: MiddlewareConfig,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    #[serde(default)]
    pub metrics_path: Option<String>,
    #[serde(default = "default_max_body")]
    pub max_request_body_size: u64,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_health_check_path() -> String {
    "/_zap/health".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::Missing(path.to_path_buf()))?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::Validate("hostname must not be empty".into()));
        }
        if self.ipc_socket_path.as_os_str().is_empty() {
            return Err(ConfigError::Validate("ipc_socket_path must not be empty".into()));
        }
        if self.max_request_body_size == 0 {
            return Err(ConfigError::Validate("max_request_body_size must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Validate("request_timeout_secs must be positive".into()));
        }
        for route in &self.routes {
            if route.path.is_empty() || !route.path.starts_with('/') {
                return Err(ConfigError::Validate(format!(
                    "route pattern {:?} must start with '/'",
                    route.path
                )));
            }
        }
        for mapping in &self.static_files {
            if !mapping.prefix.starts_with('/') {
                return Err(ConfigError::Validate(format!(
                    "static file prefix {:?} must start with '/'",
                    mapping.prefix
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            port: 8080,
            hostname: "127.0.0.1".into(),
            ipc_socket_path: "/tmp/zap-test.sock".into(),
            routes: vec![RouteEntry {
                method: "GET".into(),
                path: "/api/users/:id".into(),
                handler_id: "h_user".into(),
                is_script: true,
                is_websocket: false,
            }],
            static_files: vec![],
            middleware: MiddlewareConfig::default(),
            health_check_path: default_health_check_path(),
            metrics_path: None,
            max_request_body_size: default_max_body(),
            request_timeout_secs: default_timeout(),
        }
    }

    #[test]
    fn round_trips_through_json_with_is_typescript_rename() {
        let config = sample();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"is_typescript\":true"));
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn rejects_route_pattern_without_leading_slash() {
        let mut config = sample();
        config.routes[0].path = "api/users".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validate(_))));
    }

    #[test]
    fn defaults_fill_in_when_omitted() {
        let minimal = r#"{
            "port": 3000,
            "hostname": "localhost",
            "ipc_socket_path": "/tmp/zap.sock",
            "routes": []
        }"#;
        let config: Config = serde_json::from_str(minimal).unwrap();
        assert_eq!(config.health_check_path, "/_zap/health");
        assert_eq!(config.max_request_body_size, default_max_body());
        assert_eq!(config.request_timeout_secs, default_timeout());
    }
}
