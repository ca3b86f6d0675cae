//! Configuration Module
//!
//! Provides TOML-based configuration for mqfwd with support for:
//! - Datagram addresses (listen, send_to)
//! - Receive buffer sizing and payload logging
//! - MQTT broker, TLS and connect parameters, topic pair
//! - Environment variable overrides (MQFWD__* prefix)
//!
//! The file is loaded once at startup; after CLI flags are merged in and the
//! result validated, the configuration is immutable for the process lifetime.

use std::path::Path;

use config::{Environment, File, FileFormat};
use regex::Regex;
use serde::Deserialize;

use crate::transport::Endpoint;

// Re-export mqtt config types
pub use mqtt::{ConnectPacketConfig, MqttConfig, TlsConfig, TopicConfig};

mod mqtt;

#[cfg(test)]
mod tests;

/// Receive buffer size used when `max_msg_size` is not positive.
pub const DEFAULT_MAX_MSG_SIZE: usize = 1500;

/// Substitute environment variables in a string.
/// Supports `${VAR}` and `${VAR:-default}` syntax.
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").unwrap();
    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// Config crate error
    Config(config::ConfigError),
    /// Validation error
    Validation(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Config(e) => write!(f, "Config error: {}", e),
            ConfigError::Validation(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Config(e)
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Datagram bind address (`udp|udp4|udp6|unixgram://host:port`)
    pub listen: String,
    /// Datagram destination for messages received from the subscribed topic
    pub send_to: String,
    /// Base64-log every payload crossing the bridge
    pub log_data: bool,
    /// Receive buffer size in bytes; values <= 0 reset to 1500
    pub max_msg_size: i64,
    /// Logging configuration
    pub log: LogConfig,
    /// MQTT client configuration
    pub mqtt: MqttConfig,
}

fn default_listen() -> String {
    "udp://localhost:1234".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            send_to: String::new(),
            log_data: false,
            max_msg_size: DEFAULT_MAX_MSG_SIZE as i64,
            log: LogConfig::default(),
            mqtt: MqttConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level: error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// Supports two forms of environment variable usage:
    /// 1. In-file substitution: `${VAR}` or `${VAR:-default}` syntax in the TOML file
    /// 2. Override via env vars: `MQFWD__` prefix with double underscores for nesting:
    ///    - `MQFWD__LISTEN=udp://0.0.0.0:9000` overrides `listen`
    ///    - `MQFWD__MQTT__BROKER=tcp://broker:1883` overrides `mqtt.broker`
    ///
    /// The file must exist and be readable. Validation is deferred until CLI
    /// flags have been merged in; call [`Config::validate`] afterwards.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let substituted = substitute_env_vars(&content);

        let cfg = config::Config::builder()
            .set_default("listen", default_listen())?
            .set_default("send_to", "")?
            .set_default("log_data", false)?
            .set_default("max_msg_size", DEFAULT_MAX_MSG_SIZE as i64)?
            .set_default("log.level", default_log_level())?
            .add_source(File::from_str(&substituted, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("MQFWD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// Parse configuration from a string (for testing, no env var support).
    /// Unlike [`Config::load`] the result is validated immediately.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Every error reported here is fatal at startup; validation runs before
    /// any socket is bound or dialed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.is_empty() {
            return Err(ConfigError::Validation("no listen addr provided".to_string()));
        }
        Endpoint::parse(&self.listen).map_err(|e| {
            ConfigError::Validation(format!("invalid listen addr [{}]: {}", self.listen, e))
        })?;

        if self.send_to.is_empty() {
            return Err(ConfigError::Validation(
                "no send_to addr provided".to_string(),
            ));
        }
        Endpoint::parse(&self.send_to).map_err(|e| {
            ConfigError::Validation(format!("invalid send_to addr [{}]: {}", self.send_to, e))
        })?;

        if self.mqtt.broker.is_empty() {
            return Err(ConfigError::Validation(
                "no mqtt broker addr provided".to_string(),
            ));
        }

        if self.mqtt.sub.qos > 2 {
            return Err(ConfigError::Validation(format!(
                "invalid mqtt.sub.qos: {} (must be 0, 1, or 2)",
                self.mqtt.sub.qos
            )));
        }
        if self.mqtt.publish.qos > 2 {
            return Err(ConfigError::Validation(format!(
                "invalid mqtt.pub.qos: {} (must be 0, 1, or 2)",
                self.mqtt.publish.qos
            )));
        }

        if let Some(tls) = &self.mqtt.tls {
            if tls.cert_file.is_some() != tls.key_file.is_some() {
                return Err(ConfigError::Validation(
                    "mqtt.tls.cert_file and mqtt.tls.key_file must be set together".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Effective receive buffer size: non-positive values reset to 1500.
    pub fn effective_max_msg_size(&self) -> usize {
        if self.max_msg_size <= 0 {
            DEFAULT_MAX_MSG_SIZE
        } else {
            self.max_msg_size as usize
        }
    }
}
