//! Configuration structures for Switchboard
//!
//! This module defines all configuration types used by the authority, workers
//! and the client. Configurations are loaded from YAML files and can be
//! overridden by environment variables and command-line flags.

use crate::error::{Result, SwitchboardError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use switchboard_proto::DEFAULT_AUTHORITY_PORT;

/// Top-level configuration for Switchboard components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    /// Mode: "authority", "worker" or "client"
    pub mode: String,

    /// Server binding address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Server port (the authority's rendezvous port, or the worker's
    /// client-facing port)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Worker-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerConfig>,

    /// Authority-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<CoordinatorConfig>,

    /// Client-specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientConfig>,

    /// Observability configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

/// Worker-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Address of the routing authority
    #[serde(default = "default_authority_address")]
    pub authority_address: String,
}

/// Routing authority configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Upper bound on one probe round-trip in milliseconds (0 = unbounded)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Upper bound on reading the first message of an accepted connection
    /// in milliseconds (0 = unbounded)
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_ms: u64,
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Address of the routing authority
    #[serde(default = "default_authority_address")]
    pub authority_address: String,
}

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_AUTHORITY_PORT
}

fn default_authority_address() -> String {
    format!("127.0.0.1:{}", DEFAULT_AUTHORITY_PORT)
}

fn default_probe_timeout() -> u64 {
    5000
}

fn default_handshake_timeout() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            authority_address: default_authority_address(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout(),
            handshake_timeout_ms: default_handshake_timeout(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            authority_address: default_authority_address(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl CoordinatorConfig {
    /// Probe timeout, `None` when unbounded
    pub fn probe_timeout(&self) -> Option<Duration> {
        bounded(self.probe_timeout_ms)
    }

    /// Handshake timeout, `None` when unbounded
    pub fn handshake_timeout(&self) -> Option<Duration> {
        bounded(self.handshake_timeout_ms)
    }
}

fn bounded(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl SwitchboardConfig {
    /// Built-in configuration for a mode, used when no file is given
    pub fn for_mode(mode: &str) -> Result<Self> {
        let mut config = SwitchboardConfig {
            mode: mode.to_string(),
            bind_address: default_bind_address(),
            port: default_port(),
            worker: None,
            coordinator: None,
            client: None,
            observability: Some(ObservabilityConfig::default()),
        };

        match mode {
            "authority" => config.coordinator = Some(CoordinatorConfig::default()),
            "worker" => config.worker = Some(WorkerConfig::default()),
            "client" => config.client = Some(ClientConfig::default()),
            _ => return Err(SwitchboardError::config(format!("Invalid mode: {}", mode))),
        }

        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SwitchboardError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: SwitchboardConfig = serde_yaml::from_str(&content)?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file when one is given, otherwise the built-in defaults for
    /// `mode`; environment overrides are applied on top either way.
    pub fn load(path: Option<&std::path::Path>, mode: &str) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::for_mode(mode)?,
        };

        if config.mode != mode {
            return Err(SwitchboardError::config(format!(
                "Config mode is {} but this binary runs as {}",
                config.mode, mode
            )));
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(bind_address) = std::env::var("SWITCHBOARD_BIND_ADDRESS") {
            self.bind_address = bind_address;
        }

        if let Ok(port) = std::env::var("SWITCHBOARD_PORT") {
            self.port = port
                .parse()
                .map_err(|_| SwitchboardError::Config("Invalid port number".to_string()))?;
        }

        if let Ok(authority) = std::env::var("SWITCHBOARD_AUTHORITY") {
            if let Some(worker) = self.worker.as_mut() {
                worker.authority_address = authority.clone();
            }
            if let Some(client) = self.client.as_mut() {
                client.authority_address = authority;
            }
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.mode.as_str() {
            "authority" => {
                if self.coordinator.is_none() {
                    return Err(SwitchboardError::config(
                        "Coordinator config required for authority mode",
                    ));
                }
                if self.port == 0 {
                    return Err(SwitchboardError::config("Authority port must be non-zero"));
                }
            }
            "worker" => {
                if self.worker.is_none() {
                    return Err(SwitchboardError::config("Worker config required for worker mode"));
                }
            }
            "client" => {
                if self.client.is_none() {
                    return Err(SwitchboardError::config("Client config required for client mode"));
                }
            }
            _ => {
                return Err(SwitchboardError::config(format!("Invalid mode: {}", self.mode)));
            }
        }
        Ok(())
    }

    /// Address to listen on, from `bind_address` and `port`
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.bind_address, self.port).parse()?)
    }

    /// Configured log level, `info` when unset
    pub fn log_level(&self) -> &str {
        self.observability
            .as_ref()
            .map(|o| o.log_level.as_str())
            .unwrap_or("info")
    }

    /// Get authority section
    pub fn coordinator(&self) -> Result<&CoordinatorConfig> {
        self.coordinator
            .as_ref()
            .ok_or_else(|| SwitchboardError::config("Coordinator config not found"))
    }

    /// Get worker section
    pub fn worker(&self) -> Result<&WorkerConfig> {
        self.worker
            .as_ref()
            .ok_or_else(|| SwitchboardError::config("Worker config not found"))
    }

    /// Get client section
    pub fn client(&self) -> Result<&ClientConfig> {
        self.client
            .as_ref()
            .ok_or_else(|| SwitchboardError::config("Client config not found"))
    }
}
