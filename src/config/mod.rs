use std::fs;

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{
    config_error,
    core::error::{BridgeError, BridgeResult},
};

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[validate(nested)]
    #[serde(default)]
    pub log: Log,

    #[validate(nested)]
    #[serde(default)]
    pub transport: Transport,

    #[validate(nested)]
    #[serde(default)]
    pub store: StoreConfig,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> BridgeResult<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path)
            .map_err(|e| config_error!("Unable to read conf file from {}: {}", path, e))?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    // config file load entry point
    pub fn load_with_opt_override(path: Option<&str>) -> BridgeResult<Self> {
        match path {
            Some(path) => Self::load_from_yaml(path),
            None => {
                debug!("No conf path given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_yaml(conf_str: &str) -> BridgeResult<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str)
            .map_err(|e| config_error!("Unable to parse yaml conf: {}", e))?;

        trace!("Loaded conf: {conf:?}");

        // use validator to validate conf file
        conf.validate()
            .map_err(|e| BridgeError::Configuration(format!("Conf file valid failed: {e}")))?;

        Ok(conf)
    }

    pub fn to_yaml(&self) -> BridgeResult<String> {
        serde_yaml::to_string(self).map_err(|e| config_error!(e))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Log {
    #[validate(custom(function = "Log::validate_level"))]
    #[serde(default = "Log::default_level")]
    pub level: String,

    /// Append logs to this file instead of stderr
    #[validate(length(min = 1))]
    pub path: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            path: None,
        }
    }
}

impl Log {
    fn default_level() -> String {
        "info".to_string()
    }

    fn validate_level(level: &str) -> Result<(), ValidationError> {
        level
            .parse::<log::LevelFilter>()
            .map(|_| ())
            .map_err(|_| ValidationError::new("unknown_log_level"))
    }
}

#[derive(Clone, Copy, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// One channel; verb and path travel in the payload
    #[default]
    Shared,
    /// One channel per route, named `"<VERB> <template>"`
    PerRoute,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Transport {
    #[serde(default)]
    pub mode: ChannelMode,

    /// Upper bound on concurrently running calls
    #[validate(range(min = 1, max = 4096))]
    #[serde(default = "Transport::default_max_in_flight")]
    pub max_in_flight: usize,

    /// Default deadline applied when a call carries none
    #[validate(range(min = 1))]
    pub call_timeout_ms: Option<u64>,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            mode: ChannelMode::default(),
            max_in_flight: Self::default_max_in_flight(),
            call_timeout_ms: None,
        }
    }
}

impl Transport {
    fn default_max_in_flight() -> usize {
        64
    }
}

#[derive(Clone, Copy, Default, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Etcd,
}

#[derive(Clone, Default, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "StoreConfig::validate_backend"))]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[validate(nested)]
    pub etcd: Option<Etcd>,
}

impl StoreConfig {
    fn validate_backend(&self) -> Result<(), ValidationError> {
        if self.backend == StoreBackend::Etcd && self.etcd.is_none() {
            Err(ValidationError::new("etcd_required"))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Etcd {
    #[validate(length(min = 1))]
    pub host: Vec<String>,
    #[serde(default = "Etcd::default_prefix")]
    pub prefix: String,
    pub timeout: Option<u32>,
    pub connect_timeout: Option<u32>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Etcd {
    fn default_prefix() -> String {
        "/hostbridge".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_defaults() {
        init_log();
        let conf = Config::from_yaml("{}").unwrap();
        assert_eq!(conf.log.level, "info");
        assert!(conf.log.path.is_none());
        assert_eq!(conf.transport.mode, ChannelMode::Shared);
        assert_eq!(conf.transport.max_in_flight, 64);
        assert_eq!(conf.store.backend, StoreBackend::Memory);
    }

    #[test]
    fn test_load_file() {
        init_log();
        let conf_str = r#"
---
log:
  level: debug
  path: /tmp/hostbridge.log

transport:
  mode: per_route
  max_in_flight: 8
  call_timeout_ms: 2500

store:
  backend: etcd
  etcd:
    host: ["127.0.0.1:2379"]
    prefix: /bridge
    timeout: 5
        "#;
        let conf = Config::from_yaml(conf_str).unwrap();
        assert_eq!(conf.log.level, "debug");
        assert_eq!(conf.transport.mode, ChannelMode::PerRoute);
        assert_eq!(conf.transport.max_in_flight, 8);
        assert_eq!(conf.transport.call_timeout_ms, Some(2500));
        let etcd = conf.store.etcd.as_ref().unwrap();
        assert_eq!(etcd.host.len(), 1);
        assert_eq!(etcd.prefix, "/bridge");
        assert_eq!(etcd.timeout, Some(5));
    }

    #[test]
    fn test_load_from_yaml_file() {
        init_log();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "transport:\n  max_in_flight: 3").unwrap();

        let path = file.path().display().to_string();
        let conf = Config::load_with_opt_override(Some(&path)).unwrap();
        assert_eq!(conf.transport.max_in_flight, 3);

        let missing = Config::load_from_yaml("/nonexistent/hostbridge.yaml");
        assert!(matches!(missing, Err(BridgeError::Configuration(_))));
    }

    #[test]
    fn test_valid_etcd_required_for_etcd_backend() {
        init_log();
        let conf = Config::from_yaml("store:\n  backend: etcd\n");
        assert!(matches!(conf, Err(BridgeError::Configuration(_))));
    }

    #[test]
    fn test_valid_etcd_host_length() {
        init_log();
        let conf_str = r#"
store:
  backend: etcd
  etcd:
    host: []
        "#;
        assert!(Config::from_yaml(conf_str).is_err());
    }

    #[test]
    fn test_valid_log_level() {
        init_log();
        assert!(Config::from_yaml("log:\n  level: loud\n").is_err());
        assert!(Config::from_yaml("log:\n  level: TRACE\n").is_ok());
    }

    #[test]
    fn test_valid_max_in_flight() {
        init_log();
        assert!(Config::from_yaml("transport:\n  max_in_flight: 0\n").is_err());
    }

    #[test]
    fn test_to_yaml_round_trip() {
        init_log();
        let conf = Config::default();
        let yaml = conf.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.transport.max_in_flight, conf.transport.max_in_flight);
    }
}
