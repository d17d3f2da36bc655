use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::common::constants::{DEFAULT_INTERFACE_PREFIX, DEFAULT_LOG_LEVEL};

#[auto_impl::auto_impl(Box, &)]
pub trait ConfigLoader: Send + Sync {
    /// Explicit schema package, overriding the one derived from the contract namespace.
    fn get_package(&self) -> Option<String>;
    fn set_package(&self, package: Option<String>);

    fn get_interface_prefix(&self) -> String;

    fn get_require_operation_tag(&self) -> bool;
    fn set_require_operation_tag(&self, required: bool);

    /// Services to convert when none are named explicitly.
    fn get_activation_services(&self) -> Vec<String>;

    fn dump(&self) -> String;
}

pub trait LoggingConfigLoader {
    fn get_console_logger_config(&self) -> ConsoleLoggerConfig;
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct ConsoleLoggerConfig {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct ActivationConfig {
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
struct Config {
    package: Option<String>,
    interface_prefix: Option<String>,
    require_operation_tag: Option<bool>,

    activation: Option<ActivationConfig>,
    console_logger: Option<ConsoleLoggerConfig>,
}

#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    config: Arc<Mutex<Config>>,
}

impl Default for TomlConfigLoader {
    fn default() -> Self {
        Self {
            config: Arc::new(Mutex::new(Config::default())),
        }
    }
}

impl TomlConfigLoader {
    pub fn new_from_str(config_str: &str) -> Result<Self, anyhow::Error> {
        let config = toml::de::from_str::<Config>(config_str)
            .with_context(|| format!("failed to parse config file: {}", config_str))?;

        if let Some(prefix) = &config.interface_prefix {
            if !prefix.chars().all(|c| c.is_alphanumeric() || c == '_') {
                anyhow::bail!("invalid interface prefix: {:?}", prefix);
            }
        }

        Ok(TomlConfigLoader {
            config: Arc::new(Mutex::new(config)),
        })
    }

    pub fn new(config_path: &Path) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file: {:?}", config_path))?;
        let ret = Self::new_from_str(&config_str)?;

        Ok(ret)
    }

    fn lock(&self) -> MutexGuard<'_, Config> {
        // the config holds plain data, a poisoned lock still guards a consistent value
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ConfigLoader for TomlConfigLoader {
    fn get_package(&self) -> Option<String> {
        self.lock().package.clone()
    }

    fn set_package(&self, package: Option<String>) {
        self.lock().package = package;
    }

    fn get_interface_prefix(&self) -> String {
        self.lock()
            .interface_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_INTERFACE_PREFIX.to_string())
    }

    fn get_require_operation_tag(&self) -> bool {
        self.lock().require_operation_tag.unwrap_or(true)
    }

    fn set_require_operation_tag(&self, required: bool) {
        self.lock().require_operation_tag = Some(required);
    }

    fn get_activation_services(&self) -> Vec<String> {
        self.lock()
            .activation
            .as_ref()
            .map(|a| a.services.clone())
            .unwrap_or_default()
    }

    fn dump(&self) -> String {
        let config = self.lock().clone();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl LoggingConfigLoader for &TomlConfigLoader {
    fn get_console_logger_config(&self) -> ConsoleLoggerConfig {
        self.lock()
            .console_logger
            .clone()
            .unwrap_or_else(|| ConsoleLoggerConfig {
                level: Some(DEFAULT_LOG_LEVEL.to_string()),
            })
    }
}
