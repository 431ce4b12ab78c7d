use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lua_syntax;
use crate::error::{BridgeError, Result};

pub const DEFAULT_STORE_NAME: &str = "__rust_bridge_storage";
pub const HAMMERSPOON_CLI_PATH: &str = "/Applications/Hammerspoon.app/Contents/Frameworks/hs/hs";

/// Bridge configuration, usually read from a TOML file.
///
/// ```toml
/// store_name = "__rust_bridge_storage"
/// unique_store_name = false
///
/// [executor]
/// program = "/Applications/Hammerspoon.app/Contents/Frameworks/hs/hs"
/// args = ["-c"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Global Lua table holding every live remote value.
    #[serde(default = "default_store_name")]
    pub store_name: String,

    /// Append a random suffix to `store_name` so that several processes can
    /// share one remote interpreter.
    #[serde(default)]
    pub unique_store_name: bool,

    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorConfig {
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the fragment.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_store_name() -> String {
    DEFAULT_STORE_NAME.to_string()
}

fn default_program() -> String {
    HAMMERSPOON_CLI_PATH.to_string()
}

fn default_args() -> Vec<String> {
    vec!["-c".to_string()]
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            store_name: default_store_name(),
            unique_store_name: false,
            executor: ExecutorConfig::default(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            program: default_program(),
            args: default_args(),
        }
    }
}

impl BridgeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: BridgeConfig =
            toml::from_str(contents).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !lua_syntax::is_identifier(&self.store_name) {
            return Err(BridgeError::Config(format!(
                "store_name {:?} is not a valid Lua identifier",
                self.store_name
            )));
        }
        if self.executor.program.is_empty() {
            return Err(BridgeError::Config("executor.program is empty".to_string()));
        }
        Ok(())
    }

    /// The store name to use for a new bridge.
    pub fn resolved_store_name(&self) -> String {
        if self.unique_store_name {
            format!("{}_{}", self.store_name, Uuid::new_v4().to_simple())
        } else {
            self.store_name.clone()
        }
    }
}
