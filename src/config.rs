//! Machine configuration
//!
//! Memory geometry and diagnostic switches, read from TOML. Every key is
//! optional:
//!
//! ```toml
//! code_start = 1000
//! memory_size = 10000
//! listing = false
//! trace = ["calls", "branches"]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::trace::TraceSet;

/// Code origin; the stack and heap share the words below it
pub const DEFAULT_CODE_START: usize = 1000;
/// Total memory in words
pub const DEFAULT_MEMORY_SIZE: usize = 10000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    pub code_start: usize,
    pub memory_size: usize,
    /// Print the code listing while loading
    pub listing: bool,
    pub trace: TraceSet,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            code_start: DEFAULT_CODE_START,
            memory_size: DEFAULT_MEMORY_SIZE,
            listing: false,
            trace: TraceSet::none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    IOError(String),
    ParseError(String),
    InvalidGeometry { code_start: usize, memory_size: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::IOError(msg) => write!(f, "IO error: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Configuration error: {}", msg),
            ConfigError::InvalidGeometry {
                code_start,
                memory_size,
            } => write!(
                f,
                "Code start {} must be below memory size {}",
                code_start, memory_size
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl MachineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: MachineConfig =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ConfigError::IOError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        // words are i32, and the memory size doubles as the null address
        if self.code_start == 0
            || self.code_start >= self.memory_size
            || self.memory_size > i32::MAX as usize
        {
            return Err(ConfigError::InvalidGeometry {
                code_start: self.code_start,
                memory_size: self.memory_size,
            });
        }
        Ok(())
    }

    /// Value held by every word that has not been written
    pub fn null_address(&self) -> i32 {
        self.memory_size as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Trace;
    use test_log::test;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = MachineConfig::from_toml_str("").unwrap();
        assert_eq!(config, MachineConfig::default());
        assert_eq!(config.null_address(), 10000);
    }

    #[test]
    fn test_config_overrides() {
        let config = MachineConfig::from_toml_str(
            r#"
code_start = 500
memory_size = 2000
listing = true
trace = ["calls", "stack"]
"#,
        )
        .unwrap();
        assert_eq!(config.code_start, 500);
        assert_eq!(config.memory_size, 2000);
        assert!(config.listing);
        assert!(config.trace.contains(Trace::Calls));
        assert!(config.trace.contains(Trace::Stack));
        assert!(!config.trace.contains(Trace::State));
    }

    #[test]
    fn test_bad_config_is_rejected() {
        assert!(matches!(
            MachineConfig::from_toml_str("trace = [\"everything\"]"),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            MachineConfig::from_toml_str("code_start = 20000"),
            Err(ConfigError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            MachineConfig::from_toml_str("stack_size = 3"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            MachineConfig::load("/nonexistent/pl0.toml"),
            Err(ConfigError::IOError(_))
        ));
    }
}
