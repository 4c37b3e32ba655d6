use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from gracekill.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct GracekillConfig {
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Grace period in milliseconds before forced termination.
    pub grace_ms: u64,
    /// JSON message written to the worker's stdin to ask it to exit
    /// itself. `None` falls back to the built-in default message.
    pub message: Option<String>,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_ms: 1000,
            message: None,
        }
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file exists but is not valid TOML for this schema.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "failed to read config file {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "failed to parse config file {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load configuration from a TOML file.
pub fn load(path: &Path) -> Result<GracekillConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = GracekillConfig::default();
        assert_eq!(config.shutdown.grace_ms, 1000);
        assert_eq!(config.shutdown.message, None);
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gracekill.toml");
        std::fs::write(
            &path,
            r#"
[shutdown]
grace_ms = 2500
message = '{"kind":"TERM:NORMAL"}'
"#,
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.shutdown.grace_ms, 2500);
        assert_eq!(
            config.shutdown.message.as_deref(),
            Some(r#"{"kind":"TERM:NORMAL"}"#)
        );
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gracekill.toml");
        std::fs::write(&path, "[shutdown]\nmessage = '\"bye\"'\n").unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.shutdown.grace_ms, 1000);
        assert_eq!(config.shutdown.message.as_deref(), Some("\"bye\""));
    }

    #[test]
    fn test_load_empty_file_is_all_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gracekill.toml");
        std::fs::write(&path, "").unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.shutdown.grace_ms, 1000);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load(Path::new("/nonexistent/gracekill.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gracekill.toml");
        std::fs::write(&path, "[shutdown]\ngrace_ms = \"soon\"\n").unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
