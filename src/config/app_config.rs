use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::errors::{KeydropError, Result};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "keydrop.toml";

/// Current format version supported by this build of Keydrop.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

/// Keydrop configuration, read from `keydrop.toml`.
///
/// Every section is optional; a missing file means defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Format version for backward compatibility. Defaults to 1 if missing.
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub log: LogSection,
}

fn default_format_version() -> u32 {
    1
}

/// The `[fetch]` section: where `#/<path>` fragments are resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/".into()
}

/// The `[output]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    /// Where artifacts are written.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

/// The `[log]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSection {
    /// An `EnvFilter` directive such as `keydrop=info`.
    pub filter: Option<String>,
}

impl AppConfig {
    /// Load the configuration.
    ///
    /// An explicit path must exist. Without one, `./keydrop.toml` and then
    /// `<config dir>/keydrop/config.toml` are tried; if neither exists the
    /// defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(KeydropError::InvalidConfig {
                    detail: format!("{} not found", path.display()),
                });
            }
            return Self::from_file(path);
        }
        match Self::candidates().into_iter().find(|path| path.is_file()) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("keydrop").join("config.toml"));
        }
        paths
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            KeydropError::InvalidConfig { detail } => KeydropError::InvalidConfig {
                detail: format!("{}: {detail}", path.display()),
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| KeydropError::InvalidConfig {
            detail: format!("Failed to parse configuration: {e}"),
        })?;

        if config.format_version > CURRENT_FORMAT_VERSION {
            return Err(KeydropError::InvalidConfig {
                detail: format!(
                    "format_version {} is newer than this build supports ({CURRENT_FORMAT_VERSION}). \
                     Update keydrop.",
                    config.format_version
                ),
            });
        }
        Ok(config)
    }
}
