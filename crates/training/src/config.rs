use std::path::{Path, PathBuf};

use serde::Deserialize;

const DEFAULT_CONFIG_NAME: &str = "nas-tools.toml";
const CONFIG_ENV: &str = "NAS_TOOLS_CONFIG";

/// Directory defaults shared by the `search` and `fine_tune` binaries.
/// Command-line flags take precedence over anything loaded here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    pub data_dir: PathBuf,
    pub saved_models_dir: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            saved_models_dir: PathBuf::from("saved_models"),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ToolConfigFile {
    data_dir: Option<String>,
    saved_models_dir: Option<String>,
}

impl ToolConfig {
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return match Self::from_path(Path::new(&path)) {
                Some(cfg) => cfg,
                None => {
                    tracing::warn!("{CONFIG_ENV}={path} could not be read; using defaults");
                    Self::default()
                }
            };
        }
        Self::from_path(Path::new(DEFAULT_CONFIG_NAME)).unwrap_or_default()
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let raw = std::fs::read_to_string(path).ok()?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Option<Self> {
        let file: ToolConfigFile = toml::from_str(raw).ok()?;
        let defaults = Self::default();
        Some(Self {
            data_dir: file
                .data_dir
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.data_dir),
            saved_models_dir: file
                .saved_models_dir
                .map(|v| expand_path(&v))
                .unwrap_or(defaults.saved_models_dir),
        })
    }

    /// Pick the flag value when given, the configured one otherwise.
    pub fn resolve(
        &self,
        data_dir: Option<&Path>,
        saved_models_dir: Option<&Path>,
    ) -> (PathBuf, PathBuf) {
        (
            data_dir.map_or_else(|| self.data_dir.clone(), Path::to_path_buf),
            saved_models_dir.map_or_else(|| self.saved_models_dir.clone(), Path::to_path_buf),
        )
    }
}

fn expand_path(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(raw)
}
