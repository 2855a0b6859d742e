use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::export::DEFAULT_TAG_PREFIX;
use crate::path_tree::DEFAULT_SEPARATOR;
use crate::uri::{DEFAULT_NAMESPACE, DEFAULT_TAG};

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "containertree.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Preferred output mode (`pretty`, `text`, `json`).
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Namespace prefix a base image needs to hang directly off the root.
    /// Empty accepts every namespace.
    #[serde(default = "default_first_level")]
    pub first_level: String,
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    #[serde(default = "default_tag")]
    pub default_tag: String,
    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            first_level: default_first_level(),
            default_namespace: default_namespace(),
            default_tag: default_tag(),
            tag_prefix: default_tag_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
        }
    }
}

/// Parse one config file.
///
/// # Errors
///
/// Fails if the file cannot be read or is not valid TOML for [`TreeConfig`].
pub fn load_config_file(path: &Path) -> Result<TreeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<TreeConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// The user-level config path, if the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("containertree/config.toml"))
}

/// Resolve the effective config: an explicit path must exist; otherwise
/// `./containertree.toml`, then the user config, then defaults.
///
/// # Errors
///
/// Fails if the explicit path is missing, or any file found is unreadable or
/// malformed.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<TreeConfig> {
    if let Some(path) = explicit {
        return load_config_file(path);
    }

    let local = cwd.join(LOCAL_CONFIG);
    if local.exists() {
        return load_config_file(&local);
    }

    match user_config_path() {
        Some(path) if path.exists() => load_config_file(&path),
        _ => Ok(TreeConfig::default()),
    }
}

fn default_first_level() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

fn default_tag_prefix() -> String {
    DEFAULT_TAG_PREFIX.to_string()
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}
