use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "config.toml";

/// User settings. Stored as `<config_dir>/cloudctl/config.toml`; every field
/// is optional and command-line flags take precedence.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub exec: ExecSettings,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncSettings {
    pub prefix: Option<String>,
    pub merge_identical_users: Option<bool>,
    pub namespace: Option<String>,
    pub context: Option<String>,
    pub greenhouse_kubeconfig: Option<String>,
    pub remote_kubeconfig: Option<String>,
}

/// Conversion of oidc users into exec-plugin users.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecSettings {
    pub enabled: Option<bool>,
    pub command: Option<String>,
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Settings {
    /// Loads `path`, or the default location when `None`. A missing file
    /// yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => match default_path() {
                Some(path) => Self::load_from(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings {}", path.display()))?;
        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings {}", path.display()))?;
        Ok(settings)
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cloudctl").join(CONFIG_FILE))
}

/// `~/.kube/config`
pub fn default_kubeconfig_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".kube").join("config"))
}

/// `~/.kube/cache/oidc-login`, where kubelogin keeps its tokens.
pub fn default_token_cache_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".kube").join("cache").join("oidc-login"))
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
