use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::types::Kubeconfig;

/// Reads and writes one kubeconfig file.
pub struct KubeconfigStore {
    path: PathBuf,
}

impl KubeconfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or empty file loads as an empty kubeconfig.
    pub fn load(&self) -> Result<Kubeconfig> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "kubeconfig does not exist, starting empty");
            return Ok(Kubeconfig::default());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read kubeconfig {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Kubeconfig::default());
        }
        let config: Kubeconfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse kubeconfig {}", self.path.display()))?;
        Ok(config)
    }

    /// Writes through a temporary sibling file and renames it into place.
    pub fn save(&self, config: &Kubeconfig) -> Result<()> {
        let contents = serde_yaml::to_string(config)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.tmp_path();
        let written = write_private(&tmp_path, contents.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp_path.display()))
            .and_then(|()| {
                fs::rename(&tmp_path, &self.path).with_context(|| {
                    format!("Failed to write kubeconfig to {}", self.path.display())
                })
            });
        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        written?;

        debug!(path = %self.path.display(), "kubeconfig written");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        self.path.with_file_name(format!(".{}.tmp", file_name))
    }
}

/// Creates `path` as a fresh owner-only file.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kubeconfig::types::Cluster;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = KubeconfigStore::new(dir.path().join("nope"));
        assert_eq!(store.load().unwrap(), Kubeconfig::default());
    }

    #[test]
    fn save_creates_parents_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".kube").join("config");
        let store = KubeconfigStore::new(&path);

        let mut config = Kubeconfig::default();
        config.clusters.insert(
            "cloudctl:a".to_string(),
            Cluster {
                server: "https://a.example.com".to_string(),
                ..Default::default()
            },
        );
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap(), {
            let mut expected = config.clone();
            expected.preferences = serde_json::json!({});
            expected
        });
        assert!(!dir.path().join(".kube").join(".config.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[cfg(unix)]
    #[test]
    fn leftover_temp_file_does_not_widen_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        let leftover = dir.path().join(".config.tmp");
        fs::write(&leftover, "stale").unwrap();
        fs::set_permissions(&leftover, fs::Permissions::from_mode(0o644)).unwrap();

        KubeconfigStore::new(&path).save(&Kubeconfig::default()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!leftover.exists());
    }

    #[test]
    fn failed_rename_cleans_up_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), "x").unwrap();

        let err = KubeconfigStore::new(&path)
            .save(&Kubeconfig::default())
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to write kubeconfig"));
        assert!(!dir.path().join(".config.tmp").exists());
    }

    #[test]
    fn garbage_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "clusters: [unterminated").unwrap();

        let err = KubeconfigStore::new(&path).load().unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse kubeconfig"));
    }
}
