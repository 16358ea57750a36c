use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::client::ClusterClient;

/// The subset of the API server's `/version` response we care about.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub minor: String,
    #[serde(default)]
    pub git_version: String,
    #[serde(default)]
    pub platform: String,
}

/// Asks the API server for its version, anonymously first and then with the
/// context's credentials.
pub fn probe(client: &ClusterClient) -> Result<VersionInfo> {
    match client.get_anonymous::<VersionInfo>(&["version"]) {
        Ok(info) => Ok(info),
        Err(e) => {
            debug!(error = %e, "unauthenticated version request failed");
            if !client.has_auth() {
                bail!("no authentication methods found in your kubeconfig. please authenticate (`kubelogin`, etc.) and try again");
            }
            client
                .get::<VersionInfo>(&["version"])
                .context("authenticated version fetch failed")
        }
    }
}

/// `v1.28.3-gke.100+abc` becomes `1.28.3`.
pub fn clean_version(git_version: &str) -> &str {
    let version = git_version.split('-').next().unwrap_or_default();
    let version = version.split('+').next().unwrap_or_default();
    version.strip_prefix('v').unwrap_or(version)
}
