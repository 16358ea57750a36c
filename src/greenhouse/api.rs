use anyhow::{Context, Result};
use tracing::debug;

use crate::client::ClusterClient;

use super::types::{ClusterKubeconfig, ClusterKubeconfigList, GROUP, PLURAL, VERSION};
use super::RecordSource;

/// Reads ClusterKubeconfigs from the Greenhouse API server.
pub struct ApiSource {
    client: ClusterClient,
    namespace: String,
    name: Option<String>,
}

impl ApiSource {
    pub fn new(client: ClusterClient, namespace: impl Into<String>, name: Option<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            name: name.filter(|n| !n.is_empty()),
        }
    }
}

impl RecordSource for ApiSource {
    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("{}/{}", self.namespace, name),
            None => format!("namespace {}", self.namespace),
        }
    }

    fn fetch(&self) -> Result<Vec<ClusterKubeconfig>> {
        let mut segments = vec!["apis", GROUP, VERSION, "namespaces", self.namespace.as_str(), PLURAL];

        match &self.name {
            Some(name) => {
                segments.push(name);
                let record: ClusterKubeconfig = self
                    .client
                    .get(&segments)
                    .with_context(|| format!("Failed to get ClusterKubeconfig {}", self.describe()))?;
                Ok(vec![record])
            }
            None => {
                let list: ClusterKubeconfigList = self
                    .client
                    .get(&segments)
                    .with_context(|| format!("Failed to list ClusterKubeconfigs in {}", self.describe()))?;
                debug!(count = list.items.len(), namespace = %self.namespace, "listed ClusterKubeconfigs");
                Ok(list.items)
            }
        }
    }
}
