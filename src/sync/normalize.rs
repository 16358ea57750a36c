use std::collections::BTreeMap;

use tracing::debug;

use crate::greenhouse::ClusterKubeconfig;
use crate::kubeconfig::{Cluster, Context};

use super::credential::Credential;

/// Everything the remote side declares, keyed by remote (unprefixed) names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedConfig {
    pub clusters: BTreeMap<String, Cluster>,
    pub credentials: BTreeMap<String, Credential>,
    pub contexts: BTreeMap<String, Context>,
}

impl NormalizedConfig {
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty() && self.credentials.is_empty() && self.contexts.is_empty()
    }
}

/// Flattens records into one configuration. When two records declare the
/// same name, the later record wins.
pub fn normalize(records: &[ClusterKubeconfig]) -> NormalizedConfig {
    let mut config = NormalizedConfig::default();

    for record in records {
        let kubeconfig = &record.spec.kubeconfig;

        for item in &kubeconfig.contexts {
            let context = Context {
                cluster: item.context.cluster.clone(),
                user: item.context.user.clone(),
                namespace: item.context.namespace.clone().filter(|ns| !ns.is_empty()),
                ..Default::default()
            };
            if config.contexts.insert(item.name.clone(), context).is_some() {
                debug!(record = %record.metadata.name, context = %item.name, "context redeclared, later record wins");
            }
        }

        for item in &kubeconfig.users {
            let credential = Credential::from(&item.user);
            if config.credentials.insert(item.name.clone(), credential).is_some() {
                debug!(record = %record.metadata.name, user = %item.name, "user redeclared, later record wins");
            }
        }

        for item in &kubeconfig.clusters {
            let mut cluster = Cluster {
                server: item.cluster.server.clone(),
                certificate_authority_data: item.cluster.certificate_authority_data.clone(),
                ..Default::default()
            };
            cluster.set_labels(&record.metadata.labels);
            if config.clusters.insert(item.name.clone(), cluster).is_some() {
                debug!(record = %record.metadata.name, cluster = %item.name, "cluster redeclared, later record wins");
            }
        }
    }

    config
}
