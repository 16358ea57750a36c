use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kubeconfig::types::null_as_default;
use crate::kubeconfig::{NamedAuthInfo, NamedCluster, NamedContext};

pub const GROUP: &str = "greenhouse.sap";
pub const VERSION: &str = "v1alpha1";
pub const PLURAL: &str = "clusterkubeconfigs";

/// A Greenhouse `ClusterKubeconfig`: the access definition for one remote
/// cluster as published by the central Greenhouse cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterKubeconfig {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ClusterKubeconfigSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterKubeconfigSpec {
    #[serde(default)]
    pub kubeconfig: ClusterKubeconfigData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterKubeconfigData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub clusters: Vec<NamedCluster>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<NamedAuthInfo>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<NamedContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterKubeconfigList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<ClusterKubeconfig>,
}
