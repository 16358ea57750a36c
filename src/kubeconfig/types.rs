use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const LABELS_EXTENSION: &str = "labels";

/// In-memory kubeconfig. Clusters, users and contexts are keyed by name; the
/// on-disk list form is handled by [`KubeconfigFile`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "KubeconfigFile", into = "KubeconfigFile")]
pub struct Kubeconfig {
    pub clusters: BTreeMap<String, Cluster>,
    pub auth_infos: BTreeMap<String, AuthInfo>,
    pub contexts: BTreeMap<String, Context>,
    pub current_context: Option<String>,
    pub preferences: Value,
    pub extensions: Vec<NamedExtension>,
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    #[serde(default)]
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub certificate_authority_data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub extensions: Vec<NamedExtension>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Cluster {
    /// Serialized form of the `labels` extension, used for byte-wise change
    /// detection.
    pub fn labels(&self) -> Option<String> {
        self.extensions
            .iter()
            .find(|ext| ext.name == LABELS_EXTENSION)
            .and_then(|ext| serde_json::to_string(&ext.extension).ok())
    }

    pub fn set_labels(&mut self, labels: &BTreeMap<String, String>) {
        self.extensions.retain(|ext| ext.name != LABELS_EXTENSION);
        if labels.is_empty() {
            return;
        }
        let extension = labels
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<serde_json::Map<_, _>>();
        self.extensions.push(NamedExtension {
            name: LABELS_EXTENSION.to_string(),
            extension: Value::Object(extension),
        });
    }
}

/// A kubeconfig user entry. Only the fields the tool reads are typed; the
/// rest is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthInfo {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub client_certificate_data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub client_key_data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "tokenFile", default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_provider: Option<AuthProviderConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecConfig>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProviderConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub command: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub args: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub env: Vec<ExecEnvVar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provide_cluster_info: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub extensions: Vec<NamedExtension>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedExtension {
    pub name: String,
    #[serde(default)]
    pub extension: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    #[serde(default)]
    pub cluster: Cluster,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedAuthInfo {
    pub name: String,
    #[serde(default)]
    pub user: AuthInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    #[serde(default)]
    pub context: Context,
}

/// On-disk layout of a kubeconfig file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KubeconfigFile {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    api_version: String,
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default)]
    preferences: Value,
    #[serde(default, deserialize_with = "null_as_default")]
    clusters: Vec<NamedCluster>,
    #[serde(default, deserialize_with = "null_as_default")]
    users: Vec<NamedAuthInfo>,
    #[serde(default, deserialize_with = "null_as_default")]
    contexts: Vec<NamedContext>,
    #[serde(
        rename = "current-context",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    current_context: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    extensions: Vec<NamedExtension>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "Config".to_string()
}

impl From<KubeconfigFile> for Kubeconfig {
    // Duplicate names in the file: the last entry wins, as with kubectl.
    fn from(file: KubeconfigFile) -> Self {
        Self {
            clusters: file
                .clusters
                .into_iter()
                .map(|item| (item.name, item.cluster))
                .collect(),
            auth_infos: file
                .users
                .into_iter()
                .map(|item| (item.name, item.user))
                .collect(),
            contexts: file
                .contexts
                .into_iter()
                .map(|item| (item.name, item.context))
                .collect(),
            current_context: file.current_context,
            preferences: file.preferences,
            extensions: file.extensions,
            extra: file.extra,
        }
    }
}

impl From<Kubeconfig> for KubeconfigFile {
    fn from(config: Kubeconfig) -> Self {
        let preferences = match config.preferences {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            preferences,
            clusters: config
                .clusters
                .into_iter()
                .map(|(name, cluster)| NamedCluster { name, cluster })
                .collect(),
            users: config
                .auth_infos
                .into_iter()
                .map(|(name, user)| NamedAuthInfo { name, user })
                .collect(),
            contexts: config
                .contexts
                .into_iter()
                .map(|(name, context)| NamedContext { name, context })
                .collect(),
            current_context: config.current_context,
            extensions: config.extensions,
            extra: config.extra,
        }
    }
}

/// Treats an explicit `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Byte fields are stored base64-encoded, like the Kubernetes API does.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
