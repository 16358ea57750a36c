//! Minimal Kubernetes REST client built from a kubeconfig context.

use std::fs;
use std::io::IsTerminal;
use std::process::{Command, Stdio};
use std::time::Duration;

use reqwest::blocking::{Client, ClientBuilder, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::kubeconfig::{AuthInfo, Cluster, ExecConfig, Kubeconfig};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no current context set in kubeconfig")]
    NoCurrentContext,
    #[error("context {0:?} not found in kubeconfig")]
    ContextNotFound(String),
    #[error("cluster {0:?} not found in kubeconfig")]
    ClusterNotFound(String),
    #[error("invalid server url {url:?}: {source}")]
    InvalidServer {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("server url {0:?} cannot carry a path")]
    NotABase(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("credential plugin {command:?} failed: {message}")]
    ExecPlugin { command: String, message: String },
    #[error("unexpected HTTP status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Talks to one API server. Credentials are resolved per authenticated
/// request, so anonymous calls never trigger a login.
pub struct ClusterClient {
    base: Url,
    cluster: Cluster,
    auth_info: AuthInfo,
}

impl ClusterClient {
    /// Client for `context`, or the kubeconfig's current context.
    pub fn from_kubeconfig(config: &Kubeconfig, context: Option<&str>) -> Result<Self, ClientError> {
        let context_name = match context.filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => config
                .current_context
                .clone()
                .filter(|name| !name.is_empty())
                .ok_or(ClientError::NoCurrentContext)?,
        };
        let context = config
            .contexts
            .get(&context_name)
            .ok_or_else(|| ClientError::ContextNotFound(context_name.clone()))?;
        let cluster = config
            .clusters
            .get(&context.cluster)
            .ok_or_else(|| ClientError::ClusterNotFound(context.cluster.clone()))?;
        let auth_info = config.auth_infos.get(&context.user).cloned().unwrap_or_default();

        debug!(context = %context_name, server = %cluster.server, "using kubeconfig context");
        Self::new(cluster.clone(), auth_info)
    }

    pub fn new(cluster: Cluster, auth_info: AuthInfo) -> Result<Self, ClientError> {
        let base = Url::parse(&cluster.server).map_err(|source| ClientError::InvalidServer {
            url: cluster.server.clone(),
            source,
        })?;
        Ok(Self {
            base,
            cluster,
            auth_info,
        })
    }

    pub fn has_auth(&self) -> bool {
        has_auth(&self.auth_info)
    }

    /// GET without any credentials.
    pub fn get_anonymous<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let client = self.builder()?.build()?;
        self.send(client.get(self.url(segments)?))
    }

    /// GET with the context's credentials.
    pub fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        let auth = ResolvedAuth::resolve(&self.auth_info)?;
        let mut builder = self.builder()?;
        if let Some(pem) = &auth.identity_pem {
            builder = builder.identity(reqwest::Identity::from_pem(pem)?);
        }
        let mut request = builder.build()?.get(self.url(segments)?);
        if let Some(token) = &auth.bearer {
            request = request.bearer_auth(token);
        } else if let Some((username, password)) = &auth.basic {
            request = request.basic_auth(username, Some(password));
        }
        self.send(request)
    }

    fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status,
                url: response.url().to_string(),
            });
        }
        Ok(response.json()?)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::NotABase(self.cluster.server.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn builder(&self) -> Result<ClientBuilder, ClientError> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT);

        let ca_pem = match (&self.cluster.certificate_authority_data, &self.cluster.certificate_authority) {
            (Some(data), _) => Some(data.clone()),
            (None, Some(path)) => Some(read_file(path)?),
            (None, None) => None,
        };
        if let Some(pem) = ca_pem {
            for cert in reqwest::Certificate::from_pem_bundle(&pem)? {
                builder = builder.add_root_certificate(cert);
            }
        }
        if self.cluster.insecure_skip_tls_verify == Some(true) {
            builder = builder.danger_accept_invalid_certs(true);
        }
        Ok(builder)
    }
}

/// Whether the user entry carries anything usable as a credential. An
/// auth-provider only counts once it holds an `id-token`.
pub fn has_auth(info: &AuthInfo) -> bool {
    let set = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
    let has_bytes = |value: &Option<Vec<u8>>| value.as_ref().is_some_and(|v| !v.is_empty());

    set(&info.token)
        || set(&info.token_file)
        || (set(&info.username) && set(&info.password))
        || has_bytes(&info.client_certificate_data)
        || set(&info.client_certificate)
        || info.exec.is_some()
        || info
            .auth_provider
            .as_ref()
            .and_then(|provider| provider.config.get("id-token"))
            .is_some_and(|token| !token.is_empty())
}

#[derive(Debug, Default)]
struct ResolvedAuth {
    bearer: Option<String>,
    basic: Option<(String, String)>,
    identity_pem: Option<Vec<u8>>,
}

impl ResolvedAuth {
    fn resolve(info: &AuthInfo) -> Result<Self, ClientError> {
        let mut auth = ResolvedAuth::default();

        if let Some(exec) = &info.exec {
            let status = run_exec_plugin(exec)?;
            auth.bearer = status.token;
            if let (Some(cert), Some(key)) = (status.client_certificate_data, status.client_key_data) {
                auth.identity_pem = Some([cert.into_bytes(), key.into_bytes()].join(&b'\n'));
            }
            return Ok(auth);
        }

        auth.bearer = match (&info.token, &info.token_file) {
            (Some(token), _) if !token.is_empty() => Some(token.clone()),
            (_, Some(path)) => Some(String::from_utf8_lossy(&read_file(path)?).trim().to_string()),
            _ => info
                .auth_provider
                .as_ref()
                .and_then(|provider| provider.config.get("id-token"))
                .filter(|token| !token.is_empty())
                .cloned(),
        };

        if let (Some(username), Some(password)) = (&info.username, &info.password) {
            auth.basic = Some((username.clone(), password.clone()));
        }

        let cert = match (&info.client_certificate_data, &info.client_certificate) {
            (Some(data), _) => Some(data.clone()),
            (None, Some(path)) => Some(read_file(path)?),
            (None, None) => None,
        };
        let key = match (&info.client_key_data, &info.client_key) {
            (Some(data), _) => Some(data.clone()),
            (None, Some(path)) => Some(read_file(path)?),
            (None, None) => None,
        };
        if let (Some(cert), Some(key)) = (cert, key) {
            auth.identity_pem = Some([cert, key].join(&b'\n'));
        }

        Ok(auth)
    }
}

#[derive(Debug, Deserialize)]
struct ExecCredential {
    status: Option<ExecCredentialStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecCredentialStatus {
    token: Option<String>,
    client_certificate_data: Option<String>,
    client_key_data: Option<String>,
}

/// Runs an exec credential plugin the way kubectl does and returns the
/// credential it prints.
fn run_exec_plugin(exec: &ExecConfig) -> Result<ExecCredentialStatus, ClientError> {
    let interactive = exec.interactive_mode.as_deref() != Some("Never") && std::io::stdin().is_terminal();
    let exec_info = serde_json::json!({
        "apiVersion": exec.api_version,
        "kind": "ExecCredential",
        "spec": { "interactive": interactive },
    });

    debug!(command = %exec.command, "running credential plugin");
    let output = Command::new(&exec.command)
        .args(&exec.args)
        .envs(exec.env.iter().map(|var| (&var.name, &var.value)))
        .env("KUBERNETES_EXEC_INFO", exec_info.to_string())
        .stdin(if interactive { Stdio::inherit() } else { Stdio::null() })
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| ClientError::ExecPlugin {
            command: exec.command.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ClientError::ExecPlugin {
            command: exec.command.clone(),
            message: format!("exited with {}", output.status),
        });
    }

    let credential: ExecCredential =
        serde_json::from_slice(&output.stdout).map_err(|e| ClientError::ExecPlugin {
            command: exec.command.clone(),
            message: format!("invalid ExecCredential output: {}", e),
        })?;
    credential.status.ok_or_else(|| ClientError::ExecPlugin {
        command: exec.command.clone(),
        message: "ExecCredential has no status".to_string(),
    })
}

fn read_file(path: &str) -> Result<Vec<u8>, ClientError> {
    let expanded = shellexpand::tilde(path);
    fs::read(expanded.as_ref()).map_err(|source| ClientError::Read {
        path: path.to_string(),
        source,
    })
}
