//! Identity of a credential, independent of short-lived tokens.
//!
//! Two credentials with the same canonical key are treated as the same
//! login. The key never fails to compute: missing parameters count as empty
//! strings.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::kubeconfig::{AuthProviderConfig, ExecConfig};

use super::credential::ClientCertificate;
use super::exec_args;

pub const ID_TOKEN: &str = "id-token";
pub const REFRESH_TOKEN: &str = "refresh-token";
pub const VOLATILE_PARAMS: [&str; 2] = [ID_TOKEN, REFRESH_TOKEN];

/// Exec-argument counterparts of the volatile auth-provider parameters.
pub const VOLATILE_EXEC_FLAGS: [&str; 2] = ["--id-token", "--refresh-token"];

pub const ISSUER_URL: &str = "idp-issuer-url";
pub const CLIENT_ID: &str = "client-id";
pub const CLIENT_SECRET: &str = "client-secret";
pub const EXTRA_PARAMS: &str = "auth-request-extra-params";
pub const EXTRA_SCOPES: &str = "extra-scopes";

/// Per-variant identity rules.
pub trait Identity {
    fn canonical_key(&self) -> String;
    fn equivalent(&self, other: &Self) -> bool;
}

impl Identity for ClientCertificate {
    fn canonical_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.certificate);
        hasher.update(&self.key);
        format!("cert:{:x}", hasher.finalize())
    }

    fn equivalent(&self, other: &Self) -> bool {
        self == other
    }
}

impl Identity for AuthProviderConfig {
    fn canonical_key(&self) -> String {
        let param = |key: &str| self.config.get(key).map(String::as_str).unwrap_or("");
        StableParams {
            issuer: param(ISSUER_URL),
            client_id: param(CLIENT_ID),
            client_secret: param(CLIENT_SECRET),
            extra_params: param(EXTRA_PARAMS),
            scopes: split_scopes(param(EXTRA_SCOPES)).collect(),
        }
        .sorted()
        .encode()
    }

    fn equivalent(&self, other: &Self) -> bool {
        if self.name != other.name {
            return false;
        }
        let stable = |config: &AuthProviderConfig| {
            config
                .config
                .iter()
                .filter(|(key, _)| !VOLATILE_PARAMS.contains(&key.as_str()))
                .filter(|(key, _)| key.as_str() != EXTRA_SCOPES)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect::<Vec<_>>()
        };
        let scopes = |config: &AuthProviderConfig| -> BTreeSet<String> {
            let raw = config.config.get(EXTRA_SCOPES).map(String::as_str).unwrap_or("");
            split_scopes(raw).map(str::to_string).collect()
        };
        stable(self) == stable(other) && scopes(self) == scopes(other)
    }
}

impl Identity for ExecConfig {
    fn canonical_key(&self) -> String {
        let mut params = StableParams::default();
        for arg in &self.args {
            if let Some(value) = flag_value(arg, exec_args::ISSUER_FLAG) {
                params.issuer = value;
            } else if let Some(value) = flag_value(arg, exec_args::CLIENT_ID_FLAG) {
                params.client_id = value;
            } else if let Some(value) = flag_value(arg, exec_args::CLIENT_SECRET_FLAG) {
                params.client_secret = value;
            } else if let Some(value) = flag_value(arg, exec_args::EXTRA_PARAMS_FLAG) {
                params.extra_params = value;
            } else if let Some(value) = flag_value(arg, exec_args::SCOPE_FLAG) {
                params.scopes.push(value.trim());
            }
        }
        let params = params.sorted();
        format!(
            "exec:{};api-version:{};{}",
            self.command,
            self.api_version,
            params.encode()
        )
    }

    fn equivalent(&self, other: &Self) -> bool {
        self.command == other.command
            && self.api_version == other.api_version
            && self.env == other.env
            && self.interactive_mode == other.interactive_mode
            && self.provide_cluster_info == other.provide_cluster_info
            && StableArgs::of(self) == StableArgs::of(other)
    }
}

#[derive(Default)]
struct StableParams<'a> {
    issuer: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    extra_params: &'a str,
    scopes: Vec<&'a str>,
}

impl StableParams<'_> {
    /// Scopes compare as a set, so the key lists them sorted and once.
    fn sorted(mut self) -> Self {
        self.scopes.sort_unstable();
        self.scopes.dedup();
        self
    }

    fn encode(&self) -> String {
        format!(
            "issuer:{};client-id:{};client-secret:{};auth-request-extra-params:{};extra-scopes:{}",
            self.issuer,
            self.client_id,
            self.client_secret,
            self.extra_params,
            self.scopes.join(",")
        )
    }
}

/// Exec arguments minus tokens, with scope flags as a set.
#[derive(PartialEq)]
struct StableArgs<'a> {
    ordered: Vec<&'a str>,
    scopes: BTreeSet<&'a str>,
}

impl<'a> StableArgs<'a> {
    fn of(exec: &'a ExecConfig) -> Self {
        let mut ordered = Vec::new();
        let mut scopes = BTreeSet::new();
        for arg in &exec.args {
            if VOLATILE_EXEC_FLAGS
                .iter()
                .any(|flag| flag_value(arg, flag).is_some())
            {
                continue;
            }
            match flag_value(arg, exec_args::SCOPE_FLAG) {
                Some(scope) => {
                    scopes.insert(scope.trim());
                }
                None => ordered.push(arg.as_str()),
            }
        }
        Self { ordered, scopes }
    }
}

/// Value of a `--flag=value` argument. Other shapes yield `None`.
pub fn flag_value<'a>(arg: &'a str, flag: &str) -> Option<&'a str> {
    arg.strip_prefix(flag)?.strip_prefix('=')
}

/// Comma-separated scope list, trimmed, empty items dropped.
pub fn split_scopes(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|scope| !scope.is_empty())
}

/// `<prefix>:auth-<first 16 hex chars of sha256(key)>`
pub fn managed_auth_name(prefix: &str, canonical_key: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(canonical_key.as_bytes()));
    format!("{}:auth-{}", prefix, &digest[..16])
}
