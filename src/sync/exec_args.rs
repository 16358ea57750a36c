//! Argument vectors for the kubelogin `get-token` credential helper.

use std::collections::BTreeMap;

use crate::kubeconfig::{AuthProviderConfig, ExecConfig};

use super::canonical::{
    split_scopes, CLIENT_ID, CLIENT_SECRET, EXTRA_PARAMS, EXTRA_SCOPES, ISSUER_URL,
};

pub const GET_TOKEN: &str = "get-token";
pub const ISSUER_FLAG: &str = "--oidc-issuer-url";
pub const CLIENT_ID_FLAG: &str = "--oidc-client-id";
pub const CLIENT_SECRET_FLAG: &str = "--oidc-client-secret";
pub const SCOPE_FLAG: &str = "--oidc-extra-scope";
pub const EXTRA_PARAMS_FLAG: &str = "--oidc-auth-request-extra-params";
pub const TOKEN_CACHE_DIR_FLAG: &str = "--token-cache-dir";

pub const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";
pub const DEFAULT_HELPER_COMMAND: &str = "kubelogin";

const CONNECTOR_ID: &str = "connector_id";

/// Builds the helper's argument vector from legacy oidc auth-provider
/// parameters. Missing or empty parameters produce no flag.
pub fn synthesize(
    params: &BTreeMap<String, String>,
    extra_args: &[String],
    cache_base_dir: &str,
) -> Vec<String> {
    let param = |key: &str| params.get(key).map(String::as_str).unwrap_or("");

    let mut args = vec![GET_TOKEN.to_string()];
    for (key, flag) in [
        (ISSUER_URL, ISSUER_FLAG),
        (CLIENT_ID, CLIENT_ID_FLAG),
        (CLIENT_SECRET, CLIENT_SECRET_FLAG),
    ] {
        let value = param(key);
        if !value.is_empty() {
            args.push(format!("{}={}", flag, value));
        }
    }
    args.extend(split_scopes(param(EXTRA_SCOPES)).map(|scope| format!("{}={}", SCOPE_FLAG, scope)));

    let extra_params = param(EXTRA_PARAMS);
    if !extra_params.is_empty() {
        args.push(format!("{}={}", EXTRA_PARAMS_FLAG, extra_params));
    }
    args.push(format!(
        "{}={}",
        TOKEN_CACHE_DIR_FLAG,
        token_cache_dir(cache_base_dir, extra_params)
    ));

    args.extend(extra_args.iter().cloned());
    args
}

/// `connector_id` value from a `k=v,k=v` extra-params string.
pub fn connector_id(extra_params: &str) -> Option<&str> {
    extra_params
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == CONNECTOR_ID)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Token caches are kept apart per identity-provider connector.
pub fn token_cache_dir(cache_base_dir: &str, extra_params: &str) -> String {
    match connector_id(extra_params) {
        Some(id) => format!("{}/{}", cache_base_dir.trim_end_matches('/'), id),
        None => cache_base_dir.to_string(),
    }
}

/// How oidc auth-provider users are turned into exec users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecHelper {
    pub command: String,
    pub cache_base_dir: String,
    pub extra_args: Vec<String>,
}

impl ExecHelper {
    pub fn new(cache_base_dir: impl Into<String>) -> Self {
        Self {
            command: DEFAULT_HELPER_COMMAND.to_string(),
            cache_base_dir: cache_base_dir.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn exec_config(&self, provider: &AuthProviderConfig) -> ExecConfig {
        ExecConfig {
            api_version: EXEC_API_VERSION.to_string(),
            command: self.command.clone(),
            args: synthesize(&provider.config, &self.extra_args, &self.cache_base_dir),
            interactive_mode: Some("IfAvailable".to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn full_parameter_set() {
        let args = synthesize(
            &params(&[
                ("idp-issuer-url", "https://dex.example.com"),
                ("client-id", "kube"),
                ("client-secret", "s3cret"),
                ("extra-scopes", "groups,email"),
                ("auth-request-extra-params", "connector_id=ldap"),
                ("id-token", "ignored"),
            ]),
            &["-v1".to_string()],
            "/home/me/.kube/cache/oidc-login",
        );

        assert_eq!(
            args,
            vec![
                "get-token",
                "--oidc-issuer-url=https://dex.example.com",
                "--oidc-client-id=kube",
                "--oidc-client-secret=s3cret",
                "--oidc-extra-scope=groups",
                "--oidc-extra-scope=email",
                "--oidc-auth-request-extra-params=connector_id=ldap",
                "--token-cache-dir=/home/me/.kube/cache/oidc-login/ldap",
                "-v1",
            ]
        );
    }

    #[test]
    fn connector_scoped_cache_dir() {
        let args = synthesize(
            &params(&[("auth-request-extra-params", "foo=bar,connector_id=XYZ")]),
            &[],
            "/base",
        );
        assert!(args.contains(&"--token-cache-dir=/base/XYZ".to_string()));
        assert!(args.contains(&"--oidc-auth-request-extra-params=foo=bar,connector_id=XYZ".to_string()));

        let args = synthesize(&params(&[("auth-request-extra-params", "foo=bar")]), &[], "/base");
        assert!(args.contains(&"--token-cache-dir=/base".to_string()));
    }

    #[test]
    fn scopes_expand_to_one_flag_each() {
        let args = synthesize(&params(&[("extra-scopes", "a, b ,c")]), &[], "/base");
        let scopes: Vec<&str> = args
            .iter()
            .filter(|arg| arg.starts_with(SCOPE_FLAG))
            .map(String::as_str)
            .collect();
        assert_eq!(
            scopes,
            vec![
                "--oidc-extra-scope=a",
                "--oidc-extra-scope=b",
                "--oidc-extra-scope=c"
            ]
        );
    }

    #[test]
    fn empty_input_still_names_subcommand_and_cache() {
        assert_eq!(
            synthesize(&BTreeMap::new(), &[], "/base"),
            vec!["get-token", "--token-cache-dir=/base"]
        );
    }

    #[test]
    fn extra_args_come_last_in_given_order() {
        let extra = vec!["--skip-open-browser".to_string(), "-v2".to_string()];
        let args = synthesize(&params(&[("client-id", "kube")]), &extra, "/base");
        assert_eq!(&args[args.len() - 2..], extra.as_slice());
    }

    #[test]
    fn connector_id_lookup() {
        assert_eq!(connector_id("connector_id=abc"), Some("abc"));
        assert_eq!(connector_id("a=b, connector_id = abc ,c=d"), Some("abc"));
        assert_eq!(connector_id("connector_id="), None);
        assert_eq!(connector_id("my_connector_id=abc"), None);
        assert_eq!(connector_id(""), None);
    }

    #[test]
    fn helper_builds_exec_config() {
        let mut helper = ExecHelper::new("/base");
        helper.extra_args = vec!["-v1".to_string()];
        let exec = helper.exec_config(&AuthProviderConfig {
            name: "oidc".to_string(),
            config: params(&[("client-id", "kube")]),
        });

        assert_eq!(exec.command, "kubelogin");
        assert_eq!(exec.api_version, EXEC_API_VERSION);
        assert_eq!(
            exec.args,
            vec!["get-token", "--oidc-client-id=kube", "--token-cache-dir=/base", "-v1"]
        );
    }
}
