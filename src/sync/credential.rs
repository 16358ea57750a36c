use crate::kubeconfig::{AuthInfo, AuthProviderConfig, ExecConfig};

use super::canonical::{self, Identity};

/// Authentication material for one managed user, in one of the three shapes
/// the tool knows how to merge.
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    Certificate(ClientCertificate),
    AuthProvider(AuthProviderConfig),
    Exec(ExecConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCertificate {
    pub certificate: Vec<u8>,
    pub key: Vec<u8>,
}

impl Credential {
    pub fn canonical_key(&self) -> String {
        match self {
            Credential::Certificate(cert) => cert.canonical_key(),
            Credential::AuthProvider(provider) => provider.canonical_key(),
            Credential::Exec(exec) => exec.canonical_key(),
        }
    }

    /// Same variant and same stable fields. Volatile tokens never count.
    pub fn equivalent(&self, other: &Credential) -> bool {
        match (self, other) {
            (Credential::Certificate(a), Credential::Certificate(b)) => a.equivalent(b),
            (Credential::AuthProvider(a), Credential::AuthProvider(b)) => a.equivalent(b),
            (Credential::Exec(a), Credential::Exec(b)) => a.equivalent(b),
            _ => false,
        }
    }

    /// Keeps `self`'s structure and carries the volatile secrets of
    /// `existing` over it.
    pub fn merge_volatile(self, existing: &Credential) -> Credential {
        match (self, existing) {
            (Credential::AuthProvider(mut incoming), Credential::AuthProvider(local)) => {
                for key in canonical::VOLATILE_PARAMS {
                    if let Some(value) = local.config.get(key) {
                        incoming.config.insert(key.to_string(), value.clone());
                    }
                }
                Credential::AuthProvider(incoming)
            }
            (Credential::Exec(mut incoming), Credential::Exec(local)) => {
                for flag in canonical::VOLATILE_EXEC_FLAGS {
                    let has_flag = |arg: &String| canonical::flag_value(arg, flag).is_some();
                    if let Some(arg) = local.args.iter().find(|arg| has_flag(*arg)) {
                        incoming.args.retain(|arg| !has_flag(arg));
                        incoming.args.push(arg.clone());
                    }
                }
                Credential::Exec(incoming)
            }
            (incoming, _) => incoming,
        }
    }
}

impl From<&AuthInfo> for Credential {
    fn from(info: &AuthInfo) -> Self {
        if let Some(exec) = &info.exec {
            return Credential::Exec(exec.clone());
        }
        // Greenhouse serializes an empty provider for certificate users.
        match info.auth_provider.as_ref().filter(|p| !p.name.is_empty()) {
            Some(provider) => Credential::AuthProvider(provider.clone()),
            None => Credential::Certificate(ClientCertificate {
                certificate: info.client_certificate_data.clone().unwrap_or_default(),
                key: info.client_key_data.clone().unwrap_or_default(),
            }),
        }
    }
}

impl From<Credential> for AuthInfo {
    fn from(credential: Credential) -> Self {
        match credential {
            Credential::Certificate(cert) => AuthInfo {
                client_certificate_data: Some(cert.certificate).filter(|b| !b.is_empty()),
                client_key_data: Some(cert.key).filter(|b| !b.is_empty()),
                ..Default::default()
            },
            Credential::AuthProvider(provider) => AuthInfo {
                auth_provider: Some(provider),
                ..Default::default()
            },
            Credential::Exec(exec) => AuthInfo {
                exec: Some(exec),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn oidc(pairs: &[(&str, &str)]) -> Credential {
        Credential::AuthProvider(AuthProviderConfig {
            name: "oidc".to_string(),
            config: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        })
    }

    #[test]
    fn merge_keeps_local_tokens_and_incoming_structure() {
        let incoming = oidc(&[("client-id", "new"), ("id-token", "fresh")]);
        let local = oidc(&[
            ("client-id", "old"),
            ("id-token", "A"),
            ("refresh-token", "R"),
        ]);

        let merged = incoming.merge_volatile(&local);
        assert_eq!(
            merged,
            oidc(&[("client-id", "new"), ("id-token", "A"), ("refresh-token", "R")])
        );
    }

    #[test]
    fn merge_across_variants_is_a_no_op() {
        let incoming = oidc(&[("client-id", "x")]);
        let local = Credential::Certificate(ClientCertificate::default());
        assert_eq!(incoming.clone().merge_volatile(&local), incoming);
    }

    #[test]
    fn merge_carries_exec_token_flags() {
        let incoming = Credential::Exec(ExecConfig {
            command: "kubelogin".into(),
            args: vec!["get-token".into(), "--oidc-client-id=x".into()],
            ..Default::default()
        });
        let local = Credential::Exec(ExecConfig {
            command: "kubelogin".into(),
            args: vec![
                "get-token".into(),
                "--refresh-token=R".into(),
                "--oidc-client-id=x".into(),
            ],
            ..Default::default()
        });

        let Credential::Exec(merged) = incoming.merge_volatile(&local) else {
            panic!("expected exec credential");
        };
        assert_eq!(
            merged.args,
            vec!["get-token", "--oidc-client-id=x", "--refresh-token=R"]
        );
    }

    #[test]
    fn local_exec_tokens_replace_incoming_ones() {
        let exec = |args: &[&str]| {
            Credential::Exec(ExecConfig {
                command: "kubelogin".into(),
                args: args.iter().map(|a| a.to_string()).collect(),
                ..Default::default()
            })
        };
        let incoming = exec(&["get-token", "--id-token=REMOTE", "--oidc-client-id=x"]);
        let local = exec(&["get-token", "--oidc-client-id=x", "--id-token=LOCAL"]);

        assert_eq!(
            incoming.clone().merge_volatile(&local),
            exec(&["get-token", "--oidc-client-id=x", "--id-token=LOCAL"])
        );

        // Nothing local to keep: the incoming token stays.
        let bare = exec(&["get-token", "--oidc-client-id=x"]);
        assert_eq!(incoming.clone().merge_volatile(&bare), incoming);
    }

    #[test]
    fn empty_provider_name_means_certificate_user() {
        let info = AuthInfo {
            client_certificate_data: Some(b"cert".to_vec()),
            client_key_data: Some(b"key".to_vec()),
            auth_provider: Some(AuthProviderConfig::default()),
            ..Default::default()
        };

        let credential = Credential::from(&info);
        assert_eq!(
            credential,
            Credential::Certificate(ClientCertificate {
                certificate: b"cert".to_vec(),
                key: b"key".to_vec(),
            })
        );

        let written = AuthInfo::from(credential);
        assert!(written.auth_provider.is_none());
        assert_eq!(written.client_key_data.as_deref(), Some(&b"key"[..]));
    }
}
