//! Merges a [`NormalizedConfig`] into a local kubeconfig under a managed
//! name prefix.
//!
//! Clusters and users owned by the tool are stored as `<prefix>:<name>`;
//! contexts keep their remote names and point at the prefixed entries.
//! Anything outside the prefix belongs to the user and is left alone.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, info};

use crate::kubeconfig::{AuthInfo, Cluster, Context, Kubeconfig};

use super::canonical::managed_auth_name;
use super::credential::Credential;
use super::exec_args::ExecHelper;
use super::normalize::NormalizedConfig;

pub const DEFAULT_PREFIX: &str = "cloudctl";

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("user {user:?} referenced in context {context:?} does not exist")]
    MissingCredential { context: String, user: String },
}

/// Policy for one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub prefix: String,
    /// Store identical users once, under a name derived from their identity.
    pub dedup: bool,
    /// Rewrite oidc auth-provider users into exec users for this helper.
    pub exec_helper: Option<ExecHelper>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            dedup: true,
            exec_helper: None,
        }
    }
}

impl ReconcileOptions {
    pub fn managed_name(&self, remote_name: &str) -> String {
        format!("{}:{}", self.prefix, remote_name)
    }

    pub fn remote_name<'a>(&self, managed_name: &'a str) -> Option<&'a str> {
        managed_name.strip_prefix(&self.prefix)?.strip_prefix(':')
    }

    pub fn is_managed(&self, name: &str) -> bool {
        self.remote_name(name).is_some()
    }

    fn prepare(&self, credential: &Credential) -> Credential {
        match (&self.exec_helper, credential) {
            (Some(helper), Credential::AuthProvider(provider)) if provider.name == "oidc" => {
                Credential::Exec(helper.exec_config(provider))
            }
            _ => credential.clone(),
        }
    }
}

/// Counts for one keyed collection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectionReport {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
}

impl CollectionReport {
    pub fn has_changes(&self) -> bool {
        self.added + self.updated + self.removed > 0
    }
}

impl fmt::Display for CollectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} updated, {} removed, {} unchanged",
            self.added, self.updated, self.removed, self.unchanged
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub clusters: CollectionReport,
    pub users: CollectionReport,
    pub contexts: CollectionReport,
}

impl ReconcileReport {
    pub fn has_changes(&self) -> bool {
        self.clusters.has_changes() || self.users.has_changes() || self.contexts.has_changes()
    }
}

/// Brings the managed part of `local` in line with `incoming`.
///
/// The desired state of all three collections is computed before `local`
/// is touched, so a failing pass leaves `local` unmodified.
pub fn reconcile(
    local: &mut Kubeconfig,
    incoming: &NormalizedConfig,
    options: &ReconcileOptions,
) -> Result<ReconcileReport, ReconcileError> {
    let clusters = desired_clusters(incoming, options);
    let users = desired_users(local, incoming, options);
    let contexts = desired_contexts(incoming, &users.assigned, options)?;

    let clusters = reconcile_collection(
        "cluster",
        &mut local.clusters,
        clusters,
        cluster_unchanged,
        |name, _| options.is_managed(name),
    );

    let users = if options.dedup {
        reconcile_collection(
            "user",
            &mut local.auth_infos,
            users.desired,
            |have, want| have == want,
            |name, _| options.is_managed(name),
        )
    } else {
        reconcile_collection(
            "user",
            &mut local.auth_infos,
            users.desired,
            |have, want| Credential::from(have).equivalent(&Credential::from(want)),
            |name, _| options.is_managed(name),
        )
    };

    let contexts = reconcile_collection(
        "context",
        &mut local.contexts,
        contexts,
        context_unchanged,
        |_, context| options.is_managed(&context.cluster) || options.is_managed(&context.user),
    );

    let report = ReconcileReport {
        clusters,
        users,
        contexts,
    };
    info!(
        clusters = %report.clusters,
        users = %report.users,
        contexts = %report.contexts,
        "reconciled kubeconfig"
    );
    Ok(report)
}

/// Upserts `desired` into `local` and drops owned entries that are no longer
/// desired. Entries for which `unchanged` holds keep their local value.
fn reconcile_collection<T>(
    kind: &str,
    local: &mut BTreeMap<String, T>,
    desired: BTreeMap<String, T>,
    unchanged: impl Fn(&T, &T) -> bool,
    owned: impl Fn(&str, &T) -> bool,
) -> CollectionReport {
    let mut report = CollectionReport::default();
    let desired_names: BTreeSet<String> = desired.keys().cloned().collect();

    for (name, want) in desired {
        match local.get(&name) {
            Some(have) if unchanged(have, &want) => report.unchanged += 1,
            Some(_) => {
                debug!(kind, %name, "updating");
                local.insert(name, want);
                report.updated += 1;
            }
            None => {
                debug!(kind, %name, "adding");
                local.insert(name, want);
                report.added += 1;
            }
        }
    }

    local.retain(|name, value| {
        let stale = owned(name.as_str(), &*value) && !desired_names.contains(name);
        if stale {
            debug!(kind, %name, "removing");
            report.removed += 1;
        }
        !stale
    });

    report
}

fn desired_clusters(
    incoming: &NormalizedConfig,
    options: &ReconcileOptions,
) -> BTreeMap<String, Cluster> {
    incoming
        .clusters
        .iter()
        .map(|(name, cluster)| (options.managed_name(name), cluster.clone()))
        .collect()
}

fn cluster_unchanged(have: &Cluster, want: &Cluster) -> bool {
    have.server == want.server
        && have.certificate_authority_data == want.certificate_authority_data
        && have.labels() == want.labels()
}

fn context_unchanged(have: &Context, want: &Context) -> bool {
    have.cluster == want.cluster && have.user == want.user && have.namespace == want.namespace
}

struct DesiredUsers {
    desired: BTreeMap<String, AuthInfo>,
    /// Remote user name to the managed name it is stored under.
    assigned: BTreeMap<String, String>,
}

fn desired_users(
    local: &Kubeconfig,
    incoming: &NormalizedConfig,
    options: &ReconcileOptions,
) -> DesiredUsers {
    let mut identities = IdentityIndex::default();
    let mut desired = BTreeMap::new();
    let mut assigned = BTreeMap::new();

    for (remote_name, credential) in &incoming.credentials {
        let credential = options.prepare(credential);
        let managed_name = if options.dedup {
            identities.assign(&credential, &options.prefix)
        } else {
            options.managed_name(remote_name)
        };
        assigned.insert(remote_name.clone(), managed_name.clone());

        // Equivalent users share a name; the first one seen is kept.
        if desired.contains_key(&managed_name) {
            debug!(user = %remote_name, managed = %managed_name, "merged with identical user");
            continue;
        }

        let merged = match local.auth_infos.get(&managed_name) {
            Some(existing) => credential.merge_volatile(&Credential::from(existing)),
            None => credential,
        };
        desired.insert(managed_name, AuthInfo::from(merged));
    }

    DesiredUsers { desired, assigned }
}

fn desired_contexts(
    incoming: &NormalizedConfig,
    assigned_users: &BTreeMap<String, String>,
    options: &ReconcileOptions,
) -> Result<BTreeMap<String, Context>, ReconcileError> {
    incoming
        .contexts
        .iter()
        .map(|(name, context)| {
            let user = assigned_users.get(&context.user).ok_or_else(|| {
                ReconcileError::MissingCredential {
                    context: name.clone(),
                    user: context.user.clone(),
                }
            })?;
            let context = Context {
                cluster: options.managed_name(&context.cluster),
                user: user.clone(),
                namespace: context.namespace.clone(),
                ..Default::default()
            };
            Ok((name.clone(), context))
        })
        .collect()
}

/// Identities seen during one pass. A credential equivalent to one already
/// seen reuses its name, so scope order cannot split an identity.
#[derive(Default)]
struct IdentityIndex {
    seen: Vec<(Credential, String)>,
}

impl IdentityIndex {
    fn assign(&mut self, credential: &Credential, prefix: &str) -> String {
        if let Some((_, name)) = self.seen.iter().find(|(c, _)| c.equivalent(credential)) {
            return name.clone();
        }
        let name = managed_auth_name(prefix, &credential.canonical_key());
        self.seen.push((credential.clone(), name.clone()));
        name
    }
}
