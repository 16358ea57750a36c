use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args};
use serde::Serialize;
use tracing::{debug, info};

use crate::client::ClusterClient;
use crate::cluster_version;
use crate::greenhouse::{ApiSource, FileSource, RecordSource};
use crate::kubeconfig::KubeconfigStore;
use crate::settings::{self, Settings};
use crate::sync::exec_args::DEFAULT_HELPER_COMMAND;
use crate::sync::reconcile::DEFAULT_PREFIX;
use crate::sync::{normalize, reconcile, ExecHelper, ReconcileOptions, ReconcileReport};

#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Kubeconfig file for the Greenhouse cluster [default: ~/.kube/config]
    #[arg(short = 'k', long, env = "CLOUDCTL_GREENHOUSE_CLUSTER_KUBECONFIG")]
    pub greenhouse_cluster_kubeconfig: Option<String>,

    /// Context in the Greenhouse kubeconfig (uses its current context if omitted)
    #[arg(short = 'c', long, env = "CLOUDCTL_GREENHOUSE_CLUSTER_CONTEXT")]
    pub greenhouse_cluster_context: Option<String>,

    /// Greenhouse namespace, the same value as the Greenhouse organization
    #[arg(short = 'n', long, env = "CLOUDCTL_GREENHOUSE_CLUSTER_NAMESPACE")]
    pub greenhouse_cluster_namespace: Option<String>,

    /// Kubeconfig file the remote clusters are merged into [default: ~/.kube/config]
    #[arg(short = 'r', long, env = "CLOUDCTL_REMOTE_CLUSTER_KUBECONFIG")]
    pub remote_cluster_kubeconfig: Option<String>,

    /// Sync only this remote cluster instead of the whole namespace
    #[arg(long, env = "CLOUDCTL_REMOTE_CLUSTER_NAME")]
    pub remote_cluster_name: Option<String>,

    /// Prefix that marks the kubeconfig entries managed by cloudctl [default: cloudctl]
    #[arg(long, env = "CLOUDCTL_PREFIX")]
    pub prefix: Option<String>,

    /// Store identical users once so a single login serves every cluster [default: true]
    #[arg(
        long,
        env = "CLOUDCTL_MERGE_IDENTICAL_USERS",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub merge_identical_users: Option<bool>,

    /// Turn oidc auth-provider users into exec users for a kubelogin-style helper
    #[arg(long, env = "CLOUDCTL_EXEC_PLUGIN")]
    pub exec_plugin: bool,

    /// Helper command used by exec users [default: kubelogin]
    #[arg(long, env = "CLOUDCTL_EXEC_COMMAND")]
    pub exec_command: Option<String>,

    /// Base directory for the helper's token cache [default: ~/.kube/cache/oidc-login]
    #[arg(long, env = "CLOUDCTL_TOKEN_CACHE_DIR")]
    pub token_cache_dir: Option<String>,

    /// Extra argument passed to the helper (repeatable)
    #[arg(long = "exec-arg", allow_hyphen_values = true)]
    pub exec_args: Vec<String>,

    /// Read ClusterKubeconfigs from a YAML or JSON file instead of the Greenhouse API
    #[arg(long, env = "CLOUDCTL_FROM_FILE")]
    pub from_file: Option<String>,

    /// Show what would change without writing the kubeconfig
    #[arg(long)]
    pub dry_run: bool,
}

/// Everything `sync` needs once flags, settings and defaults are combined.
struct SyncPlan {
    source: Box<dyn RecordSource>,
    target: PathBuf,
    options: ReconcileOptions,
}

impl SyncPlan {
    fn resolve(args: &SyncArgs, settings: &Settings) -> Result<Self> {
        let sync = &settings.sync;
        let exec = &settings.exec;

        let target = match args.remote_cluster_kubeconfig.as_ref().or(sync.remote_kubeconfig.as_ref()) {
            Some(path) => settings::expand_path(path),
            None => settings::default_kubeconfig_path()?,
        };

        let exec_helper = if args.exec_plugin || exec.enabled.unwrap_or(false) {
            let cache_dir = match args.token_cache_dir.as_ref().or(exec.cache_dir.as_ref()) {
                Some(dir) => settings::expand_path(dir),
                None => settings::default_token_cache_dir()?,
            };
            let mut helper = ExecHelper::new(cache_dir.to_string_lossy());
            helper.command = args
                .exec_command
                .clone()
                .or_else(|| exec.command.clone())
                .unwrap_or_else(|| DEFAULT_HELPER_COMMAND.to_string());
            helper.extra_args = if args.exec_args.is_empty() {
                exec.extra_args.clone()
            } else {
                args.exec_args.clone()
            };
            Some(helper)
        } else {
            None
        };

        let options = ReconcileOptions {
            prefix: args
                .prefix
                .clone()
                .or_else(|| sync.prefix.clone())
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            dedup: args
                .merge_identical_users
                .or(sync.merge_identical_users)
                .unwrap_or(true),
            exec_helper,
        };
        if options.prefix.is_empty() {
            bail!("prefix must not be empty");
        }

        let source: Box<dyn RecordSource> = match &args.from_file {
            Some(path) => Box::new(FileSource::new(
                settings::expand_path(path),
                args.remote_cluster_name.clone(),
            )),
            None => {
                let namespace = args
                    .greenhouse_cluster_namespace
                    .clone()
                    .or_else(|| sync.namespace.clone())
                    .filter(|ns| !ns.is_empty())
                    .context(
                        "Greenhouse namespace is required: pass --greenhouse-cluster-namespace or set [sync] namespace",
                    )?;
                let kubeconfig = match args
                    .greenhouse_cluster_kubeconfig
                    .as_ref()
                    .or(sync.greenhouse_kubeconfig.as_ref())
                {
                    Some(path) => settings::expand_path(path),
                    None => settings::default_kubeconfig_path()?,
                };
                let context = args
                    .greenhouse_cluster_context
                    .as_deref()
                    .or(sync.context.as_deref());

                let config = KubeconfigStore::new(&kubeconfig).load()?;
                let client = ClusterClient::from_kubeconfig(&config, context).with_context(|| {
                    format!("Failed to build greenhouse client from {}", kubeconfig.display())
                })?;
                Box::new(ApiSource::new(client, namespace, args.remote_cluster_name.clone()))
            }
        };

        Ok(Self {
            source,
            target,
            options,
        })
    }
}

pub fn cmd_sync(args: &SyncArgs, settings: &Settings) -> Result<()> {
    let plan = SyncPlan::resolve(args, settings)?;
    debug!(source = %plan.source.describe(), target = %plan.target.display(), "resolved sync plan");

    let records = plan.source.fetch()?;
    if records.is_empty() {
        eprintln!("No ClusterKubeconfigs found to sync.");
        return Ok(());
    }
    info!(count = records.len(), source = %plan.source.describe(), "fetched ClusterKubeconfigs");

    let store = KubeconfigStore::new(&plan.target);
    let mut local = store.load()?;
    let incoming = normalize(&records);

    let report = reconcile(&mut local, &incoming, &plan.options)
        .context("Failed to merge ClusterKubeconfigs")?;

    if args.dry_run {
        print_report(&report);
        eprintln!("Dry run: {} was not modified.", store.path().display());
        return Ok(());
    }

    if !report.has_changes() {
        eprintln!("{} is already up to date.", store.path().display());
        return Ok(());
    }

    store.save(&local)?;
    eprintln!("Successfully synced and merged into your local config.");
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    println!("clusters: {}", report.clusters);
    println!("users:    {}", report.users);
    println!("contexts: {}", report.contexts);
}

pub fn cmd_cluster_version(kubeconfig: Option<&str>, context: Option<&str>) -> Result<()> {
    let path = match kubeconfig {
        Some(path) => settings::expand_path(path),
        None => settings::default_kubeconfig_path()?,
    };
    let config = KubeconfigStore::new(&path).load()?;
    let client = ClusterClient::from_kubeconfig(&config, context)
        .with_context(|| format!("Failed to build kubeconfig with context {}", context.unwrap_or("<current>")))?;

    let info = cluster_version::probe(&client)?;
    println!("{}", cluster_version::clean_version(&info.git_version));
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    version: &'static str,
    git_commit: &'static str,
    build_date: &'static str,
    compiler: &'static str,
    platform: String,
}

impl VersionInfo {
    fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            git_commit: option_env!("CLOUDCTL_GIT_COMMIT").unwrap_or("unknown"),
            build_date: option_env!("CLOUDCTL_BUILD_DATE").unwrap_or("unknown"),
            compiler: "rustc",
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

pub fn cmd_version(short: bool, json: bool) -> Result<()> {
    let info = VersionInfo::current();

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    if short {
        println!("{}", info.version);
        return Ok(());
    }

    println!("cloudctl {}", info.version);
    println!("  git commit: {}", info.git_commit);
    println!("  build date: {}", info.build_date);
    println!("  compiler:   {} {}", info.compiler, info.platform);
    Ok(())
}
