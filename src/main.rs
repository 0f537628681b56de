use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use gkemc::config::Config;
use gkemc::error::format_api_error;
use gkemc::gcp::client::GcpClient;
use gkemc::reconcile::{Lifecycle, Reconciler};
use gkemc::resource::{
    get_all_resource_keys, get_resource_key, AwsCluster, AwsNodePool, Manifest, Parent, Resource,
    ResourceKey, ResourceKind,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Declarative reconciler for GKE Multi-Cloud resources
#[derive(Parser, Debug)]
#[command(name = "gkemc", version, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long)]
    project: Option<String>,

    /// GKE Multi-Cloud location (GCP region) to use
    #[arg(short, long)]
    location: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update a resource to match a manifest
    Apply {
        manifest: PathBuf,
        /// Fail instead of creating a missing resource
        #[arg(long)]
        block_creation: bool,
        /// Fail if the resource already exists
        #[arg(long)]
        block_acquire: bool,
        /// Fail instead of modifying an existing resource
        #[arg(long)]
        block_modification: bool,
    },
    /// Show the changes apply would make
    Plan { manifest: PathBuf },
    /// Print the current state of a resource
    Get { manifest: PathBuf },
    /// Delete a resource; succeeds if it is already gone
    Delete { manifest: PathBuf },
    /// List resources of a kind
    List {
        /// aws-cluster or aws-node-pool
        kind: String,
        /// Parent cluster, for node pools
        #[arg(long)]
        cluster: Option<String>,
    },
    /// Delete every resource of a kind, optionally filtered by name prefix
    DeleteAll {
        kind: String,
        #[arg(long)]
        cluster: Option<String>,
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> Option<&'static str> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some("error"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Info => Some("info"),
            LogLevel::Debug => Some("debug"),
            LogLevel::Trace => Some("trace"),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(filter) = level.as_filter() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG, when set, refines the flag
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gkemc started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("gkemc").join("gkemc.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".gkemc").join("gkemc.log");
    }
    PathBuf::from("gkemc.log")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            match err.downcast_ref::<gkemc::Error>() {
                Some(cause) => eprintln!("Error: {}\n  {}", err, format_api_error(cause)),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Where a command operates
struct Target {
    project: String,
    location: String,
}

impl Target {
    fn resolve(config: &Config, project: Option<&str>, location: Option<&str>) -> Result<Self> {
        let Some(project) = config.effective_project(project) else {
            bail!("No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project flag");
        };
        let Some(location) = config.effective_location(location) else {
            bail!("No location configured. Set container_aws/location in gcloud or use --location flag");
        };
        Ok(Self { project, location })
    }

    fn parent(&self, key: ResourceKey, cluster: Option<String>) -> Result<Parent> {
        let parent = Parent::new(self.project.as_str(), self.location.as_str());
        match (key.has_parent(), cluster) {
            (true, Some(cluster)) => Ok(parent.with_parent(cluster)),
            (true, None) => bail!("--cluster is required for {}", key.cli_name()),
            (false, _) => Ok(parent),
        }
    }
}

/// Remember the last used project and location
fn remember(config: &mut Config, target: &Target) {
    if config.project.as_deref() != Some(target.project.as_str()) {
        if let Err(e) = config.set_project(&target.project) {
            tracing::warn!("Failed to save project to config: {:#}", e);
        }
    }
    if config.location.as_deref() != Some(target.location.as_str()) {
        if let Err(e) = config.set_location(&target.location) {
            tracing::warn!("Failed to save location to config: {:#}", e);
        }
    }
}

async fn connect(config: &Config, target: &Target) -> Result<Reconciler> {
    let client = GcpClient::new()
        .await
        .context("Failed to initialize GCP credentials")?;
    let base_path = config.base_path(&target.location);
    tracing::info!(
        "Using project: {}, location: {}, endpoint: {}",
        target.project,
        target.location,
        base_path
    );
    Ok(Reconciler::new(Arc::new(client), base_path, config.settings()))
}

fn read_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {:?}", path))?;
    Manifest::from_yaml(&content).with_context(|| format!("Invalid manifest {:?}", path))
}

fn resource_key(kind: &str) -> Result<ResourceKey> {
    get_resource_key(kind).with_context(|| {
        let known: Vec<&str> = get_all_resource_keys().iter().map(|k| k.cli_name()).collect();
        format!("Unknown resource kind {:?} (expected one of: {})", kind, known.join(", "))
    })
}

/// Call a generic command function with the kind `key` names
macro_rules! for_kind {
    ($key:expr, $func:ident ( $($arg:expr),* $(,)? )) => {
        match $key {
            ResourceKey::AwsCluster => $func::<AwsCluster>($($arg),*).await,
            ResourceKey::AwsNodePool => $func::<AwsNodePool>($($arg),*).await,
        }
    };
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();

    match args.command {
        Command::Apply {
            manifest,
            block_creation,
            block_acquire,
            block_modification,
        } => {
            let manifest = read_manifest(&manifest)?;
            let lifecycle = Lifecycle {
                block_creation,
                block_acquire,
                block_modification,
            };
            let (target, reconciler) = open(&mut config, &args.project, &args.location, &manifest).await?;
            for_kind!(manifest.key()?, apply(&reconciler, &manifest, &target, &lifecycle))
        }
        Command::Plan { manifest } => {
            let manifest = read_manifest(&manifest)?;
            let (target, reconciler) = open(&mut config, &args.project, &args.location, &manifest).await?;
            for_kind!(manifest.key()?, plan(&reconciler, &manifest, &target))
        }
        Command::Get { manifest } => {
            let manifest = read_manifest(&manifest)?;
            let (target, reconciler) = open(&mut config, &args.project, &args.location, &manifest).await?;
            for_kind!(manifest.key()?, get(&reconciler, &manifest, &target))
        }
        Command::Delete { manifest } => {
            let manifest = read_manifest(&manifest)?;
            let (target, reconciler) = open(&mut config, &args.project, &args.location, &manifest).await?;
            for_kind!(manifest.key()?, delete(&reconciler, &manifest, &target))
        }
        Command::List { kind, cluster } => {
            let key = resource_key(&kind)?;
            let target = Target::resolve(&config, args.project.as_deref(), args.location.as_deref())?;
            let parent = target.parent(key, cluster)?;
            remember(&mut config, &target);
            let reconciler = connect(&config, &target).await?;
            for_kind!(key, list(&reconciler, parent))
        }
        Command::DeleteAll {
            kind,
            cluster,
            prefix,
        } => {
            let key = resource_key(&kind)?;
            let target = Target::resolve(&config, args.project.as_deref(), args.location.as_deref())?;
            let parent = target.parent(key, cluster)?;
            remember(&mut config, &target);
            let reconciler = connect(&config, &target).await?;
            for_kind!(key, delete_all(&reconciler, parent, prefix.as_deref()))
        }
    }
}

/// Resolve the target for a manifest command and connect
async fn open(
    config: &mut Config,
    project: &Option<String>,
    location: &Option<String>,
    manifest: &Manifest,
) -> Result<(Target, Reconciler)> {
    let target = Target::resolve(
        config,
        manifest.project.as_deref().or(project.as_deref()),
        manifest.location.as_deref().or(location.as_deref()),
    )?;
    remember(config, &target);
    let reconciler = connect(config, &target).await?;
    Ok((target, reconciler))
}

fn desired<K: ResourceKind>(manifest: &Manifest, target: &Target) -> Result<Resource<K>> {
    manifest
        .resource::<K>(Some(&target.project), Some(&target.location))
        .with_context(|| format!("Invalid spec for {} {}", K::KIND, manifest.name))
}

fn print_resource<K: ResourceKind>(resource: &Resource<K>) -> Result<()> {
    let yaml = Manifest::from_resource(resource).to_yaml()?;
    print!("{}", yaml);
    Ok(())
}

async fn apply<K: ResourceKind>(
    reconciler: &Reconciler,
    manifest: &Manifest,
    target: &Target,
    lifecycle: &Lifecycle,
) -> Result<()> {
    let desired = desired::<K>(manifest, target)?;
    let applied = reconciler
        .apply(&desired, lifecycle, None)
        .await
        .with_context(|| format!("Failed to apply {}", desired.describe()))?;
    print_resource(&applied)
}

async fn plan<K: ResourceKind>(reconciler: &Reconciler, manifest: &Manifest, target: &Target) -> Result<()> {
    let desired = desired::<K>(manifest, target)?;
    let dry_run = reconciler
        .plan(&desired, &Lifecycle::default())
        .await
        .with_context(|| format!("Failed to plan {}", desired.describe()))?;

    if !dry_run.exists {
        println!("{} does not exist and will be created.", desired.describe());
        return Ok(());
    }
    if dry_run.diffs.is_empty() {
        println!("{} is up to date.", desired.describe());
        return Ok(());
    }

    println!("Diffs for {}:", desired.describe());
    for diff in &dry_run.diffs {
        println!("  {}", diff);
    }
    for change in &dry_run.changes {
        match change.operation {
            Some(op) => println!("{} updates: {}", op, change.fields.join(", ")),
            None => println!("Recreation required for: {}", change.fields.join(", ")),
        }
    }
    if let Err(e) = &dry_run.plan {
        println!("Plan is infeasible: {}", e);
    }
    Ok(())
}

async fn get<K: ResourceKind>(reconciler: &Reconciler, manifest: &Manifest, target: &Target) -> Result<()> {
    let desired = desired::<K>(manifest, target)?;
    let current = reconciler
        .get_canonical(&desired)
        .await
        .with_context(|| format!("Failed to get {}", desired.describe()))?;
    print_resource(&current)
}

async fn delete<K: ResourceKind>(reconciler: &Reconciler, manifest: &Manifest, target: &Target) -> Result<()> {
    let desired = desired::<K>(manifest, target)?;
    reconciler
        .delete::<K>(&desired.name)
        .await
        .with_context(|| format!("Failed to delete {}", desired.describe()))?;
    println!("Deleted {}", desired.describe());
    Ok(())
}

/// Format an RFC 3339 timestamp for the list table
fn format_time(value: Option<&str>) -> String {
    match value.map(chrono::DateTime::parse_from_rfc3339) {
        Some(Ok(time)) => time.format("%Y-%m-%d %H:%M").to_string(),
        Some(Err(_)) => value.unwrap_or_default().to_string(),
        None => "-".to_string(),
    }
}

async fn list<K: ResourceKind>(reconciler: &Reconciler, parent: Parent) -> Result<()> {
    let page_size = reconciler.settings().page_size;
    let resources = reconciler
        .list::<K>(parent, page_size)
        .await
        .with_context(|| format!("Failed to list {} resources", K::KIND))?;
    let mut resources = Box::pin(resources.into_stream());

    println!("{:<40} {:<16} {}", "NAME", "STATE", "CREATED");
    while let Some(resource) = resources.next().await {
        let resource = resource.with_context(|| format!("Failed to list {} resources", K::KIND))?;
        println!(
            "{:<40} {:<16} {}",
            resource.name.name,
            resource.spec.get_str("state").unwrap_or("-"),
            format_time(resource.spec.get_str("createTime"))
        );
    }
    Ok(())
}

async fn delete_all<K: ResourceKind>(
    reconciler: &Reconciler,
    parent: Parent,
    prefix: Option<&str>,
) -> Result<()> {
    let deleted = reconciler
        .delete_all::<K, _>(parent, |r| prefix.map_or(true, |p| r.name.name.starts_with(p)))
        .await
        .with_context(|| format!("Failed to delete {} resources", K::KIND))?;
    println!("Deleted {} {} resource(s)", deleted, K::KIND);
    Ok(())
}
