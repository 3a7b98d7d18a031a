//! CLI command handlers

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::backend::{
    BackendKind, ContainerBackend, ConvergenceBackend, DockerCli, GitOpsBackend,
    HostConfigBackend,
};
use crate::config::{Settings, SettingsLoader, SettingsOverrides};
use crate::coordinator::OmahaClient;
use crate::descriptor::{self, DescriptorFormat};
use crate::identity::resolve_instance_id;
use crate::kube::{self, KubeStore, ResourceStore};
use crate::readiness::ReadinessWaiter;
use crate::reconcile::ReconciliationLoop;

/// Flags shared by every update mode
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Nebraska server URL (Omaha endpoint)
    #[arg(long = "nebraska-server", alias = "update-server")]
    pub server: Option<String>,

    /// Nebraska assigned application ID
    #[arg(long)]
    pub app_id: Option<String>,

    /// Channel to subscribe to for this application [stable | beta | alpha]
    #[arg(long)]
    pub channel: Option<String>,

    /// Use a random instance id (testing only)
    #[arg(long)]
    pub dev: bool,

    /// Path to kubeconfig file
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Fixed instance id reported to Nebraska
    #[arg(long)]
    pub instance_id: Option<String>,

    /// Settings file (defaults to ~/.config/nua/config.yaml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CommonArgs {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            server: self.server.clone(),
            app_id: self.app_id.clone(),
            channel: self.channel.clone(),
            dev: self.dev,
            kubeconfig: self.kubeconfig.clone(),
            instance_id: self.instance_id.clone(),
            ..Default::default()
        }
    }
}

/// Manage Kubernetes updates through Flux
#[derive(Args, Debug, Clone)]
pub struct KubernetesArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Polling interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// Encoding of the update descriptor
    #[arg(long, value_enum)]
    pub descriptor_format: Option<DescriptorFormat>,
}

/// Manage node updates (Docker container or env file)
#[derive(Args, Debug, Clone)]
pub struct NodeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Polling interval in minutes
    #[arg(long)]
    pub interval: Option<u64>,

    /// Enable docker mode
    #[arg(long, short = 'd')]
    pub docker: bool,

    /// Env file holding VERSION for the host service
    #[arg(long)]
    pub envpath: Option<PathBuf>,
}

pub async fn run_kubernetes(args: KubernetesArgs) -> Result<()> {
    let overrides = SettingsOverrides {
        backend: Some(BackendKind::GitOps),
        interval_seconds: args.interval,
        descriptor_format: args.descriptor_format,
        ..args.common.overrides()
    };
    let settings = SettingsLoader::load(args.common.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;

    let client = kube::create_client(settings.kubeconfig.as_deref()).await?;
    let store: Arc<dyn ResourceStore> = Arc::new(KubeStore::new(client));
    let instance_id = resolve_instance_id(
        settings.instance_id.as_deref(),
        settings.dev,
        Some(store.as_ref()),
    )
    .await
    .context("retrieving cluster id")?;

    let waiter = ReadinessWaiter::new(store.clone())
        .with_interval(settings.readiness.interval())
        .with_timeout(settings.readiness.timeout());
    let http = descriptor::http_client(descriptor::FETCH_TIMEOUT)
        .context("building descriptor HTTP client")?;
    let backend = GitOpsBackend::new(store, waiter, settings.descriptor_format, http);

    run_loop(&settings, instance_id, backend).await
}

pub async fn run_node(args: NodeArgs) -> Result<()> {
    let backend = if args.docker {
        BackendKind::Container
    } else {
        BackendKind::HostConfig
    };
    let overrides = SettingsOverrides {
        backend: Some(backend),
        interval_seconds: args.interval.map(|minutes| minutes.saturating_mul(60)),
        env_path: args.envpath.clone(),
        ..args.common.overrides()
    };
    let settings = SettingsLoader::load(args.common.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;

    let instance_id = node_instance_id(&settings)
        .await
        .context("retrieving cluster id")?;

    match settings.backend {
        BackendKind::Container => {
            let backend = ContainerBackend::new(Arc::new(DockerCli::default()));
            run_loop(&settings, instance_id, backend).await
        }
        _ => {
            let env_path = settings
                .env_path
                .clone()
                .context("Host config mode requires an env file")?;
            run_loop(&settings, instance_id, HostConfigBackend::new(env_path)).await
        }
    }
}

/// Nodes report the identity of the cluster they belong to unless an
/// explicit id or dev mode makes the cluster lookup unnecessary
async fn node_instance_id(settings: &Settings) -> Result<String> {
    if settings.instance_id.is_some() || settings.dev {
        return Ok(resolve_instance_id(settings.instance_id.as_deref(), settings.dev, None).await?);
    }

    let client = kube::create_client(settings.kubeconfig.as_deref()).await?;
    let store = KubeStore::new(client);
    Ok(resolve_instance_id(None, false, Some(&store)).await?)
}

async fn run_loop<B: ConvergenceBackend>(
    settings: &Settings,
    instance_id: String,
    backend: B,
) -> Result<()> {
    let initial_version = backend
        .installed_version()
        .await
        .context("reading installed version")?
        .unwrap_or_else(|| settings.initial_version().to_string());

    let server = settings
        .server
        .clone()
        .context("Nebraska server URL is required")?;
    let app_id = settings
        .app_id
        .clone()
        .context("Application ID is required")?;

    tracing::info!(
        "Instance {} following {} on channel {} at version {}",
        instance_id,
        app_id,
        settings.channel,
        initial_version
    );

    let coordinator = OmahaClient::new(
        server,
        app_id,
        settings.channel.clone(),
        instance_id,
        &initial_version,
    )
    .context("setting up nebraska client")?;

    let mut reconciler =
        ReconciliationLoop::new(coordinator, backend, settings.interval(), &initial_version);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    reconciler.run(shutdown_rx).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
