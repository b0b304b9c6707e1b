use clap::{Parser, ValueEnum};

use restart_core::build::BuildInfo;
use restart_core::config::{PluginConfig, RawSettings};
use restart_k8s::client::create_client;
use restart_k8s::restart::WorkloadRestarter;

#[derive(Parser)]
#[command(
    name = "kube-restart",
    about = "Restart a Kubernetes workload by deleting the pods its controller owns",
    version
)]
struct Cli {
    /// Kubernetes API server address
    #[arg(long, env = "KUBE_SERVER")]
    server: Option<String>,

    /// Base64-encoded certificate authority data
    #[arg(long, env = "KUBE_CA", hide_env_values = true)]
    ca: Option<String>,

    /// Bearer token
    #[arg(long, env = "KUBE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Namespace of the workload [default: default]
    #[arg(long, env = "KUBE_NAMESPACE")]
    namespace: Option<String>,

    /// Workload kind: Deployment, StatefulSet or DaemonSet
    #[arg(long, env = "KUBE_KIND")]
    kind: Option<String>,

    /// Workload name
    #[arg(long, env = "KUBE_WORKLOAD")]
    workload: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Cli {
    fn settings(&self) -> RawSettings {
        RawSettings {
            server: self.server.clone(),
            ca: self.ca.clone(),
            token: self.token.clone(),
            namespace: self.namespace.clone(),
            kind: self.kind.clone(),
            workload: self.workload.clone(),
        }
    }
}

fn init_tracing(verbose: u8, format: LogFormat) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let build = BuildInfo::from_vars(std::env::vars());
    tracing::debug!(
        repo = ?build.repo(),
        build = ?build.number,
        commit = ?build.commit,
        branch = ?build.branch,
        event = ?build.event,
        link = ?build.link,
        "Pipeline context"
    );

    let settings = cli.settings().or(RawSettings::from_vars(std::env::vars()));
    let config = PluginConfig::resolve(settings)?;
    tracing::info!(
        server = %config.server(),
        namespace = %config.namespace(),
        kind = %config.kind(),
        workload = %config.workload(),
        "Configuration resolved"
    );

    let client = create_client(&config).await?;
    let outcome = WorkloadRestarter::new(client).restart(&config).await?;

    tracing::info!(
        kind = %outcome.kind,
        namespace = %outcome.namespace,
        workload = %outcome.workload,
        selector = %outcome.selector,
        deleted = ?outcome.deleted,
        "Workload restart requested"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Restart failed");
        return Err(e);
    }
    Ok(())
}
