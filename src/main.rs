//! mcsnap - export and restore the contents of a memcached server
//!
//! Enumerates the keyspace with `stats items` / `stats cachedump`, fetches
//! every value and writes a versioned snapshot; restore writes the entries
//! that have not yet expired back with their remaining TTL.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use anyhow::Context;
use clap::Parser;
use mcsnap::cli::{Cli, Operation, normalize_path};
use mcsnap::client::Client;
use mcsnap::config::Config;
use mcsnap::executor::TcpExecutor;
use mcsnap::metrics::Metrics;
use mcsnap::snapshot::{self, Snapshot};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code when the batch finished but some items failed
const EXIT_PARTIAL: u8 = 2;

fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    info!("Configuration: {:?}", config);

    // Single command in flight; no need for worker threads
    let runtime = Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async_main(cli, config))
}

async fn async_main(cli: Cli, config: Config) -> anyhow::Result<ExitCode> {
    let cancel_token = CancellationToken::new();
    let metrics = Arc::new(Metrics::new());

    // Setup signal handlers
    let cancel_for_signal = cancel_token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, cancelling...");
            }
            _ = async {
                #[cfg(unix)]
                {
                    use tokio::signal::unix::{signal, SignalKind};
                    match signal(SignalKind::terminate()) {
                        Ok(mut sigterm) => sigterm.recv().await,
                        Err(e) => {
                            warn!("Failed to install SIGTERM handler: {}", e);
                            std::future::pending::<Option<()>>().await
                        }
                    }
                }
                #[cfg(not(unix))]
                {
                    std::future::pending::<Option<()>>().await
                }
            } => {
                info!("Received SIGTERM, cancelling...");
            }
        }
        cancel_for_signal.cancel();
    });

    let result = run(&cli.operation, &config, cancel_token, Arc::clone(&metrics)).await;

    if let Some(path) = &cli.metrics_file
        && let Err(e) = tokio::fs::write(path, metrics.gather()).await
    {
        error!("Failed to write metrics to {}: {}", path.display(), e);
    }

    result
}

async fn run(
    operation: &Operation,
    config: &Config,
    cancel_token: CancellationToken,
    metrics: Arc<Metrics>,
) -> anyhow::Result<ExitCode> {
    match operation {
        Operation::Migrate {
            input,
            output,
            taken_at,
        } => {
            let snapshot = snapshot::legacy::load(input, *taken_at).await?;
            let output = normalize_path(output);
            snapshot.save(&output, config.snapshot.pretty).await?;
            info!("Wrote {} entries to {}", snapshot.len(), output.display());
            Ok(ExitCode::SUCCESS)
        }
        Operation::Export { output } => {
            let output = normalize_path(output);
            let mut client = connect(config, cancel_token, metrics).await?;
            let result = snapshot::export(&mut client).await;
            close(client).await;
            let report = result?;

            if report.snapshot.is_empty() {
                info!("No records to publish");
            } else {
                report
                    .snapshot
                    .save(&output, config.snapshot.pretty)
                    .await?;
                info!(
                    "Exported {} entries to {}",
                    report.snapshot.len(),
                    output.display()
                );
            }
            Ok(exit_code(report.has_errors()))
        }
        Operation::Restore { input } => {
            // Read before connecting so a bad file never touches the server
            let input = normalize_path(input);
            let snapshot = Snapshot::load(&input).await?;
            let mut client = connect(config, cancel_token, metrics).await?;
            let result = snapshot::restore(&mut client, &snapshot).await;
            close(client).await;
            let report = result?;
            Ok(exit_code(report.has_errors()))
        }
        Operation::Version => {
            let mut client = connect(config, cancel_token, metrics).await?;
            let result = client.version().await;
            close(client).await;
            println!("{}", result?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn connect(
    config: &Config,
    cancel_token: CancellationToken,
    metrics: Arc<Metrics>,
) -> anyhow::Result<Client<TcpExecutor>> {
    let client = Client::connect(&config.client, cancel_token)
        .await
        .with_context(|| format!("Unable to connect to {}", config.client.server))?;
    Ok(client.with_metrics(metrics))
}

async fn close(client: Client<TcpExecutor>) {
    if let Err(e) = client.close().await {
        warn!("Error closing connection: {}", e);
    }
}

fn exit_code(partial: bool) -> ExitCode {
    if partial {
        ExitCode::from(EXIT_PARTIAL)
    } else {
        ExitCode::SUCCESS
    }
}
