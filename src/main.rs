mod analysis;
mod config;
mod emitter;
mod github;
mod pipeline;
mod pr;
mod report;
mod server;
#[cfg(test)]
mod test_support;

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use analysis::{Analyzer, PlaceholderAnalyzer};
use config::Config;
use emitter::{Delivery, EmitterError};
use github::GitHubClient;
use pipeline::ReviewOptions;
use pr::PrUrl;
use server::AppState;

/// Review Relay — receives GitHub pull request webhooks, reviews the changed
/// files and posts the review back to the pull request as a comment.
///
/// At start-up it also sends a synthetic "opened" event for the given pull
/// request to the webhook receiver, so a single invocation reviews that PR.
#[derive(Parser, Debug)]
#[command(name = "review-relay", version, about)]
struct Cli {
    /// GitHub access token used for API calls
    token: String,

    /// Pull request URL (e.g., https://github.com/org/repo/pull/42)
    pr_url: String,

    /// Path to the TOML configuration file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Port for the webhook receiver, overriding config and SERVER_PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!(path = %cli.config.display(), "loading configuration");
    let mut config = Config::load(&cli.config)?;
    config.github.token = Some(cli.token);
    config.emitter.pull_request_url = Some(cli.pr_url);
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let pr_url = pr::parse_pr_url(config.pull_request_url()?)?;
    info!(owner = %pr_url.owner, repo = %pr_url.repo, pr = pr_url.pr_number, "parsed PR URL");

    let client = GitHubClient::new(&config.github, config.github_token()?)?;
    let analyzer: Arc<dyn Analyzer> = Arc::new(PlaceholderAnalyzer::from_config(&config.review));

    // `shutdown` starts the graceful drain; `abort` stops in-flight work once
    // the drain has run out of time.
    let shutdown = CancellationToken::new();
    let abort = CancellationToken::new();

    let state = Arc::new(AppState::new(
        client,
        analyzer,
        ReviewOptions::from(&config.review),
        abort.clone(),
    ));
    let tasks = state.tasks.clone();
    let app = server::router(state, &config.server.webhook_path);

    let listener = TcpListener::bind(("0.0.0.0", config.server.port)).await?;
    let bound_port = listener.local_addr()?.port();
    let mut server_task = tokio::spawn(server::serve(
        listener,
        app,
        tasks,
        shutdown.clone(),
        abort.clone(),
        config.server.shutdown_timeout(),
    ));

    // Spawned only after the listener is bound, so the delivery cannot race start-up.
    let emitter_task = if config.emitter.enabled {
        let target = config.emitter_target_url(bound_port);
        Some(spawn_emitter(config.clone(), pr_url, target, abort.clone()))
    } else {
        info!("demo emitter disabled");
        None
    };

    let server_result = tokio::select! {
        result = &mut server_task => result,
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            shutdown.cancel();
            server_task.await
        }
    };

    if !matches!(server_result, Ok(Ok(()))) {
        abort.cancel();
    }

    // Already reported by the task itself; joined so it never outlives main.
    if let Some(task) = emitter_task {
        let _ = task.await?;
    }

    server_result??;
    info!("server exited properly");
    Ok(())
}

/// Run the demo emitter in the background and report its outcome as soon
/// as the delivery settles.
fn spawn_emitter(
    config: Config,
    pr_url: PrUrl,
    target: String,
    cancel: CancellationToken,
) -> JoinHandle<Result<Delivery, EmitterError>> {
    tokio::spawn(async move {
        let result = run_emitter(&config, &pr_url, &target, &cancel).await;
        report_delivery(&result);
        result
    })
}

/// Deliver the synthetic pull request event for `pr_url` to `target`.
async fn run_emitter(
    config: &Config,
    pr_url: &PrUrl,
    target: &str,
    cancel: &CancellationToken,
) -> Result<Delivery, EmitterError> {
    let client = reqwest::Client::builder()
        .timeout(config.emitter.timeout())
        .build()
        .map_err(|source| EmitterError::Request {
            url: target.to_string(),
            source,
        })?;

    let payload = emitter::build_demo_payload(pr_url, &config.emitter);
    info!(target = %target, "sending demo pull_request event");
    emitter::emit(&client, target, &config.emitter.signature, &payload, cancel).await
}

fn report_delivery(result: &Result<Delivery, EmitterError>) {
    match result {
        Ok(delivery) => {
            println!(
                "{} {} {}",
                "Webhook delivered:".green().bold(),
                delivery.status,
                delivery.body
            );
        }
        Err(e) => {
            error!(error = %e, "demo webhook delivery failed");
            println!("{} {}", "Webhook delivery failed:".red().bold(), e);
        }
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
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
