use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use glimpse::analysis::ProviderSelector;
use glimpse::api::{create_router, AppState};
use glimpse::config::Config;

#[derive(Parser)]
#[command(name = "glimpse")]
#[command(about = "Image analysis gateway for OCR and meter reading")]
struct Args {
    /// Bind address (overrides GLIMPSE_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides GLIMPSE_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Validate provider configuration and exit without serving
    #[arg(long)]
    check_config: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "glimpse=info,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Run the selector checks for both routes. Providers are not contacted.
fn check_config(state: &AppState) -> anyhow::Result<()> {
    let mut failures = 0;

    for (route, selector) in [
        ("ocr", state.ocr.selector()),
        ("meter", state.meter.selector()),
    ] {
        match selector.validate() {
            Ok(family) => tracing::info!("{} route: provider '{}' is configured", route, family),
            Err(e) => {
                tracing::error!("{} route: {}", route, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} route(s) are not configured");
    }
    Ok(())
}

fn log_provider(route: &str, selector: &ProviderSelector) {
    match selector.validate() {
        Ok(family) => tracing::info!("{} route using provider '{}'", route, family),
        Err(e) => tracing::warn!(
            "{} route is not configured ({}) - only mock requests will succeed",
            route,
            e
        ),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    init_tracing();

    let mut config = Config::from_env();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config)?;

    if args.check_config {
        return check_config(&state);
    }

    log_provider("OCR", state.ocr.selector());
    log_provider("Meter", state.meter.selector());

    let cancel_token = CancellationToken::new();
    let app = create_router(state);

    tracing::info!("Glimpse starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/api/v1/health", addr);
    tracing::info!("  API docs:     http://{}/api/v1/docs", addr);
    tracing::info!("  OpenAPI spec: http://{}/api/v1/openapi.json", addr);

    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel_token.cancelled_owned())
        .await?;

    tracing::info!("Glimpse stopped");

    Ok(())
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests...");
    cancel_token.cancel();
}
