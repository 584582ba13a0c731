//! User Service Server
//!
//! Serves the users REST API and publishes a change event after every
//! successful mutation.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `US_CONFIG` | - | Path to a TOML config file |
//! | `US_API_PORT` | `8080` | HTTP API port |
//! | `US_METRICS_PORT` | `9090` | Metrics/health port |
//! | `US_EVENT_SINK` | `log` | Event sink: `log`, `http`, `none` |
//! | `US_EVENT_SINK_URL` | - | Event gateway base URL (required for `http`) |
//! | `US_EVENT_SINK_TOKEN` | - | Bearer token for the event gateway |
//! | `US_PUBLISH_TIMEOUT_MS` | `5000` | Upper bound on one event send |
//! | `US_DISPATCH_MODE` | `background` | `background` or `inline` |
//! | `US_CONFLICT_POLICY` | `reject` | `reject`, `overwrite`, `regenerate` |
//! | `US_SEED_SAMPLE_DATA` | `true` | Load users "1" and "2" at startup |
//! | `US_TOPIC_*` | `user/...` | Topic per event type |
//! | `US_LOG_FORMAT` | `text` | `json` for structured logs |
//! | `RUST_LOG` | `info` | Log level |

use std::path::PathBuf;
use std::sync::Arc;
use axum::{
    extract::State,
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tokio::{net::TcpListener, signal};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use us_common::{Clock, SystemClock};
use us_config::AppConfig;
use us_events::{create_sink, ChangeNotifier};
use us_platform::{
    create_router, sample_users, InMemoryUserRepository, UserService, UserServiceApiDoc, UsersState,
};

/// User Service
#[derive(Parser, Debug)]
#[command(name = "us-server")]
#[command(about = "User records REST API with change notifications")]
struct Args {
    /// Path to a TOML config file; environment variables override it
    #[arg(long, env = "US_CONFIG")]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("US_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    info!("Starting User Service");

    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    info!(
        api_port = config.server.api_port,
        metrics_port = config.server.metrics_port,
        sink = ?config.events.sink,
        dispatch_mode = ?config.events.dispatch_mode,
        conflict_policy = ?config.store.conflict_policy,
        "Configuration loaded"
    );

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    // Event channel
    let sink = create_sink(&config.events).context("Failed to create event sink")?;
    let notifier = Arc::new(ChangeNotifier::from_config(sink, &config.events));

    // Record store
    let repo = Arc::new(InMemoryUserRepository::from_config(&config.store));
    if config.store.seed_sample_data {
        repo.seed(sample_users(SystemClock.now()));
        info!("Seeded sample users");
    }

    let users_state = UsersState {
        user_service: Arc::new(UserService::new(repo, notifier)),
        default_limit: config.store.default_page_limit,
    };

    let app = create_router(users_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", UserServiceApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    // Start metrics server
    let metrics_addr = format!("{}:{}", config.server.bind_address, config.server.metrics_port);
    info!("Metrics server listening on http://{}/metrics", metrics_addr);

    let metrics_app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(prometheus);

    let metrics_listener = TcpListener::bind(&metrics_addr).await?;
    let metrics_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            error!(error = %e, "Metrics server failed");
        }
    });

    // Start API server
    let api_addr = format!("{}:{}", config.server.bind_address, config.server.api_port);
    info!("API server listening on http://{}", api_addr);

    let api_listener = TcpListener::bind(&api_addr).await?;
    axum::serve(api_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown signal received...");
    metrics_task.abort();

    info!("User Service shutdown complete");
    Ok(())
}

async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ready_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "READY"
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
}
