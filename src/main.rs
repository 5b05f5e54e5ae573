//! E-learning Auth Service
//! Mission: Serve authentication and role-gated endpoints for the e-learning API

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use dotenv::dotenv;
use std::{path::Path, sync::Arc, time::Duration};
use tokio::{net::TcpListener, task::JoinHandle, time::interval};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elearning_auth::{
    app,
    auth::{AuthService, InMemoryResetTokenStore, SqliteUserStore},
    config::AuthConfig,
};

#[derive(Parser, Debug)]
#[command(name = "elearning-auth")]
#[command(about = "Authentication and RBAC service for the e-learning API")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind: String,

    /// SQLite database file for user accounts
    #[arg(long, env = "AUTH_DB_PATH", default_value = "elearning_auth.db")]
    db_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let args = Args::parse();
    let config = AuthConfig::from_env().context("Invalid auth configuration")?;
    info!(?config, "Configuration loaded");

    let users = SqliteUserStore::new(&args.db_path)
        .with_context(|| format!("Failed to open user database at {}", args.db_path))?;
    info!(db_path = %args.db_path, "User store ready");

    let service = AuthService::new(
        &config,
        Arc::new(users),
        Arc::new(InMemoryResetTokenStore::new()),
    );

    if let Some(admin) = &config.bootstrap_admin {
        let created = service
            .ensure_admin(&admin.email, &admin.password)
            .await
            .context("Failed to bootstrap admin account")?;
        if created {
            info!(email = %admin.email, "Bootstrap admin account created");
        }
    }

    let sweeper = spawn_reset_sweeper(service.clone(), config.reset_sweep_interval);

    let app = app::router(service);

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!(addr = %args.bind, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server stopped");
    Ok(())
}

/// Periodically drop expired reset records
fn spawn_reset_sweeper(service: AuthService, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            let purged = service.purge_expired_resets(Utc::now()).await;
            if purged > 0 {
                debug!(purged, "Expired reset tokens purged");
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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
    info!("Shutdown signal received");
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elearning_auth=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // Also try the crate root when launched from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
