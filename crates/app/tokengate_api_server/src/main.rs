//! tokengate API server binary.
//!
//! Loads signing keys and provider settings from the environment, then
//! serves the login, refresh and user routes until interrupted.

use std::sync::Arc;

use axum::http::HeaderValue;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokengate_core::auth::AuthService;
use tokengate_core::config::AuthConfig;
use tokengate_core::users::{MemoryUserRepository, PgUserRepository, UserRepository};
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "tokengate_api_server", about = "tokengate login and token service")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    bind: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/tokengate"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Origin allowed by CORS.
    #[arg(long, env = "ALLOWED_ORIGIN", default_value = "http://localhost")]
    allowed_origin: String,

    /// Deadline for a single login request, in seconds.
    #[arg(long, env = "LOGIN_TIMEOUT_SECONDS", default_value_t = 15)]
    login_timeout_seconds: u64,

    /// Keep users in process memory instead of PostgreSQL.
    #[arg(long, default_value_t = false)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,tokengate_api=debug,tokengate_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    // Key material and provider settings are mandatory; fail before binding.
    let auth_config = AuthConfig::from_env()?;
    info!(
        access_ttl = ?auth_config.access_ttl,
        refresh_ttl = ?auth_config.refresh_ttl,
        grace = ?auth_config.grace,
        jwks_url = %auth_config.provider_jwks_url,
        "loaded auth configuration"
    );

    let users: Arc<dyn UserRepository> = if args.in_memory {
        warn!("using in-memory user store, users are lost on restart");
        Arc::new(MemoryUserRepository::new())
    } else {
        info!(max_connections = args.max_connections, "configuring connection pool");
        let pool = PgPoolOptions::new()
            .max_connections(args.max_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(&args.database_url)
            .await?;

        info!("running database migrations");
        tokengate_core::migrate::migrate(&pool).await?;
        Arc::new(PgUserRepository::new(pool))
    };

    let auth = Arc::new(AuthService::from_config(&auth_config, users.clone())?);

    let config = tokengate_api::config::ApiConfig {
        bind_addr: args.bind,
        allowed_origin: HeaderValue::from_str(&args.allowed_origin)?,
        login_timeout: std::time::Duration::from_secs(args.login_timeout_seconds),
    };

    let state = tokengate_api::AppState {
        auth,
        users,
        config: config.clone(),
    };

    let app = tokengate_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
