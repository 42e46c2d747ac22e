use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use notable_api::config::{ApiConfig, ProviderKind};
use notable_api::{router, with_middleware, AppState};
use notable_auth::{FirebaseProvider, IdentityBridge, LogResetMailer, MockIdentityProvider};
use notable_core::{IdentityProvider, NoteRepository, UserRepository};
use notable_db::{Database, MemoryNoteRepository, MemoryUserRepository, PoolConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "notable_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "notable_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("notable-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ApiConfig::from_env()?;
    info!(config = ?config, "Configuration loaded");

    // Storage
    let (notes, users): (Arc<dyn NoteRepository>, Arc<dyn UserRepository>) =
        match config.database_url.as_deref() {
            Some(url) => {
                let pool_config = PoolConfig::new().max_connections(config.db_max_connections);
                let db = Database::connect_with_config(url, pool_config).await?;
                db.migrate().await?;
                info!(subsystem = "db", op = "migrate", "Migrations applied");
                (Arc::new(db.notes.clone()), Arc::new(db.users.clone()))
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory storage (data is lost on exit)");
                (
                    Arc::new(MemoryNoteRepository::new()),
                    Arc::new(MemoryUserRepository::new()),
                )
            }
        };

    // Identity
    let provider: Arc<dyn IdentityProvider> = match config.provider {
        ProviderKind::Firebase => Arc::new(FirebaseProvider::from_env()?),
        ProviderKind::Mock => {
            warn!("IDENTITY_PROVIDER=mock: accounts exist only in this process");
            Arc::new(MockIdentityProvider::new())
        }
    };
    let sessions = config.session_service()?;
    info!(
        provider = provider.name(),
        key_id = sessions.active_kid(),
        ttl_secs = sessions.ttl().num_seconds(),
        "Identity bridge ready"
    );
    let bridge = IdentityBridge::new(
        provider,
        users,
        Arc::new(sessions),
        Arc::new(LogResetMailer::new()),
    );

    let state = AppState::new(notes, bridge);
    let app = with_middleware(
        router(state),
        config.allowed_origins.clone(),
        config.body_limit_bytes,
    );

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
