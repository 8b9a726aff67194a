//! CEAL API Server implementation
//!
//! HTTP REST API server using Axum. Serves the survey forms, the shared
//! subscription catalogs and the year-end workbook export.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{http::StatusCode, routing::get, Router};
use parking_lot::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::{catalog, handlers, ApiError};
use crate::error::CealResult;
use crate::store::{load_snapshot, save_snapshot, MemoryStore, Store};
use crate::types::ListKind;

/// API Server configuration
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Snapshot loaded at startup and rewritten after every change
    pub data_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_path: None,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub store: Arc<dyn Store>,
    pub data_path: Option<PathBuf>,
    /// Held from snapshot to rename so files land in the order states were taken
    persist_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            store,
            data_path: None,
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    /// Flush the store to the snapshot file, when one is configured
    pub fn persist_blocking(&self) -> CealResult<()> {
        let Some(path) = &self.data_path else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock();
        save_snapshot(path, &self.store.snapshot())
    }

    /// [`AppState::persist_blocking`] on the blocking pool
    pub async fn persist(self: &Arc<Self>) -> Result<(), ApiError> {
        if self.data_path.is_none() {
            return Ok(());
        }
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || state.persist_blocking())
            .await
            .map_err(|e| {
                error!(error = %e, "persist task failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            })??;
        Ok(())
    }
}

/// Build the router with every endpoint and middleware layer
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Survey endpoints
        .route(
            "/api/export/year-end-reports",
            get(handlers::export_year_end_reports),
        )
        .route(
            "/api/forms/:form_type",
            get(handlers::get_form).post(handlers::save_form),
        )
        .route(
            "/api/libraries",
            get(handlers::list_libraries).post(handlers::create_library),
        )
        .route(
            "/api/library-years",
            get(handlers::list_library_years).post(handlers::open_library_year),
        )
        .nest("/api/av", catalog::routes(ListKind::Av))
        .nest("/api/ebook", catalog::routes(ListKind::Ebook))
        .nest("/api/ejournal", catalog::routes(ListKind::Ejournal))
        // State and middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn open_store(config: &ApiConfig) -> anyhow::Result<MemoryStore> {
    let Some(path) = &config.data_path else {
        warn!("No data file configured; changes are kept in memory only");
        return Ok(MemoryStore::new());
    };

    if path.exists() {
        let snapshot = load_snapshot(path)?;
        info!(
            path = %path.display(),
            libraries = snapshot.libraries.len(),
            library_years = snapshot.library_years.len(),
            "snapshot loaded"
        );
        Ok(MemoryStore::from_snapshot(snapshot))
    } else {
        warn!(path = %path.display(), "Data file not found; starting empty");
        Ok(MemoryStore::new())
    }
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ceal_stats=info,ceal_server=info,tower_http=info".into()),
        )
        .init();

    let store = open_store(&config)?;
    let mut state = AppState::new(Arc::new(store));
    if let Some(path) = &config.data_path {
        state = state.with_data_path(path);
    }
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("CEAL API Server starting on http://{}", addr);
    info!("   Export: /api/export/year-end-reports?year=&formType=");
    info!("   Lists: /api/av, /api/ebook, /api/ejournal  Forms: /api/forms/:formType");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("CEAL API Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
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
                warn!(error = %e, "failed to listen for SIGTERM");
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

    info!("Shutdown signal received, stopping server...");
}
