//! # linkcard-server
//!
//! HTTP backend for link-in-bio visiting cards.
//!
//! This binary provides:
//! - **Block API**: owners compose an ordered list of typed content blocks
//!   through one create/update contract, with bulk drag-reorder
//! - **Public pages** served by username without authentication
//! - **Accounts and profiles** with signed bearer sessions
//! - **Media uploads** stored on local disk and **link previews** scraped
//!   from OpenGraph tags
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod auth;
mod config;
mod error;
mod extract;
mod media_store;
mod preview;
mod rate_limit;
mod service;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use linkcard_shared::session::SessionKeys;
use linkcard_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::media_store::MediaStore;
use crate::preview::PreviewFetcher;
use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::service::PageService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,linkcard_server=debug")),
        )
        .init();

    info!("Starting linkcard server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        http_addr = %config.http_addr,
        database = %config.database_path.display(),
        media = %config.media_storage_path.display(),
        registration_open = config.registration_open,
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;
    let pages = PageService::new(db);

    let sessions = match config.session_signing_key {
        Some(seed) => SessionKeys::from_seed(&seed),
        None => {
            warn!("SESSION_SIGNING_KEY not set, sessions will not survive a restart");
            SessionKeys::generate()
        }
    };

    let media = MediaStore::new(
        config.media_storage_path.clone(),
        config.max_upload_size,
        config.public_base_url.clone(),
    )
    .await?;

    let previews = PreviewFetcher::new(config.preview_timeout)?;

    let rate_limiter = RateLimiter::new(RateLimitPolicy {
        per_second: config.rate_limit_per_sec,
        burst: config.rate_limit_burst,
    });

    let http_addr = config.http_addr;
    let app_state = AppState {
        pages,
        sessions: Arc::new(sessions),
        media: Arc::new(media),
        previews: Arc::new(previews),
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Every 5 minutes, evict buckets idle for more than 10
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            let purged = rate_limiter.purge_idle(Duration::from_secs(600)).await;
            if purged > 0 {
                tracing::debug!(purged, "Purged idle rate-limit buckets");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
