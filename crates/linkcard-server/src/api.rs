use std::sync::Arc;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::{header, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use linkcard_shared::profile::{Profile, ProfilePatch, PublicPage};
use linkcard_shared::session::SessionKeys;
use linkcard_shared::{AccessError, Block, BlockId, OwnerId, ReorderItem, UnifiedPatch};

use crate::auth::AuthOwner;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::extract::{parse_block_id, JsonBody, PathParam, QueryParams};
use crate::media_store::MediaStore;
use crate::preview::{LinkPreview, PreviewFetcher};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::service::PageService;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pages: PageService,
    pub sessions: Arc<SessionKeys>,
    pub media: Arc<MediaStore>,
    pub previews: Arc<PreviewFetcher>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/profile", get(get_profile).patch(update_profile))
        .route("/blocks", get(list_blocks).post(create_block))
        .route("/blocks/reorder", post(reorder_blocks))
        .route("/blocks/:id", patch(update_block).delete(delete_block))
        .route("/public/:username", get(public_page))
        .route("/upload", post(upload))
        .route("/uploads/:id", get(download))
        .route("/preview", get(preview))
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_size + MULTIPART_OVERHEAD,
        ))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    token: String,
    username: String,
    owner_id: OwnerId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    owner_id: OwnerId,
    username: String,
}

#[derive(Deserialize)]
struct ReorderRequest {
    items: Vec<ReorderItem>,
}

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

#[derive(Deserialize)]
struct PreviewQuery {
    url: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Accounts ───

async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<Credentials>,
) -> Result<Json<SessionResponse>, ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::Forbidden("registration_closed"));
    }
    let user = state.pages.register(&req.username, &req.password).await?;
    info!(owner = %user.id, username = %user.username, "Account registered");
    Ok(Json(session_for(&state, user.id, user.username)))
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<Credentials>,
) -> Result<Json<SessionResponse>, ServerError> {
    let user = state
        .pages
        .authenticate(&req.username, &req.password)
        .await
        .map_err(|e| match e {
            AccessError::Unauthorized => ServerError::InvalidCredentials,
            other => other.into(),
        })?;
    Ok(Json(session_for(&state, user.id, user.username)))
}

async fn me(
    State(state): State<AppState>,
    AuthOwner(owner): AuthOwner,
) -> Result<Json<MeResponse>, ServerError> {
    let user = state.pages.user(owner).await?;
    Ok(Json(MeResponse {
        owner_id: user.id,
        username: user.username,
    }))
}

fn session_for(state: &AppState, owner: OwnerId, username: String) -> SessionResponse {
    SessionResponse {
        token: state.sessions.issue(owner, state.config.session_ttl),
        username,
        owner_id: owner,
    }
}

// ─── Profile ───

async fn get_profile(
    State(state): State<AppState>,
    AuthOwner(owner): AuthOwner,
) -> Result<Json<Profile>, ServerError> {
    Ok(Json(state.pages.profile(owner).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthOwner(owner): AuthOwner,
    JsonBody(patch): JsonBody<ProfilePatch>,
) -> Result<Json<Profile>, ServerError> {
    Ok(Json(state.pages.update_profile(owner, &patch).await?))
}

// ─── Blocks ───

async fn list_blocks(
    State(state): State<AppState>,
    AuthOwner(owner): AuthOwner,
) -> Result<Json<Vec<Block>>, ServerError> {
    Ok(Json(state.pages.list(owner).await?))
}

async fn create_block(
    State(state): State<AppState>,
    AuthOwner(owner): AuthOwner,
    JsonBody(patch): JsonBody<UnifiedPatch>,
) -> Result<Json<Block>, ServerError> {
    Ok(Json(state.pages.create(owner, &patch).await?))
}

async fn update_block(
    State(state): State<AppState>,
    AuthOwner(owner): AuthOwner,
    PathParam(id): PathParam<String>,
    JsonBody(patch): JsonBody<UnifiedPatch>,
) -> Result<Json<Block>, ServerError> {
    let id = parse_block_id(&id).ok_or(ServerError::NotFound)?;
    Ok(Json(state.pages.update(BlockId(id), owner, &patch).await?))
}

async fn delete_block(
    State(state): State<AppState>,
    AuthOwner(owner): AuthOwner,
    PathParam(id): PathParam<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    // A non-numeric id owns nothing, and deleting nothing succeeds.
    if let Some(id) = parse_block_id(&id) {
        state.pages.remove(BlockId(id), owner).await?;
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn reorder_blocks(
    State(state): State<AppState>,
    AuthOwner(owner): AuthOwner,
    JsonBody(req): JsonBody<ReorderRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let applied = state.pages.reorder(owner, &req.items).await?;
    Ok(Json(serde_json::json!({ "ok": true, "applied": applied })))
}

async fn public_page(
    State(state): State<AppState>,
    PathParam(username): PathParam<String>,
) -> Result<Json<PublicPage>, ServerError> {
    Ok(Json(state.pages.public_view(&username).await?))
}

// ─── Media ───

async fn upload(
    State(state): State<AppState>,
    AuthOwner(owner): AuthOwner,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ServerError> {
    let mut multipart = multipart.map_err(|_| ServerError::Validation("invalid_multipart"))?;
    let max = state.media.max_size();
    let multipart_error = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ServerError::UploadTooLarge { max }
        } else {
            ServerError::Validation("invalid_multipart")
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let data = field.bytes().await.map_err(multipart_error)?;
        let id = state.media.store(&data).await?;

        info!(owner = %owner, id = %id, size = data.len(), "Media uploaded");
        return Ok(Json(UploadResponse {
            url: state.media.reference(id),
        }));
    }

    Err(ServerError::Validation("file_required"))
}

async fn download(
    State(state): State<AppState>,
    PathParam(id): PathParam<String>,
) -> Result<impl IntoResponse, ServerError> {
    let id = Uuid::parse_str(&id).map_err(|_| ServerError::NotFound)?;
    let data = state.media.load(id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream"),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        data,
    ))
}

async fn preview(
    State(state): State<AppState>,
    AuthOwner(_): AuthOwner,
    QueryParams(query): QueryParams<PreviewQuery>,
) -> Json<LinkPreview> {
    Json(state.previews.fetch(&query.url).await)
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
