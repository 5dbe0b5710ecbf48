//! HTTP surface: `/api/analyze`, `/api/chat`, `/api/health` and `/`.

use crate::config::ServerConfig;
use crate::core::relay::LabRelay;
use crate::domain::model::{ChatReply, ChatRequest, ImagePayload};
use crate::domain::ports::ModelClient;
use crate::utils::error::{RelayError, Result};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const UPLOAD_FIELD: &str = "file";

pub struct AppState<M: ModelClient> {
    relay: LabRelay<M>,
    service_name: String,
    max_upload_bytes: usize,
    started_at: DateTime<Utc>,
}

pub fn router<M: ModelClient + 'static>(relay: LabRelay<M>, server: &ServerConfig) -> Router {
    let state = Arc::new(AppState {
        relay,
        service_name: server.service_name.clone(),
        max_upload_bytes: server.max_upload_bytes,
        started_at: Utc::now(),
    });

    Router::new()
        .route("/", get(index::<M>))
        .route("/api/health", get(health_check::<M>))
        .route("/api/analyze", post(analyze_report::<M>))
        .route("/api/chat", post(chat_with_bot::<M>))
        // 上限交給 extractor 檢查，超過時才能回傳 JSON 錯誤
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve<M: ModelClient + 'static>(relay: LabRelay<M>, server: &ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", server.host, server.port);
    let app = router(relay, server);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 {} listening on http://{}", server.service_name, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn index<M: ModelClient + 'static>(State(state): State<Arc<AppState<M>>>) -> Json<Value> {
    Json(json!({
        "message": format!("{} API", state.service_name),
        "version": env!("CARGO_PKG_VERSION"),
        "profile": state.relay.profile().name,
        "startedAt": state.started_at.to_rfc3339(),
        "endpoints": {
            "analyze": "/api/analyze (POST)",
            "chat": "/api/chat (POST)",
            "health": "/api/health (GET)"
        }
    }))
}

async fn health_check<M: ModelClient + 'static>(
    State(state): State<Arc<AppState<M>>>,
) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": state.service_name,
    }))
}

async fn analyze_report<M: ModelClient + 'static>(
    State(state): State<Arc<AppState<M>>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>> {
    let mut multipart = multipart.map_err(|e| {
        RelayError::invalid_request(format!("Expected a multipart upload: {}", e.body_text()))
    })?;

    let image = read_upload(&mut multipart, state.max_upload_bytes)
        .await
        .inspect_err(|e| tracing::warn!("⚠️ Rejected upload: {}", e))?;

    let result = state.relay.analyze(&image).await?;
    Ok(Json(result))
}

async fn chat_with_bot<M: ModelClient + 'static>(
    State(state): State<Arc<AppState<M>>>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>> {
    let Json(request) = payload.map_err(|e| {
        tracing::warn!("⚠️ Rejected chat body: {}", e.body_text());
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            RelayError::PayloadTooLarge {
                limit_bytes: state.max_upload_bytes,
            }
        } else {
            RelayError::invalid_request(format!("Invalid chat request: {}", e.body_text()))
        }
    })?;

    let text = state.relay.chat(&request).await?;
    Ok(Json(ChatReply { text }))
}

/// 找出名為 `file` 的檔案欄位並讀出內容
async fn read_upload(multipart: &mut Multipart, limit_bytes: usize) -> Result<ImagePayload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit_bytes))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        // 沒有檔名代表是一般表單欄位而不是檔案
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if file_name.is_empty() {
            return Err(RelayError::missing_file("No file selected"));
        }

        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit_bytes))?;

        tracing::debug!(
            "Received upload '{}' ({} bytes, declared type {:?})",
            file_name,
            bytes.len(),
            content_type
        );
        return ImagePayload::from_upload(content_type.as_deref(), bytes.to_vec());
    }

    Err(RelayError::missing_file("No file provided"))
}

fn multipart_error(e: MultipartError, limit_bytes: usize) -> RelayError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::PayloadTooLarge { limit_bytes }
    } else {
        RelayError::invalid_request(format!("Invalid multipart body: {}", e.body_text()))
    }
}
