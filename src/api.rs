use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use navdash_backup::{
    BackupConfigUpdate, BackupError, BackupFrequency, BackupScheduler, BackupService, FieldUpdate,
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ApiService {
    pub backup_service: Arc<BackupService>,
    pub scheduler: Arc<Mutex<BackupScheduler>>,
}

impl ApiService {
    pub fn new(backup_service: Arc<BackupService>, scheduler: Arc<Mutex<BackupScheduler>>) -> Self {
        Self {
            backup_service,
            scheduler,
        }
    }

    pub async fn start_server(
        self: Arc<Self>,
        bind: IpAddr,
        port: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = self.create_router();

        let addr = SocketAddr::new(bind, port);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("REST API server listening on http://{}", addr);
        axum::serve(listener, app).await?;

        Ok(())
    }

    pub fn create_router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/health", get(health_check))
            // Backup
            .route("/api/backup/config", get(get_backup_config).put(save_backup_config))
            .route("/api/backup/test", post(test_connection))
            .route("/api/backup/now", post(backup_now))
            .route("/api/backup/list", get(list_backups))
            .route("/api/backup/restore", post(restore_backup))
            .with_state(self)
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "nav-dashboard API",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Error body `{success: false, message}` with a status matching the cause.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<BackupError> for ApiError {
    fn from(e: BackupError) -> Self {
        let status = match &e {
            BackupError::ConfigIncomplete | BackupError::Validation(_) => StatusCode::BAD_REQUEST,
            BackupError::NotFound(_) => StatusCode::NOT_FOUND,
            BackupError::Busy => StatusCode::CONFLICT,
            BackupError::Connection(_) | BackupError::Remote(_) => StatusCode::BAD_GATEWAY,
            BackupError::Transaction(_) | BackupError::Storage(_) | BackupError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!("backup API error: {}", e);
        } else {
            warn!("backup API error: {}", e);
        }
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("rejected request body: {}", rejection.body_text());
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "message": self.message
        }));
        (self.status, body).into_response()
    }
}

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

// ── Config ───────────────────────────────────────────────────────────────────

async fn get_backup_config(State(services): State<Arc<ApiService>>) -> ApiResult {
    let config = services.backup_service.config_store().get().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "webdav_url": config.webdav_url,
            "webdav_username": config.webdav_username,
            "backup_frequency": config.effective_frequency(),
            "last_backup_time": config.last_backup_time,
            "last_backup_status": config.last_backup_status
        }
    })))
}

/// Missing → `None`, `null` → `Some(None)`, value → `Some(Some(v))`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
struct ConfigUpdateRequest {
    #[serde(default, deserialize_with = "double_option")]
    webdav_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    webdav_username: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    webdav_password: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    backup_frequency: Option<Option<String>>,
}

impl ConfigUpdateRequest {
    fn into_update(self) -> Result<BackupConfigUpdate, ApiError> {
        let backup_frequency = match FieldUpdate::from(self.backup_frequency) {
            FieldUpdate::Keep => FieldUpdate::Keep,
            FieldUpdate::Clear => FieldUpdate::Clear,
            FieldUpdate::Set(raw) => match BackupFrequency::parse(&raw) {
                Some(f) => FieldUpdate::Set(f),
                None => return Err(ApiError::bad_request(format!("invalid backup frequency '{raw}'"))),
            },
        };
        Ok(BackupConfigUpdate {
            webdav_url: self.webdav_url.into(),
            webdav_username: self.webdav_username.into(),
            webdav_password: FieldUpdate::from(self.webdav_password).map(SecretString::new),
            backup_frequency,
        })
    }
}

async fn save_backup_config(
    State(services): State<Arc<ApiService>>,
    payload: Result<Json<ConfigUpdateRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let update = req.into_update()?;
    services.backup_service.config_store().set(update).await?;

    let state = services.scheduler.lock().await.reload().await?;
    info!("backup config saved, scheduler {:?}", state);
    Ok(Json(serde_json::json!({ "success": true })))
}

// ── Operations ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TestConnectionRequest {
    #[serde(default)]
    webdav_url: String,
    #[serde(default)]
    webdav_username: String,
    #[serde(default)]
    webdav_password: String,
}

async fn test_connection(
    State(services): State<Arc<ApiService>>,
    payload: Result<Json<TestConnectionRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let result = services
        .backup_service
        .test_connection(&req.webdav_url, &req.webdav_username, &req.webdav_password)
        .await;
    Ok(match result.reason {
        None if result.ok => Json(serde_json::json!({ "success": true })),
        reason => Json(serde_json::json!({
            "success": false,
            "error": reason.unwrap_or_default()
        })),
    })
}

async fn backup_now(State(services): State<Arc<ApiService>>) -> ApiResult {
    let outcome = services.backup_service.backup_now().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "filename": outcome.filename,
        "time": outcome.timestamp
    })))
}

async fn list_backups(State(services): State<Arc<ApiService>>) -> ApiResult {
    let backups = services.backup_service.list_backups().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "data": backups
    })))
}

#[derive(Deserialize)]
struct RestoreRequest {
    filename: String,
}

async fn restore_backup(
    State(services): State<Arc<ApiService>>,
    payload: Result<Json<RestoreRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let summary = services.backup_service.restore(&req.filename).await?;

    // The snapshot may carry a different backup_frequency.
    let state = services.scheduler.lock().await.reload().await?;
    info!("restored {}, scheduler {:?}", req.filename, state);
    Ok(Json(serde_json::json!({
        "success": true,
        "categories": summary.categories,
        "sites": summary.sites
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> ConfigUpdateRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn omitted_null_and_value_map_to_tri_state() {
        let update = parse(r#"{"webdav_url":"https://dav.test","webdav_username":null}"#)
            .into_update()
            .ok()
            .unwrap();
        assert_eq!(update.webdav_url, FieldUpdate::Set("https://dav.test".to_string()));
        assert_eq!(update.webdav_username, FieldUpdate::Clear);
        assert!(matches!(update.webdav_password, FieldUpdate::Keep));
        assert_eq!(update.backup_frequency, FieldUpdate::Keep);
    }

    #[test]
    fn unknown_frequency_is_rejected() {
        let err = parse(r#"{"backup_frequency":"hourly"}"#).into_update().err().unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("hourly"));
    }

    #[test]
    fn error_statuses() {
        let status = |e: BackupError| ApiError::from(e).status;
        assert_eq!(status(BackupError::ConfigIncomplete), StatusCode::BAD_REQUEST);
        assert_eq!(status(BackupError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(BackupError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(BackupError::Busy), StatusCode::CONFLICT);
        assert_eq!(status(BackupError::Connection("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status(BackupError::Remote("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status(BackupError::Transaction("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
