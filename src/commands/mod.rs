// HTTP 命令模块
// 提供供前端调用的命令接口

pub mod auth;
pub mod proxy;
pub mod session;

use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::ReviewError;
use crate::services::{AuthFlag, StudyService};

pub use auth::{AuthStatusDto, LoginDto};
pub use proxy::SubmissionProxy;
pub use session::{CheckDto, CodeEditDto, ReviewQuery, SelfReportDto, StatementDto, SubmitDto};

/// 命令共享状态
#[derive(Clone)]
pub struct AppState {
    pub study: Arc<StudyService>,
    pub auth: Arc<AuthFlag>,
    pub proxy: Arc<SubmissionProxy>,
}

impl AppState {
    pub fn new(study: StudyService, auth: AuthFlag, proxy: SubmissionProxy) -> Self {
        Self {
            study: Arc::new(study),
            auth: Arc::new(auth),
            proxy: Arc::new(proxy),
        }
    }
}

/// 命令错误：状态码 + 文本
pub type CommandError = (StatusCode, String);

pub type CommandResult<T> = Result<Json<T>, CommandError>;

/// 把库错误映射为 HTTP 状态码
pub fn to_command_error(err: ReviewError) -> CommandError {
    let status = match &err {
        ReviewError::Validation(_) => StatusCode::BAD_REQUEST,
        ReviewError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        ReviewError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ReviewError::InvalidTransition { .. } | ReviewError::SubmissionInFlight(_) => {
            StatusCode::CONFLICT
        }
        ReviewError::UpstreamStatus { .. }
        | ReviewError::Transport(_)
        | ReviewError::ProxyFallback { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        log::error!("command failed: {}", err);
    } else {
        log::debug!("command rejected: {}", err);
    }
    (status, err.to_string())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// 构建全部路由
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/status", get(auth::status))
        .route("/api/sessions", post(session::create_session).get(session::list_sessions))
        .route(
            "/api/sessions/{id}",
            get(session::get_session).patch(session::update_session),
        )
        .route("/api/sessions/{id}/code", put(session::edit_code))
        .route("/api/sessions/{id}/submit", post(session::submit))
        .route("/api/sessions/{id}/check", post(session::complete_check))
        .route("/api/sessions/{id}/review-done", post(session::mark_review_done))
        .route("/api/sessions/{id}/self-report", post(session::log_self_report))
        .route("/api/sessions/{id}/statement", put(session::attach_statement))
        .route("/api/reviews/today", get(session::today_reviews))
        .route("/api/reviews/upcoming", get(session::upcoming_reviews))
        .route("/api/reviews/unfinished", get(session::unfinished_sessions))
        .route("/api/reviews/summary", get(session::review_summary))
        .route("/api/n8n/submit", post(proxy::forward_submission))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::services::{MemoryStore, MockJudge, SessionStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response};
    use tokio::time::Duration;
    use tower::ServiceExt;

    pub fn state_with_proxy(proxy: SubmissionProxy) -> AppState {
        let storage = Arc::new(MemoryStore::new());
        let store = SessionStore::open(storage.clone()).unwrap();
        let study = StudyService::new(
            store,
            Arc::new(MockJudge::without_delay()),
            None,
            Duration::from_millis(20),
        );
        AppState::new(study, AuthFlag::new(storage), proxy)
    }

    pub fn state() -> AppState {
        state_with_proxy(SubmissionProxy::new(None).unwrap())
    }

    pub async fn call(
        state: &AppState,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(value) => Body::from(value.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response: Response<Body> = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    pub async fn login(state: &AppState) {
        let (status, _) = call(
            state,
            "POST",
            "/api/auth/login",
            Some(json!({ "username": "minji", "password": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
