// 提交代理命令模块
// 服务端转发提交通知，绕过浏览器的跨域限制

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Duration;

use super::AppState;
use crate::error::Result;

/// 代理转发目标
pub struct SubmissionProxy {
    webhook_url: Option<String>,
    http_client: Arc<reqwest::Client>,
}

impl SubmissionProxy {
    pub fn new(webhook_url: Option<String>) -> Result<Self> {
        Self::with_timeout(webhook_url, None)
    }

    pub fn with_timeout(webhook_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            webhook_url,
            http_client: Arc::new(builder.build()?),
        })
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn fetch_failed(detail: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "failed to reach submission webhook", "detail": detail })),
    )
        .into_response()
}

/// 转发提交通知，原样返回上游的状态码与正文
pub async fn forward_submission(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let has_code = body
        .get("code")
        .and_then(Value::as_str)
        .is_some_and(|code| !code.trim().is_empty());
    if !has_code {
        return bad_request("code is required");
    }

    let proxy = &state.proxy;
    let Some(url) = proxy.webhook_url.as_deref() else {
        return fetch_failed("submission webhook is not configured".to_string());
    };

    let response = match proxy.http_client.post(url).json(&body).send().await {
        Ok(response) => response,
        Err(e) => {
            log::warn!("proxy could not reach submission webhook: {}", e);
            return fetch_failed(e.to_string());
        }
    };

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    match response.text().await {
        Ok(text) => {
            log::debug!("proxied submission, upstream status {}", status);
            (status, [(header::CONTENT_TYPE, content_type)], text).into_response()
        }
        Err(e) => fetch_failed(e.to_string()),
    }
}
