// 错误类型
// 库内统一使用 ReviewError，二进制入口使用 anyhow

use thiserror::Error;

use crate::models::SessionStatus;

/// 提交前校验失败的原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("code must not be empty")]
    EmptyCode,

    #[error("username must not be empty")]
    EmptyUsername,
}

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 上游返回非 2xx，消息中携带状态码与响应正文
    #[error("upstream responded with HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// 直连失败后经代理重试仍失败
    #[error("submission failed via proxy: {proxy} (original error: {original})")]
    ProxyFallback { original: String, proxy: String },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("cannot {action} a session in status {status:?}")]
    InvalidTransition {
        action: &'static str,
        status: SessionStatus,
    },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("a submission is already in flight for session {0}")]
    SubmissionInFlight(String),

    #[error("not logged in")]
    NotAuthenticated,

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl ReviewError {
    /// 从任意锁中毒错误构造
    pub fn poisoned<E: std::fmt::Display>(err: E) -> Self {
        ReviewError::LockPoisoned(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
