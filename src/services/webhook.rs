//! 提交通知 webhook
//! 直连失败（网络/CORS 类）时经服务端代理重试一次

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Duration;

use crate::error::{Result, ReviewError};
use crate::models::{Language, Session};
use crate::services::normalizer::{normalize_str, NormalizedResult};

/// 提交时由用户补充的信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionNotice {
    pub user_id: String,
    pub time_spent_min: u32,
    pub hint_used: bool,
    pub self_report_difficulty: u8,
}

/// 提交通知请求体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub user_id: String,
    pub problem_id: u64,
    /// 固定为 python
    pub language: Language,
    pub code: String,
    pub time_spent_min: u32,
    pub hint_used: bool,
    pub self_report_difficulty: u8,
}

impl SubmissionPayload {
    pub fn from_session(session: &Session, notice: &SubmissionNotice) -> Self {
        let problem_id = session.problem.id.trim().parse::<u64>().unwrap_or_else(|_| {
            log::debug!("problem id {:?} is not numeric, sending 0", session.problem.id);
            0
        });

        Self {
            user_id: notice.user_id.clone(),
            problem_id,
            language: Language::Python,
            code: session.code.clone(),
            time_spent_min: notice.time_spent_min,
            hint_used: notice.hint_used,
            self_report_difficulty: notice.self_report_difficulty,
        }
    }
}

/// 是否为可经代理重试的传输层失败
pub fn is_transport_failure(err: &ReviewError) -> bool {
    match err {
        ReviewError::Transport(e) => {
            if e.is_connect() || e.is_timeout() || e.is_request() {
                return true;
            }
            let message = e.to_string().to_lowercase();
            ["cors", "network", "fetch"]
                .iter()
                .any(|needle| message.contains(needle))
        }
        _ => false,
    }
}

/// 提交通知客户端
#[derive(Clone)]
pub struct SubmissionWebhook {
    webhook_url: String,
    proxy_url: Option<String>,
    http_client: Arc<reqwest::Client>,
}

impl SubmissionWebhook {
    pub fn new(
        webhook_url: impl Into<String>,
        proxy_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            webhook_url: webhook_url.into(),
            proxy_url,
            http_client: Arc::new(builder.build()?),
        })
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    /// 发送通知
    ///
    /// 204 视为成功且无结果；其他 2xx 的正文经归一化后返回。
    pub async fn send(&self, payload: &SubmissionPayload) -> Result<Option<NormalizedResult>> {
        let original = match self.post(&self.webhook_url, payload).await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let proxy_url = match &self.proxy_url {
            Some(url) if is_transport_failure(&original) => url,
            _ => return Err(original),
        };

        log::warn!("submission webhook unreachable ({}), retrying via proxy", original);
        self.post(proxy_url, payload)
            .await
            .map_err(|proxy| ReviewError::ProxyFallback {
                original: original.to_string(),
                proxy: proxy.to_string(),
            })
    }

    async fn post(&self, url: &str, payload: &SubmissionPayload) -> Result<Option<NormalizedResult>> {
        let response = self.http_client.post(url).json(payload).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ReviewError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(normalize_str(&body)))
    }
}
