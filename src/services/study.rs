//! 刷题服务
//! 串联会话存储、判题客户端、提交通知与代码防抖写入

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Duration;

use crate::error::{Result, ReviewError};
use crate::models::{
    JudgeResult, Problem, Session, SessionPatch, UnderstandingAnswers, UnderstandingLevel,
};
use crate::services::debounce::Debouncer;
use crate::services::judge::{judge_result_or_fallback, JudgeClient, JudgePayload};
use crate::services::lifecycle;
use crate::services::normalizer::NormalizedResult;
use crate::services::query::{self, ReviewSummary};
use crate::services::session_store::SessionStore;
use crate::services::webhook::{SubmissionNotice, SubmissionPayload, SubmissionWebhook};

type PendingCode = Arc<Mutex<HashMap<String, String>>>;

/// 一次提交的结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub session: Session,
    pub judge: JudgeResult,
    /// 通知 webhook 返回的归一化结果（204 或未发送时为空）
    pub notification: Option<NormalizedResult>,
    /// 通知失败的原因，不影响判题结果的记录
    pub notification_error: Option<String>,
}

/// 提交进行中的标记，离开作用域时自动清除
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        set.remove(&self.id);
    }
}

pub struct StudyService {
    store: Arc<Mutex<SessionStore>>,
    judge: Arc<dyn JudgeClient>,
    webhook: Option<SubmissionWebhook>,
    debouncer: Debouncer,
    pending_code: PendingCode,
    in_flight: Mutex<HashSet<String>>,
}

fn lock_store(store: &Mutex<SessionStore>) -> Result<MutexGuard<'_, SessionStore>> {
    store.lock().map_err(ReviewError::poisoned)
}

/// 把暂存的代码写入存储
fn write_pending_code(store: &Mutex<SessionStore>, pending: &PendingCode, id: &str) -> Result<bool> {
    let code = pending.lock().map_err(ReviewError::poisoned)?.remove(id);
    match code {
        Some(code) => lock_store(store)?.update(id, SessionPatch::code(code)),
        None => Ok(false),
    }
}

impl StudyService {
    pub fn new(
        store: SessionStore,
        judge: Arc<dyn JudgeClient>,
        webhook: Option<SubmissionWebhook>,
        debounce: Duration,
    ) -> Self {
        log::info!(
            "study service ready: judge={}, webhook={}",
            judge.name(),
            webhook.as_ref().map(|w| w.webhook_url()).unwrap_or("disabled")
        );

        Self {
            store: Arc::new(Mutex::new(store)),
            judge,
            webhook,
            debouncer: Debouncer::new(debounce),
            pending_code: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, SessionStore>> {
        lock_store(&self.store)
    }

    /// 在最新的会话上执行一次纯转换并写回
    fn transition<F>(&self, id: &str, f: F) -> Result<Session>
    where
        F: FnOnce(&Session) -> Result<Session>,
    {
        let mut store = self.store()?;
        let current = store
            .get(id)
            .ok_or_else(|| ReviewError::SessionNotFound(id.to_string()))?;

        let next = f(&current)?;
        store.replace(next.clone())?;
        Ok(next)
    }

    // ==================== 会话操作 ====================

    pub fn start_session(&self, problem: Problem) -> Result<Session> {
        let mut store = self.store()?;
        let id = store.create(problem)?;
        store
            .get(&id)
            .ok_or(ReviewError::SessionNotFound(id))
    }

    pub fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.store()?.get(id))
    }

    pub fn sessions(&self) -> Result<Vec<Session>> {
        Ok(self.store()?.all())
    }

    /// 未知 id 返回 `Ok(false)`
    pub fn update(&self, id: &str, patch: SessionPatch) -> Result<bool> {
        self.store()?.update(id, patch)
    }

    /// 记录代码编辑，静默期结束后才写入存储
    pub fn edit_code(&self, id: &str, code: String) -> Result<()> {
        self.pending_code
            .lock()
            .map_err(ReviewError::poisoned)?
            .insert(id.to_string(), code);

        let store = Arc::clone(&self.store);
        let pending = Arc::clone(&self.pending_code);
        let key = id.to_string();
        self.debouncer.schedule(id, move || {
            if let Err(e) = write_pending_code(&store, &pending, &key) {
                log::error!("failed to save code for session {}: {}", key, e);
            }
        });
        Ok(())
    }

    /// 立即写入尚未落盘的代码编辑
    pub fn flush_code(&self, id: &str) -> Result<bool> {
        self.debouncer.cancel(id);
        write_pending_code(&self.store, &self.pending_code, id)
    }

    pub fn is_submitting(&self, id: &str) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(id))
            .unwrap_or(false)
    }

    fn begin_submission(&self, id: &str) -> Result<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().map_err(ReviewError::poisoned)?;
        if !set.insert(id.to_string()) {
            return Err(ReviewError::SubmissionInFlight(id.to_string()));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            id: id.to_string(),
        })
    }

    /// 提交代码：校验、发送通知、判题并记录结果
    ///
    /// 通知失败只记录在结果里；判题失败时会话保持原状态。
    pub async fn submit(
        &self,
        id: &str,
        notice: Option<SubmissionNotice>,
        user_explanation: Option<String>,
    ) -> Result<SubmitOutcome> {
        let _guard = self.begin_submission(id)?;

        self.flush_code(id)?;
        let session = self
            .get(id)?
            .ok_or_else(|| ReviewError::SessionNotFound(id.to_string()))?;
        lifecycle::validate_submission(&session)?;

        let mut notification = None;
        let mut notification_error = None;
        if let (Some(webhook), Some(notice)) = (&self.webhook, notice) {
            let payload = SubmissionPayload::from_session(&session, &notice);
            match webhook.send(&payload).await {
                Ok(result) => notification = result,
                Err(e) => {
                    log::warn!("submission notification failed for {}: {}", id, e);
                    notification_error = Some(e.to_string());
                }
            }
        }

        let payload = JudgePayload::from_session(&session, user_explanation);
        let raw = self.judge.judge(&payload).await.map_err(|e| {
            log::error!("judge {} failed for session {}: {}", self.judge.name(), id, e);
            e
        })?;
        let judge = judge_result_or_fallback(&raw, Utc::now());

        // 代码已在判题前校验；判题期间的编辑不丢弃本次结果
        let session = self.transition(id, |current| {
            Ok(lifecycle::record_judgement(current, judge.clone(), Utc::now()))
        })?;
        log::info!("session {} judged {:?}", id, judge.verdict);

        Ok(SubmitOutcome {
            session,
            judge,
            notification,
            notification_error,
        })
    }

    /// 完成理解检查并排期
    pub fn complete_check(
        &self,
        id: &str,
        answers: UnderstandingAnswers,
        level: UnderstandingLevel,
        extended_interval: bool,
    ) -> Result<Session> {
        self.transition(id, |current| {
            lifecycle::record_check(current, answers, level, extended_interval, Utc::now())
        })
    }

    pub fn mark_review_done(&self, id: &str) -> Result<Session> {
        self.transition(id, |current| lifecycle::mark_review_done(current, Utc::now()))
    }

    /// 题面缺失时补全，返回是否写入
    pub fn attach_statement(&self, id: &str, statement: String) -> Result<bool> {
        self.store()?.attach_statement(id, statement)
    }

    pub fn log_self_report(
        &self,
        id: &str,
        difficulty: Option<String>,
        result: Option<String>,
    ) -> Result<Session> {
        self.transition(id, |current| {
            Ok(lifecycle::record_self_report(current, difficulty, result, Utc::now()))
        })
    }

    // ==================== 查询 ====================

    pub fn today_reviews<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Vec<Session>> {
        let sessions = self.sessions()?;
        Ok(query::today_reviews(&sessions, now).into_iter().cloned().collect())
    }

    pub fn upcoming_reviews<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Vec<Session>> {
        let sessions = self.sessions()?;
        Ok(query::upcoming_reviews(&sessions, now).into_iter().cloned().collect())
    }

    pub fn unfinished_sessions(&self) -> Result<Vec<Session>> {
        let sessions = self.sessions()?;
        Ok(query::unfinished_sessions(&sessions).into_iter().cloned().collect())
    }

    pub fn summary<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<ReviewSummary> {
        Ok(query::summarize(&self.sessions()?, now))
    }
}
