// 会话命令模块
// 会话的创建、编辑、提交、理解检查与复习查询；全部需要登录

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::{to_command_error, AppState, CommandError, CommandResult};
use crate::error::ReviewError;
use crate::models::{Problem, Session, SessionPatch, UnderstandingAnswers, UnderstandingLevel};
use crate::services::{ReviewSummary, SubmissionNotice, SubmitOutcome};

/// 代码编辑
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeEditDto {
    pub code: String,
}

/// 提交请求，`notice` 为空时不发送通知
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitDto {
    pub notice: Option<SubmissionNotice>,
    pub user_explanation: Option<String>,
}

/// 理解检查
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDto {
    pub answers: UnderstandingAnswers,
    pub level: UnderstandingLevel,
    #[serde(default)]
    pub extended_interval: bool,
}

/// 用户自评
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfReportDto {
    pub difficulty: Option<String>,
    pub result: Option<String>,
}

/// 题面补全
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementDto {
    pub statement: String,
}

/// 复习查询参数：调用方所在时区相对 UTC 的偏移（分钟，东为正）
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewQuery {
    pub tz_offset_minutes: i32,
}

impl ReviewQuery {
    /// 调用方的当前本地时间，偏移非法时按 UTC
    pub fn local_now(&self) -> DateTime<FixedOffset> {
        let offset = self
            .tz_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Utc::now().with_timezone(&offset)
    }
}

fn require_login(state: &AppState) -> Result<(), CommandError> {
    state.auth.require_login().map_err(to_command_error)
}

fn found(id: &str, session: Option<Session>) -> CommandResult<Session> {
    session
        .map(Json)
        .ok_or_else(|| to_command_error(ReviewError::SessionNotFound(id.to_string())))
}

/// 创建会话
pub async fn create_session(
    State(state): State<AppState>,
    Json(problem): Json<Problem>,
) -> Result<(StatusCode, Json<Session>), CommandError> {
    require_login(&state)?;
    let session = state.study.start_session(problem).map_err(to_command_error)?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// 全部会话
pub async fn list_sessions(State(state): State<AppState>) -> CommandResult<Vec<Session>> {
    require_login(&state)?;
    let sessions = state.study.sessions().map_err(to_command_error)?;
    Ok(Json(sessions))
}

/// 获取会话
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CommandResult<Session> {
    require_login(&state)?;
    let session = state.study.get(&id).map_err(to_command_error)?;
    found(&id, session)
}

/// 部分更新
pub async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<SessionPatch>,
) -> CommandResult<Session> {
    require_login(&state)?;
    state.study.update(&id, patch).map_err(to_command_error)?;
    let session = state.study.get(&id).map_err(to_command_error)?;
    found(&id, session)
}

/// 代码编辑（防抖写入）
pub async fn edit_code(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CodeEditDto>,
) -> Result<StatusCode, CommandError> {
    require_login(&state)?;
    if state.study.get(&id).map_err(to_command_error)?.is_none() {
        return Err(to_command_error(ReviewError::SessionNotFound(id)));
    }

    state.study.edit_code(&id, input.code).map_err(to_command_error)?;
    Ok(StatusCode::ACCEPTED)
}

/// 提交代码
pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<SubmitDto>,
) -> CommandResult<SubmitOutcome> {
    require_login(&state)?;
    let outcome = state
        .study
        .submit(&id, input.notice, input.user_explanation)
        .await
        .map_err(to_command_error)?;
    Ok(Json(outcome))
}

/// 完成理解检查
pub async fn complete_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CheckDto>,
) -> CommandResult<Session> {
    require_login(&state)?;
    let session = state
        .study
        .complete_check(&id, input.answers, input.level, input.extended_interval)
        .map_err(to_command_error)?;
    Ok(Json(session))
}

/// 标记复习完成
pub async fn mark_review_done(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CommandResult<Session> {
    require_login(&state)?;
    let session = state.study.mark_review_done(&id).map_err(to_command_error)?;
    Ok(Json(session))
}

/// 记录自评
pub async fn log_self_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<SelfReportDto>,
) -> CommandResult<Session> {
    require_login(&state)?;
    let session = state
        .study
        .log_self_report(&id, input.difficulty, input.result)
        .map_err(to_command_error)?;
    Ok(Json(session))
}

/// 补全题面（已有题面时不变）
pub async fn attach_statement(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<StatementDto>,
) -> CommandResult<Session> {
    require_login(&state)?;
    state
        .study
        .attach_statement(&id, input.statement)
        .map_err(to_command_error)?;
    let session = state.study.get(&id).map_err(to_command_error)?;
    found(&id, session)
}

// ==================== 复习查询 ====================

/// 今日待复习
pub async fn today_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> CommandResult<Vec<Session>> {
    require_login(&state)?;
    let sessions = state
        .study
        .today_reviews(&query.local_now())
        .map_err(to_command_error)?;
    Ok(Json(sessions))
}

/// 即将复习
pub async fn upcoming_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> CommandResult<Vec<Session>> {
    require_login(&state)?;
    let sessions = state
        .study
        .upcoming_reviews(&query.local_now())
        .map_err(to_command_error)?;
    Ok(Json(sessions))
}

/// 未完成会话
pub async fn unfinished_sessions(State(state): State<AppState>) -> CommandResult<Vec<Session>> {
    require_login(&state)?;
    let sessions = state.study.unfinished_sessions().map_err(to_command_error)?;
    Ok(Json(sessions))
}

/// 分组数量汇总
pub async fn review_summary(
    State(state): State<AppState>,
    Query(query): Query<ReviewQuery>,
) -> CommandResult<ReviewSummary> {
    require_login(&state)?;
    let summary = state
        .study
        .summary(&query.local_now())
        .map_err(to_command_error)?;
    Ok(Json(summary))
}
