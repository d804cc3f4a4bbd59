//! 会话生命周期
//! 纯状态转换函数：输入旧会话，输出新会话，不触碰持久化

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, ReviewError, ValidationError};
use crate::models::{
    JudgeResult, Session, SessionPatch, SessionStatus, UnderstandingAnswers, UnderstandingLevel,
};
use crate::services::scheduler::compute_review_at_from;

/// 标记复习完成但没有理解程度记录时的默认间隔（天）
///
/// 与 PARTIAL 的间隔数值相同但相互独立，修改调度策略不影响这里。
pub const MARK_DONE_DEFAULT_INTERVAL_DAYS: i64 = 3;

/// 状态只能向后推进
fn advance(current: SessionStatus, target: SessionStatus) -> SessionStatus {
    current.max(target)
}

/// 合并部分更新并刷新 updatedAt，不改变状态
pub fn apply_patch(session: &Session, patch: SessionPatch, now: DateTime<Utc>) -> Session {
    let mut next = session.clone();

    if let Some(language) = patch.language {
        next.language = language;
    }
    if let Some(code) = patch.code {
        next.code = code;
    }
    if let Some(run_output) = patch.run_output {
        next.run_output = Some(run_output);
    }
    if let Some(answers) = patch.understanding_answers {
        next.understanding_answers = Some(answers);
    }
    if let Some(difficulty) = patch.log_difficulty {
        next.log_difficulty = Some(difficulty);
    }
    if let Some(result) = patch.log_result {
        next.log_result = Some(result);
    }
    if let Some(logged_at) = patch.logged_at {
        next.logged_at = Some(logged_at);
    }

    next.updated_at = now;
    next
}

/// 提交前校验：代码去空白后不能为空
pub fn validate_submission(session: &Session) -> Result<()> {
    if session.code.trim().is_empty() {
        return Err(ValidationError::EmptyCode.into());
    }
    Ok(())
}

/// DRAFT → SUBMITTED：校验代码后写入判题结果
///
/// 重复提交时覆盖旧结果；已排期的会话保持 SCHEDULED。
pub fn record_submission(
    session: &Session,
    judge: JudgeResult,
    now: DateTime<Utc>,
) -> Result<Session> {
    validate_submission(session)?;
    Ok(record_judgement(session, judge, now))
}

/// 写入已完成的判题结果，不再校验当前代码
///
/// 判题针对的是提交时的快照，期间的代码编辑不影响结果的记录。
pub fn record_judgement(session: &Session, judge: JudgeResult, now: DateTime<Utc>) -> Session {
    let mut next = session.clone();
    next.judge = Some(judge);
    next.status = advance(next.status, SessionStatus::Submitted);
    next.updated_at = now;
    next
}

/// SUBMITTED → SCHEDULED：记录理解检查的回答与自评，并排期下次复习
pub fn record_check(
    session: &Session,
    answers: UnderstandingAnswers,
    level: UnderstandingLevel,
    extended_interval: bool,
    now: DateTime<Utc>,
) -> Result<Session> {
    if session.status == SessionStatus::Draft {
        return Err(ReviewError::InvalidTransition {
            action: "complete the comprehension check for",
            status: session.status,
        });
    }

    let mut next = session.clone();
    next.understanding_answers = Some(answers);
    next.understanding_level = Some(level);
    next.review_at = Some(compute_review_at_from(now, level, extended_interval));
    next.status = advance(next.status, SessionStatus::Scheduled);
    next.updated_at = now;
    Ok(next)
}

/// SCHEDULED → SCHEDULED：完成一次复习并滚动下次复习时间
pub fn mark_review_done(session: &Session, now: DateTime<Utc>) -> Result<Session> {
    if session.status != SessionStatus::Scheduled {
        return Err(ReviewError::InvalidTransition {
            action: "mark review done for",
            status: session.status,
        });
    }

    let review_at = match session.understanding_level {
        Some(level) => compute_review_at_from(now, level, false),
        None => now + Duration::days(MARK_DONE_DEFAULT_INTERVAL_DAYS),
    };

    let mut next = session.clone();
    next.reviewed_at = Some(now);
    next.review_at = Some(review_at);
    next.review_count = next.review_count.saturating_add(1);
    next.updated_at = now;
    Ok(next)
}

/// 题面缺失时补全一次；已有题面返回 None
pub fn attach_statement(
    session: &Session,
    statement: String,
    now: DateTime<Utc>,
) -> Option<Session> {
    if session.problem.statement.is_some() {
        return None;
    }

    let mut next = session.clone();
    next.problem.statement = Some(statement);
    next.updated_at = now;
    Some(next)
}

/// 记录用户自评，与状态无关
pub fn record_self_report(
    session: &Session,
    difficulty: Option<String>,
    result: Option<String>,
    now: DateTime<Utc>,
) -> Session {
    let mut next = session.clone();
    next.log_difficulty = difficulty;
    next.log_result = result;
    next.logged_at = Some(now);
    next.updated_at = now;
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Language, Platform, Problem, Verdict};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn draft() -> Session {
        let problem = Problem {
            id: "two-sum".to_string(),
            title: "Two Sum".to_string(),
            platform: Platform::LeetCode,
            difficulty: "Easy".to_string(),
            tags: vec!["array".to_string(), "hash-table".to_string()],
            url: None,
            statement: None,
            constraints: None,
            test_cases: None,
        };
        Session::new("s-1".to_string(), problem, now())
    }

    fn judge() -> JudgeResult {
        JudgeResult {
            verdict: Verdict::LikelyPass,
            confidence: Some(0.8),
            reasons: vec!["a".to_string(), "b".to_string()],
            edge_cases: None,
            time_complexity: Some("O(n)".to_string()),
            next_actions: None,
            created_at: now(),
        }
    }

    fn all_transitions(session: &Session) -> Vec<Session> {
        let later = now() + Duration::hours(1);
        let mut out = Vec::new();
        if let Ok(s) = record_submission(session, judge(), later) {
            out.push(s);
        }
        if let Ok(s) = record_check(
            session,
            UnderstandingAnswers::default(),
            UnderstandingLevel::Full,
            false,
            later,
        ) {
            out.push(s);
        }
        if let Ok(s) = mark_review_done(session, later) {
            out.push(s);
        }
        out.push(apply_patch(session, SessionPatch::code("x"), later));
        out.push(apply_patch(session, full_patch(), later));
        out
    }

    /// 覆盖所有可编辑字段的补丁
    fn full_patch() -> SessionPatch {
        SessionPatch {
            language: Some(Language::Typescript),
            code: Some(String::new()),
            run_output: Some("1".to_string()),
            understanding_answers: Some(UnderstandingAnswers::default()),
            log_difficulty: Some("hard".to_string()),
            log_result: Some("failed".to_string()),
            logged_at: Some(now()),
        }
    }

    #[test]
    fn test_empty_code_rejected_without_change() {
        let mut session = draft();
        session.code = "   \n\t".to_string();

        let err = record_submission(&session, judge(), now()).unwrap_err();
        assert!(matches!(err, ReviewError::Validation(ValidationError::EmptyCode)));
        assert_eq!(session.status, SessionStatus::Draft);
        assert!(session.judge.is_none());
    }

    #[test]
    fn test_submission_moves_to_submitted() {
        let mut session = draft();
        session.code = "print(1)".to_string();
        let later = now() + Duration::minutes(5);

        let next = record_submission(&session, judge(), later).unwrap();
        assert_eq!(next.status, SessionStatus::Submitted);
        assert_eq!(next.judge, Some(judge()));
        assert_eq!(next.updated_at, later);
        assert_eq!(next.created_at, session.created_at);
    }

    #[test]
    fn test_resubmission_keeps_scheduled() {
        let mut session = draft();
        session.code = "print(1)".to_string();
        session.status = SessionStatus::Scheduled;

        let mut second = judge();
        second.verdict = Verdict::TleRisk;
        let next = record_submission(&session, second.clone(), now()).unwrap();
        assert_eq!(next.status, SessionStatus::Scheduled);
        assert_eq!(next.judge, Some(second));
    }

    #[test]
    fn test_check_schedules_review() {
        let mut session = draft();
        session.status = SessionStatus::Submitted;
        let answers = UnderstandingAnswers {
            q1: "hash map".to_string(),
            q2: "O(n)".to_string(),
            q3: " duplicates ".to_string(),
        };

        let next = record_check(
            &session,
            answers.clone(),
            UnderstandingLevel::Partial,
            false,
            now(),
        )
        .unwrap();

        assert_eq!(next.status, SessionStatus::Scheduled);
        assert_eq!(next.understanding_answers, Some(answers));
        assert_eq!(next.understanding_level, Some(UnderstandingLevel::Partial));
        assert_eq!(next.review_at, Some(now() + Duration::days(3)));
    }

    #[test]
    fn test_check_from_draft_is_invalid() {
        let err = record_check(
            &draft(),
            UnderstandingAnswers::default(),
            UnderstandingLevel::Surface,
            false,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTransition { .. }));
    }

    #[test]
    fn test_mark_done_uses_recorded_level() {
        let mut session = draft();
        session.status = SessionStatus::Scheduled;
        session.understanding_level = Some(UnderstandingLevel::Surface);
        session.review_at = Some(now() - Duration::days(1));

        let next = mark_review_done(&session, now()).unwrap();
        assert_eq!(next.reviewed_at, Some(now()));
        assert_eq!(next.review_at, Some(now() + Duration::days(1)));
        assert_eq!(next.review_count, 1);
        assert_eq!(next.status, SessionStatus::Scheduled);
    }

    #[test]
    fn test_mark_done_without_level_defaults_to_three_days() {
        let mut session = draft();
        session.status = SessionStatus::Scheduled;

        let next = mark_review_done(&session, now()).unwrap();
        assert_eq!(next.review_at, Some(now() + Duration::days(3)));
    }

    #[test]
    fn test_mark_done_requires_scheduled() {
        let err = mark_review_done(&draft(), now()).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTransition { .. }));
    }

    #[test]
    fn test_patch_never_changes_status() {
        for status in [
            SessionStatus::Draft,
            SessionStatus::Submitted,
            SessionStatus::Scheduled,
        ] {
            let mut session = draft();
            session.status = status;

            let next = apply_patch(&session, full_patch(), now());
            assert_eq!(next.status, status);
            assert_eq!(next.review_at, session.review_at);
            assert_eq!(next.judge, session.judge);
        }
    }

    #[test]
    fn test_patch_rejects_lifecycle_fields() {
        for body in [
            json!({ "status": "CHECKED" }),
            json!({ "status": "SCHEDULED", "code": "x" }),
            json!({ "reviewAt": "2024-05-04T12:00:00Z" }),
            json!({ "understandingLevel": "FULL" }),
            json!({ "reviewedAt": "2024-05-04T12:00:00Z" }),
        ] {
            assert!(serde_json::from_value::<SessionPatch>(body).is_err());
        }

        let patch: SessionPatch = serde_json::from_value(json!({ "runOutput": "3" })).unwrap();
        assert_eq!(patch.run_output.as_deref(), Some("3"));
    }

    #[test]
    fn test_judgement_is_recorded_even_if_code_was_cleared() {
        let session = draft();
        assert!(validate_submission(&session).is_err());

        let next = record_judgement(&session, judge(), now());
        assert_eq!(next.status, SessionStatus::Submitted);
        assert_eq!(next.judge, Some(judge()));
        assert_eq!(next.code, "");
    }

    #[test]
    fn test_patch_merges_only_given_fields() {
        let mut session = draft();
        session.code = "old".to_string();
        session.run_output = Some("out".to_string());
        let later = now() + Duration::seconds(30);

        let next = apply_patch(&session, SessionPatch::code("new"), later);
        assert_eq!(next.code, "new");
        assert_eq!(next.run_output.as_deref(), Some("out"));
        assert_eq!(next.updated_at, later);
        assert_eq!(next.id, session.id);
        assert_eq!(next.created_at, session.created_at);
    }

    #[test]
    fn test_checked_is_unreachable() {
        let mut frontier = vec![draft()];
        frontier[0].code = "print(1)".to_string();
        let mut seen = Vec::new();

        for _ in 0..4 {
            let mut next_frontier = Vec::new();
            for session in &frontier {
                for next in all_transitions(session) {
                    // 排期只能来自理解检查，复习时间总是由调度计算
                    if next.status == SessionStatus::Scheduled {
                        assert!(next.review_at.is_some());
                        assert!(next.understanding_level.is_some());
                    }
                    seen.push(next.status);
                    next_frontier.push(next);
                }
            }
            frontier = next_frontier;
        }

        assert!(seen.contains(&SessionStatus::Submitted));
        assert!(seen.contains(&SessionStatus::Scheduled));
        assert!(!seen.contains(&SessionStatus::Checked));
    }

    #[test]
    fn test_statement_attached_once() {
        let session = draft();
        let enriched = attach_statement(&session, "Given an array...".to_string(), now()).unwrap();
        assert_eq!(enriched.problem.statement.as_deref(), Some("Given an array..."));
        assert!(attach_statement(&enriched, "other".to_string(), now()).is_none());
    }

    #[test]
    fn test_self_report_is_independent_of_status() {
        let session = draft();
        let next = record_self_report(
            &session,
            Some("3".to_string()),
            Some("solved".to_string()),
            now(),
        );
        assert_eq!(next.status, SessionStatus::Draft);
        assert_eq!(next.logged_at, Some(now()));
        assert_eq!(next.log_result.as_deref(), Some("solved"));
    }
}
