//! 会话查询
//! 只读选择器：今日待复习、即将复习、未完成三个分组

use chrono::{DateTime, Days, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Session, SessionStatus};

/// 各分组数量汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub due_today: usize,
    pub upcoming: usize,
    pub unfinished: usize,
    pub total: usize,
}

/// `now` 所在时区的次日零点
///
/// 该时刻之前（含过期）的复习都算作今日待复习。
pub fn end_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let tz = now.timezone();
    now.date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 0))
        .and_then(|midnight| tz.from_local_datetime(&midnight).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now.with_timezone(&Utc) + Duration::days(1))
}

fn scheduled_review_at(session: &Session) -> Option<DateTime<Utc>> {
    if session.status == SessionStatus::Scheduled {
        session.review_at
    } else {
        None
    }
}

/// 今日待复习：已排期且复习时间早于明日零点，按复习时间升序（最早过期的在前）
pub fn today_reviews<'a, Tz: TimeZone>(
    sessions: impl IntoIterator<Item = &'a Session>,
    now: &DateTime<Tz>,
) -> Vec<&'a Session> {
    let cutoff = end_of_day(now);
    let mut due: Vec<&Session> = sessions
        .into_iter()
        .filter(|s| scheduled_review_at(s).is_some_and(|at| at < cutoff))
        .collect();
    due.sort_by_key(|s| (s.review_at, s.created_at));
    due
}

/// 即将复习：已排期且复习时间在明日零点及之后，按复习时间升序
pub fn upcoming_reviews<'a, Tz: TimeZone>(
    sessions: impl IntoIterator<Item = &'a Session>,
    now: &DateTime<Tz>,
) -> Vec<&'a Session> {
    let cutoff = end_of_day(now);
    let mut upcoming: Vec<&Session> = sessions
        .into_iter()
        .filter(|s| scheduled_review_at(s).is_some_and(|at| at >= cutoff))
        .collect();
    upcoming.sort_by_key(|s| (s.review_at, s.created_at));
    upcoming
}

/// 未完成：尚未进入排期的会话，最近更新的在前
pub fn unfinished_sessions<'a>(
    sessions: impl IntoIterator<Item = &'a Session>,
) -> Vec<&'a Session> {
    let mut unfinished: Vec<&Session> = sessions
        .into_iter()
        .filter(|s| s.status != SessionStatus::Scheduled)
        .collect();
    unfinished.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    unfinished
}

/// 汇总各分组数量
pub fn summarize<Tz: TimeZone>(sessions: &[Session], now: &DateTime<Tz>) -> ReviewSummary {
    ReviewSummary {
        due_today: today_reviews(sessions, now).len(),
        upcoming: upcoming_reviews(sessions, now).len(),
        unfinished: unfinished_sessions(sessions).len(),
        total: sessions.len(),
    }
}
