//! 复习调度
//! 根据理解程度计算下次复习时间，是复习间隔策略的唯一来源

use chrono::{DateTime, Duration, Utc};

use crate::models::UnderstandingLevel;

/// 理解程度对应的复习间隔
///
/// SURFACE 1 天，PARTIAL 3 天，FULL 7 天（`extended_interval` 时 14 天）。
pub fn interval_for(level: UnderstandingLevel, extended_interval: bool) -> Duration {
    match level {
        UnderstandingLevel::Surface => Duration::days(1),
        UnderstandingLevel::Partial => Duration::days(3),
        UnderstandingLevel::Full if extended_interval => Duration::days(14),
        UnderstandingLevel::Full => Duration::days(7),
    }
}

/// 以给定时刻为基准计算下次复习时间
pub fn compute_review_at_from(
    now: DateTime<Utc>,
    level: UnderstandingLevel,
    extended_interval: bool,
) -> DateTime<Utc> {
    now + interval_for(level, extended_interval)
}

/// 以当前时刻为基准计算下次复习时间
pub fn compute_review_at(level: UnderstandingLevel, extended_interval: bool) -> DateTime<Utc> {
    compute_review_at_from(Utc::now(), level, extended_interval)
}
