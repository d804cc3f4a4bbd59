// 数据模型
// 题目、判题结果与刷题会话，序列化为 camelCase JSON 以便持久化与前端共享

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 题目来源平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "BOJ")]
    Boj,
    LeetCode,
    Programmers,
    #[serde(rename = "custom")]
    Custom,
}

/// 测试用例
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub is_hidden: bool,
}

/// 题目数据结构
///
/// 挂到会话上之后不可变，唯一例外是题面缺失时的一次性补全。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub platform: Platform,
    pub difficulty: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<Vec<TestCase>>,
}

impl Problem {
    /// 难度比较（忽略大小写）
    pub fn difficulty_is(&self, difficulty: &str) -> bool {
        self.difficulty.trim().eq_ignore_ascii_case(difficulty.trim())
    }
}

/// 提交语言
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Javascript,
    Typescript,
}

/// 判题结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
    TleRisk,
    LikelyPass,
    PossiblyFail,
}

/// 判题后建议的下一步
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextAction {
    AskHint,
    GoCheck,
}

/// 判题结果，每次提交生成一次，重复提交时覆盖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeResult {
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_cases: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_actions: Option<Vec<NextAction>>,
    pub created_at: DateTime<Utc>,
}

/// 理解程度自评
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnderstandingLevel {
    Surface,
    Partial,
    Full,
}

/// 理解检查的三道问答
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderstandingAnswers {
    pub q1: String,
    pub q2: String,
    pub q3: String,
}

/// 会话状态
///
/// 变体顺序即推进顺序，状态只允许向后推进。`Checked` 为保留状态，当前没有任何转换会产生它。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Draft,
    Submitted,
    Checked,
    Scheduled,
}

/// 刷题会话：一次针对一道题的尝试
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub problem: Problem,
    pub language: Language,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub understanding_answers: Option<UnderstandingAnswers>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub understanding_level: Option<UnderstandingLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub review_count: u32,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_difficulty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_at: Option<DateTime<Utc>>,
}

impl Session {
    /// 创建新的草稿会话
    pub fn new(id: String, problem: Problem, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
            problem,
            language: Language::default(),
            code: String::new(),
            run_output: None,
            judge: None,
            understanding_answers: None,
            understanding_level: None,
            review_at: None,
            reviewed_at: None,
            review_count: 0,
            status: SessionStatus::Draft,
            log_difficulty: None,
            log_result: None,
            logged_at: None,
        }
    }
}

/// 会话的部分更新
///
/// 只合并 `Some` 字段；`id`、`createdAt` 与题目不在其中，因此无法被修改。
/// 状态、判题结果、理解程度与复习时间只能经由生命周期转换写入，
/// 反序列化时出现这些字段直接报错。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SessionPatch {
    pub language: Option<Language>,
    pub code: Option<String>,
    pub run_output: Option<String>,
    pub understanding_answers: Option<UnderstandingAnswers>,
    pub log_difficulty: Option<String>,
    pub log_result: Option<String>,
    pub logged_at: Option<DateTime<Utc>>,
}

impl SessionPatch {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_problem() -> Problem {
        Problem {
            id: "1000".to_string(),
            title: "A+B".to_string(),
            platform: Platform::Boj,
            difficulty: "Bronze".to_string(),
            tags: vec!["math".to_string()],
            url: None,
            statement: None,
            constraints: None,
            test_cases: None,
        }
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_value(Platform::Boj).unwrap(), json!("BOJ"));
        assert_eq!(serde_json::to_value(Platform::Custom).unwrap(), json!("custom"));
        assert_eq!(serde_json::to_value(Language::Typescript).unwrap(), json!("typescript"));
        assert_eq!(serde_json::to_value(Verdict::TleRisk).unwrap(), json!("TLE_RISK"));
        assert_eq!(serde_json::to_value(NextAction::GoCheck).unwrap(), json!("GO_CHECK"));
        assert_eq!(serde_json::to_value(SessionStatus::Scheduled).unwrap(), json!("SCHEDULED"));
    }

    #[test]
    fn test_status_order_is_lifecycle_order() {
        assert!(SessionStatus::Draft < SessionStatus::Submitted);
        assert!(SessionStatus::Submitted < SessionStatus::Checked);
        assert!(SessionStatus::Checked < SessionStatus::Scheduled);
    }

    #[test]
    fn test_difficulty_is_case_insensitive() {
        let mut problem = sample_problem();
        problem.difficulty = "Medium".to_string();
        assert!(problem.difficulty_is("medium"));
        assert!(problem.difficulty_is(" MEDIUM "));
        assert!(!problem.difficulty_is("hard"));
    }

    #[test]
    fn test_session_json_is_camel_case() {
        let session = Session::new("s1".to_string(), sample_problem(), Utc::now());
        let value = serde_json::to_value(&session).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("reviewCount").is_some());
        assert_eq!(value["status"], json!("DRAFT"));
        assert_eq!(value["language"], json!("python"));
    }

    #[test]
    fn test_missing_review_count_defaults_to_zero() {
        let session = Session::new("s1".to_string(), sample_problem(), Utc::now());
        let mut value = serde_json::to_value(&session).unwrap();
        value.as_object_mut().unwrap().remove("reviewCount");
        let restored: Session = serde_json::from_value(value).unwrap();
        assert_eq!(restored.review_count, 0);
    }
}
