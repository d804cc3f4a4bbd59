//! 响应归一化
//! 把外部工作流返回的各种形状的 JSON 统一成固定结构，任何输入都不会报错

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::models::UnderstandingLevel;

/// 单个测试用例的比对详情
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseDetail {
    pub input: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub passed: Option<bool>,
}

/// 归一化后的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult {
    pub verdict: Option<String>,
    pub passed: u32,
    pub total: u32,
    pub understanding_level: Option<String>,
    pub needs_review: bool,
    pub review_days: Vec<i64>,
    pub hint: Option<String>,
    pub followup_questions: Vec<String>,
    pub actual_output: Option<String>,
    pub expected_output: Option<String>,
    pub test_cases: Vec<TestCaseDetail>,
}

impl NormalizedResult {
    /// 理解程度（忽略大小写）
    pub fn understanding(&self) -> Option<UnderstandingLevel> {
        match self.understanding_level.as_deref()?.trim().to_ascii_uppercase().as_str() {
            "SURFACE" => Some(UnderstandingLevel::Surface),
            "PARTIAL" => Some(UnderstandingLevel::Partial),
            "FULL" => Some(UnderstandingLevel::Full),
            _ => None,
        }
    }
}

// 候选键按优先级排列，包含上游工作流里出现过的拼写变体
const VERDICT_KEYS: &[&str] = &["verdict", "Verdict", "judgeResult", "result"];
const PASSED_KEYS: &[&str] = &["passed", "passedCount", "passed_count", "passCount"];
const TOTAL_KEYS: &[&str] = &["total", "totalCount", "total_count", "totalCases"];
const LEVEL_KEYS: &[&str] = &[
    "understandingLevel",
    "understanding_level",
    "understandingLevle",
    "level",
];
const NEEDS_REVIEW_KEYS: &[&str] = &["needsReview", "needs_review", "needReview"];
const REVIEW_DAYS_KEYS: &[&str] = &["reviewDays", "review_days", "reveiwDays", "reviewDay"];
const HINT_KEYS: &[&str] = &["hint", "hintText", "hint_text"];
const FOLLOWUP_KEYS: &[&str] = &[
    "followupQuestions",
    "followUpQuestions",
    "followup_questions",
    "follwupQuestions",
    "followupQuestons",
];
const ACTUAL_KEYS: &[&str] = &["actualOutput", "actual_output", "actual"];
const EXPECTED_KEYS: &[&str] = &["expectedOutput", "expected_output", "expected"];
const TEST_CASE_KEYS: &[&str] = &["testCases", "test_cases", "testcases", "cases", "details"];
const ENVELOPE_KEYS: &[&str] = &["output", "data", "result", "json"];

const CASE_INPUT_KEYS: &[&str] = &["input", "stdin"];
const CASE_EXPECTED_KEYS: &[&str] = &["expected", "expectedOutput", "expected_output"];
const CASE_ACTUAL_KEYS: &[&str] = &["actual", "actualOutput", "actual_output", "output", "stdout"];
const CASE_PASSED_KEYS: &[&str] = &["passed", "pass", "ok", "isPassed"];

// ==================== 列表解析策略 ====================

/// 字符串到列表的解析策略，无法解析时返回 None
pub type ListStrategy = fn(&str) -> Option<Vec<String>>;

/// 按顺序尝试的策略链
pub const LIST_STRATEGIES: &[(&str, ListStrategy)] = &[
    ("json", parse_json_list),
    ("salvage", salvage_truncated_json),
    ("pipe", split_pipe),
    ("comma", split_comma),
    ("wrap", wrap_raw),
];

fn quoted_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""((?:[^"\\]|\\.)*)""#).expect("quoted string pattern is valid")
    })
}

fn non_empty(items: Vec<String>) -> Option<Vec<String>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn array_items(items: &[Value]) -> Vec<String> {
    items.iter().filter_map(scalar_to_string).collect()
}

/// 字符串本身是 JSON 数组
pub fn parse_json_list(raw: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(raw.trim()).ok()? {
        Value::Array(items) => non_empty(array_items(&items)),
        _ => None,
    }
}

/// 被截断的 JSON 数组：补上引号与右括号再解析，仍失败则提取引号内的子串
pub fn salvage_truncated_json(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') || trimmed.ends_with(']') {
        return None;
    }

    for suffix in ["\"]", "]"] {
        if let Some(items) = parse_json_list(&format!("{}{}", trimmed, suffix)) {
            return Some(items);
        }
    }

    let items = quoted_pattern()
        .captures_iter(trimmed)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().replace("\\\"", "\"").trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    non_empty(items)
}

fn split_on(raw: &str, delimiter: char) -> Option<Vec<String>> {
    if !raw.contains(delimiter) {
        return None;
    }
    let items = raw
        .split(delimiter)
        .map(|part| part.trim().trim_matches('"').trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();
    non_empty(items)
}

pub fn split_pipe(raw: &str) -> Option<Vec<String>> {
    split_on(raw, '|')
}

pub fn split_comma(raw: &str) -> Option<Vec<String>> {
    split_on(raw, ',')
}

/// 兜底：把原字符串包成单元素列表
pub fn wrap_raw(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(vec![trimmed.to_string()])
    }
}

/// 字符串按策略链解析为列表
pub fn parse_string_list(raw: &str) -> Vec<String> {
    LIST_STRATEGIES
        .iter()
        .find_map(|(_, strategy)| strategy(raw))
        .unwrap_or_default()
}

/// 任意 JSON 值解析为字符串列表
pub fn value_to_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => array_items(items),
        Value::String(s) => parse_string_list(s),
        Value::Null => Vec::new(),
        other => scalar_to_string(other).into_iter().collect(),
    }
}

/// 数字转换，失败的元素直接丢弃
fn coerce_day(item: &str) -> Option<i64> {
    let trimmed = item.trim();
    if let Ok(day) = trimmed.parse::<i64>() {
        return Some(day);
    }
    let float = trimmed.parse::<f64>().ok()?;
    if float.is_finite() && float.fract() == 0.0 {
        Some(float as i64)
    } else {
        None
    }
}

// ==================== 字段提取 ====================

fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find(|value| !value.is_null())
}

fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::String(_) | Value::Number(_) => scalar_to_string(value),
            _ => None,
        })
}

fn count_field(map: &Map<String, Value>, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(|value| match value {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        })
}

fn bool_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn bool_field(map: &Map<String, Value>, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .find_map(bool_value)
}

fn test_case_detail(value: &Value) -> Option<TestCaseDetail> {
    let map = value.as_object()?;
    Some(TestCaseDetail {
        input: string_field(map, CASE_INPUT_KEYS),
        expected: string_field(map, CASE_EXPECTED_KEYS),
        actual: string_field(map, CASE_ACTUAL_KEYS),
        passed: bool_field(map, CASE_PASSED_KEYS),
    })
}

fn test_cases(value: &Value) -> Vec<TestCaseDetail> {
    match value {
        Value::Array(items) => items.iter().filter_map(test_case_detail).collect(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items.iter().filter_map(test_case_detail).collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// 剥掉工作流常见的外层包装（数组、output/data/result 字段、字符串化的 JSON）
fn unwrap_envelope(value: &Value) -> Value {
    match value {
        Value::Array(items) => items
            .iter()
            .find(|item| item.is_object())
            .map(unwrap_envelope)
            .unwrap_or_else(|| value.clone()),
        Value::Object(map) if string_field(map, VERDICT_KEYS).is_none() => ENVELOPE_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|inner| match inner {
                Value::Object(_) | Value::Array(_) => Some(unwrap_envelope(inner)),
                Value::String(s) => match serde_json::from_str::<Value>(s) {
                    Ok(parsed @ Value::Object(_)) => Some(unwrap_envelope(&parsed)),
                    _ => None,
                },
                _ => None,
            })
            .unwrap_or_else(|| value.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => unwrap_envelope(&parsed),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

// ==================== 入口 ====================

/// 归一化任意 JSON
pub fn normalize(value: &Value) -> NormalizedResult {
    let unwrapped = unwrap_envelope(value);
    let Some(map) = unwrapped.as_object() else {
        return NormalizedResult::default();
    };

    let test_cases = first_present(map, TEST_CASE_KEYS)
        .map(test_cases)
        .unwrap_or_default();

    let passed = count_field(map, PASSED_KEYS).unwrap_or_else(|| {
        test_cases
            .iter()
            .filter(|case| case.passed == Some(true))
            .count() as u32
    });
    let total = count_field(map, TOTAL_KEYS).unwrap_or(test_cases.len() as u32);

    let review_days = first_present(map, REVIEW_DAYS_KEYS)
        .map(value_to_list)
        .unwrap_or_default()
        .iter()
        .filter_map(|item| coerce_day(item))
        .collect();

    NormalizedResult {
        verdict: string_field(map, VERDICT_KEYS),
        passed,
        total,
        understanding_level: string_field(map, LEVEL_KEYS),
        needs_review: bool_field(map, NEEDS_REVIEW_KEYS).unwrap_or(false),
        review_days,
        hint: string_field(map, HINT_KEYS),
        followup_questions: first_present(map, FOLLOWUP_KEYS)
            .map(value_to_list)
            .unwrap_or_default(),
        actual_output: string_field(map, ACTUAL_KEYS),
        expected_output: string_field(map, EXPECTED_KEYS),
        test_cases,
    }
}

/// 归一化原始响应文本，非 JSON 时返回默认值
pub fn normalize_str(raw: &str) -> NormalizedResult {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => normalize(&value),
        Err(e) => {
            log::debug!("response body is not JSON ({}), using empty result", e);
            NormalizedResult::default()
        }
    }
}
