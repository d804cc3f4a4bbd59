//! 判题客户端
//! 提供启发式 Mock 判题与远程 webhook 判题两种实现，以及判题响应的结构校验与兜底

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::ops::Range;
use std::sync::Arc;
use tokio::time::Duration;

use crate::error::{Result, ReviewError};
use crate::models::{JudgeResult, Language, NextAction, Platform, Session, Verdict};

/// 判题请求中的题目摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSummary {
    pub id: String,
    pub title: String,
    pub platform: Platform,
    pub difficulty: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,
}

/// 判题请求
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgePayload {
    pub session_id: String,
    pub problem: ProblemSummary,
    pub language: Language,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_output: Option<String>,
}

impl JudgePayload {
    pub fn from_session(session: &Session, user_explanation: Option<String>) -> Self {
        let problem = &session.problem;
        Self {
            session_id: session.id.clone(),
            problem: ProblemSummary {
                id: problem.id.clone(),
                title: problem.title.clone(),
                platform: problem.platform,
                difficulty: problem.difficulty.clone(),
                tags: problem.tags.clone(),
                url: problem.url.clone(),
                statement: problem.statement.clone(),
                constraints: problem.constraints.clone(),
            },
            language: session.language,
            code: session.code.clone(),
            user_explanation,
            run_output: session.run_output.clone(),
        }
    }
}

/// 判题客户端
///
/// 返回未经校验的原始 JSON，调用方通过 [`judge_result_or_fallback`] 得到可信结果。
#[async_trait]
pub trait JudgeClient: Send + Sync {
    async fn judge(&self, payload: &JudgePayload) -> Result<Value>;

    fn name(&self) -> &'static str;
}

// ==================== 响应校验 ====================

/// 判题响应的原始结构
#[derive(Debug, Deserialize)]
struct JudgeResponse {
    verdict: String,
    confidence: f64,
    reasons: Vec<String>,
    edge_cases: Vec<String>,
    time_complexity: String,
    next_actions: Vec<String>,
}

/// 校验失败时的兜底理由
pub const FALLBACK_REASONS: [&str; 2] = [
    "The judge response could not be verified.",
    "Treat this result as unconfirmed and review the solution manually.",
];

/// 固定的安全兜底结果
pub fn fallback_judge_result(now: DateTime<Utc>) -> JudgeResult {
    JudgeResult {
        verdict: Verdict::PossiblyFail,
        confidence: Some(0.5),
        reasons: FALLBACK_REASONS.iter().map(|r| r.to_string()).collect(),
        edge_cases: None,
        time_complexity: None,
        next_actions: Some(vec![NextAction::AskHint]),
        created_at: now,
    }
}

fn parse_verdict(raw: &str) -> Option<Verdict> {
    match raw {
        "LIKELY_PASS" => Some(Verdict::LikelyPass),
        "POSSIBLY_FAIL" => Some(Verdict::PossiblyFail),
        "TLE_RISK" => Some(Verdict::TleRisk),
        _ => None,
    }
}

fn parse_next_action(raw: &str) -> Option<NextAction> {
    match raw {
        "ASK_HINT" => Some(NextAction::AskHint),
        "GO_CHECK" => Some(NextAction::GoCheck),
        _ => None,
    }
}

/// 按固定结构校验判题响应
pub fn validate_judge_response(
    raw: &Value,
    now: DateTime<Utc>,
) -> std::result::Result<JudgeResult, String> {
    let response: JudgeResponse =
        serde_json::from_value(raw.clone()).map_err(|e| format!("malformed response: {}", e))?;

    let verdict = parse_verdict(&response.verdict)
        .ok_or_else(|| format!("unexpected verdict {:?}", response.verdict))?;

    if !(0.0..=1.0).contains(&response.confidence) {
        return Err(format!("confidence {} outside [0, 1]", response.confidence));
    }
    if !(2..=3).contains(&response.reasons.len()) {
        return Err(format!("expected 2-3 reasons, got {}", response.reasons.len()));
    }
    if !(2..=4).contains(&response.edge_cases.len()) {
        return Err(format!("expected 2-4 edge cases, got {}", response.edge_cases.len()));
    }
    if response.next_actions.is_empty() {
        return Err("next_actions must not be empty".to_string());
    }

    let next_actions = response
        .next_actions
        .iter()
        .map(|action| {
            parse_next_action(action).ok_or_else(|| format!("unexpected next action {:?}", action))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(JudgeResult {
        verdict,
        confidence: Some(response.confidence),
        reasons: response.reasons,
        edge_cases: Some(response.edge_cases),
        time_complexity: Some(response.time_complexity),
        next_actions: Some(next_actions),
        created_at: now,
    })
}

/// 校验判题响应，失败时记录警告并返回兜底结果
pub fn judge_result_or_fallback(raw: &Value, now: DateTime<Utc>) -> JudgeResult {
    match validate_judge_response(raw, now) {
        Ok(result) => result,
        Err(reason) => {
            log::warn!("judge response failed validation, using fallback: {}", reason);
            fallback_judge_result(now)
        }
    }
}

// ==================== Mock 判题 ====================

/// Mock 判题按代码形状划分的分支
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBranch {
    /// 过短或含 TODO/FIXME
    Incomplete,
    /// 至少两处 `for (`
    NestedLoops,
    Plausible,
}

/// 过短代码的长度阈值（去空白后）
const MIN_CODE_LEN: usize = 50;

/// 按形状分类代码，不执行
pub fn classify_code(code: &str) -> MockBranch {
    let trimmed = code.trim();
    if trimmed.chars().count() < MIN_CODE_LEN || code.contains("TODO") || code.contains("FIXME") {
        MockBranch::Incomplete
    } else if code.matches("for (").count() >= 2 {
        MockBranch::NestedLoops
    } else {
        MockBranch::Plausible
    }
}

impl MockBranch {
    pub fn verdict(self) -> Verdict {
        match self {
            MockBranch::Incomplete => Verdict::PossiblyFail,
            MockBranch::NestedLoops => Verdict::TleRisk,
            MockBranch::Plausible => Verdict::LikelyPass,
        }
    }

    /// 置信度采样区间（左闭右开）
    pub fn confidence_range(self) -> Range<f64> {
        match self {
            MockBranch::Incomplete => 0.45..0.60,
            MockBranch::NestedLoops => 0.50..0.70,
            MockBranch::Plausible => 0.70..0.90,
        }
    }

    fn reasons(self) -> [&'static str; 2] {
        match self {
            MockBranch::Incomplete => [
                "The solution looks too short or unfinished to cover the problem.",
                "Unfinished markers or missing branches were detected.",
            ],
            MockBranch::NestedLoops => [
                "Multiple loops suggest nested iteration over the input.",
                "Quadratic work may exceed the time limit for large inputs.",
            ],
            MockBranch::Plausible => [
                "The code structure covers the main flow of the problem.",
                "No obvious performance hotspots were found.",
            ],
        }
    }

    fn edge_cases(self) -> &'static [&'static str] {
        match self {
            MockBranch::Incomplete => &["Empty input", "Minimum and maximum constraints", "Duplicate values"],
            MockBranch::NestedLoops => &["Largest N allowed by the constraints", "All elements identical"],
            MockBranch::Plausible => &["Empty input", "Single element", "Negative numbers"],
        }
    }

    fn time_complexity(self) -> &'static str {
        match self {
            MockBranch::Incomplete => "Unknown",
            MockBranch::NestedLoops => "O(n^2)",
            MockBranch::Plausible => "O(n log n)",
        }
    }
}

/// 启发式 Mock 判题
#[derive(Debug, Clone)]
pub struct MockJudge {
    delay_ms: Range<u64>,
}

impl MockJudge {
    /// 模拟 300–500ms 的网络延迟
    pub fn new() -> Self {
        Self { delay_ms: 300..500 }
    }

    pub fn without_delay() -> Self {
        Self { delay_ms: 0..0 }
    }

    /// 生成某个分支的响应
    pub fn respond(branch: MockBranch) -> Value {
        let confidence = rand::thread_rng().gen_range(branch.confidence_range());
        json!({
            "verdict": branch.verdict(),
            "confidence": confidence,
            "reasons": branch.reasons(),
            "edge_cases": branch.edge_cases(),
            "time_complexity": branch.time_complexity(),
            "next_actions": [NextAction::GoCheck],
        })
    }
}

impl Default for MockJudge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JudgeClient for MockJudge {
    async fn judge(&self, payload: &JudgePayload) -> Result<Value> {
        if !self.delay_ms.is_empty() {
            let delay = rand::thread_rng().gen_range(self.delay_ms.clone());
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let branch = classify_code(&payload.code);
        log::debug!("mock judge classified session {} as {:?}", payload.session_id, branch);
        Ok(Self::respond(branch))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==================== 远程判题 ====================

/// 远程 webhook 判题
#[derive(Clone)]
pub struct RemoteJudge {
    endpoint: String,
    http_client: Arc<reqwest::Client>,
}

impl RemoteJudge {
    /// `timeout` 为空时不设超时，停滞的请求会一直等待
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            endpoint: endpoint.into(),
            http_client: Arc::new(builder.build()?),
        })
    }
}

#[async_trait]
impl JudgeClient for RemoteJudge {
    async fn judge(&self, payload: &JudgePayload) -> Result<Value> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReviewError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Problem;
    use axum::{http::StatusCode, routing::post, Json, Router};

    fn payload(code: &str) -> JudgePayload {
        let problem = Problem {
            id: "42".to_string(),
            title: "Trapping Rain Water".to_string(),
            platform: Platform::LeetCode,
            difficulty: "Hard".to_string(),
            tags: vec!["two-pointers".to_string()],
            url: None,
            statement: None,
            constraints: None,
            test_cases: None,
        };
        let mut session = Session::new("s-42".to_string(), problem, Utc::now());
        session.code = code.to_string();
        JudgePayload::from_session(&session, None)
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/judge", addr)
    }

    fn plain_snippet() -> String {
        let code = "def solve(nums):\n    return sorted(nums)[len(nums) // 2] + 0";
        assert_eq!(code.trim().len(), 60);
        code.to_string()
    }

    #[test]
    fn test_classify_branches() {
        assert_eq!(classify_code("x=1"), MockBranch::Incomplete);
        assert_eq!(
            classify_code(&format!("{}\n# TODO handle empty", plain_snippet())),
            MockBranch::Incomplete
        );

        let loops = "for (let i = 0; i < n; i++) {\n  for (let j = 0; j < n; j++) { total += a[i] * a[j]; }\n}";
        assert!(loops.trim().len() >= 50);
        assert_eq!(classify_code(loops), MockBranch::NestedLoops);

        assert_eq!(classify_code(&plain_snippet()), MockBranch::Plausible);
    }

    #[test]
    fn test_mock_response_passes_validation() {
        for branch in [MockBranch::Incomplete, MockBranch::NestedLoops, MockBranch::Plausible] {
            for _ in 0..20 {
                let result = validate_judge_response(&MockJudge::respond(branch), Utc::now()).unwrap();
                let confidence = result.confidence.unwrap();
                assert!(branch.confidence_range().contains(&confidence));
                assert_eq!(result.verdict, branch.verdict());
                assert_eq!(result.next_actions, Some(vec![NextAction::GoCheck]));
            }
        }
    }

    #[tokio::test]
    async fn test_mock_judge_verdicts() {
        let judge = MockJudge::without_delay();
        let raw = judge.judge(&payload("x=1")).await.unwrap();
        assert_eq!(raw["verdict"], json!("POSSIBLY_FAIL"));

        let raw = judge.judge(&payload(&plain_snippet())).await.unwrap();
        assert_eq!(raw["verdict"], json!("LIKELY_PASS"));
    }

    #[test]
    fn test_schema_violations_fall_back() {
        let now = Utc::now();
        let valid = json!({
            "verdict": "TLE_RISK",
            "confidence": 0.6,
            "reasons": ["a", "b"],
            "edge_cases": ["x", "y"],
            "time_complexity": "O(n^2)",
            "next_actions": ["ASK_HINT", "GO_CHECK"]
        });
        assert!(validate_judge_response(&valid, now).is_ok());

        let mutations: Vec<(&str, Value)> = vec![
            ("verdict", json!("PASS")),
            ("confidence", json!(1.5)),
            ("reasons", json!(["only one"])),
            ("edge_cases", json!(["a", "b", "c", "d", "e"])),
            ("time_complexity", json!(42)),
            ("next_actions", json!([])),
            ("next_actions", json!(["RUN_AGAIN"])),
        ];
        for (field, bad) in mutations {
            let mut raw = valid.clone();
            raw[field] = bad;
            let result = judge_result_or_fallback(&raw, now);
            assert_eq!(result, fallback_judge_result(now), "{}", field);
        }

        let result = judge_result_or_fallback(&json!("not even an object"), now);
        assert_eq!(result.verdict, Verdict::PossiblyFail);
        assert_eq!(result.confidence, Some(0.5));
        assert_eq!(result.reasons.len(), 2);
    }

    #[test]
    fn test_payload_wire_shape() {
        let value = serde_json::to_value(payload("print(1)")).unwrap();
        assert_eq!(value["sessionId"], json!("s-42"));
        assert_eq!(value["problem"]["platform"], json!("LeetCode"));
        assert_eq!(value["language"], json!("python"));
        assert!(value.get("runOutput").is_none());
        assert!(value["problem"].get("statement").is_none());
    }

    #[tokio::test]
    async fn test_remote_judge_success_is_unvalidated() {
        let app = Router::new().route(
            "/judge",
            post(|Json(body): Json<Value>| async move {
                Json(json!({ "verdict": "WHATEVER", "echo": body["sessionId"] }))
            }),
        );
        let judge = RemoteJudge::new(serve(app).await, None).unwrap();

        let raw = judge.judge(&payload("print(1)")).await.unwrap();
        assert_eq!(raw["echo"], json!("s-42"));
        assert_eq!(raw["verdict"], json!("WHATEVER"));
    }

    #[tokio::test]
    async fn test_remote_judge_non_2xx_carries_status_and_body() {
        let app = Router::new().route(
            "/judge",
            post(|| async { (StatusCode::BAD_GATEWAY, "workflow crashed") }),
        );
        let judge = RemoteJudge::new(serve(app).await, Some(Duration::from_secs(5))).unwrap();

        let err = judge.judge(&payload("print(1)")).await.unwrap_err();
        match &err {
            ReviewError::UpstreamStatus { status, body } => {
                assert_eq!(*status, 502);
                assert_eq!(body, "workflow crashed");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let message = err.to_string();
        assert!(message.contains("502") && message.contains("workflow crashed"));
    }
}
