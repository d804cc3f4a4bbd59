// 服务模块
// 提供复习调度、会话存储、判题与结果归一化等核心业务逻辑

pub mod auth;
pub mod debounce;
pub mod judge;
pub mod lifecycle;
pub mod normalizer;
pub mod query;
pub mod scheduler;
pub mod session_store;
pub mod storage;
pub mod study;
pub mod webhook;

pub use auth::AuthFlag;

pub use debounce::{Debouncer, DEFAULT_DEBOUNCE_MS};

pub use judge::{
    classify_code,
    fallback_judge_result,
    judge_result_or_fallback,
    validate_judge_response,
    JudgeClient,
    JudgePayload,
    MockBranch,
    MockJudge,
    ProblemSummary,
    RemoteJudge,
};

pub use normalizer::{normalize, normalize_str, NormalizedResult, TestCaseDetail};

pub use query::{summarize, today_reviews, unfinished_sessions, upcoming_reviews, ReviewSummary};

pub use scheduler::{compute_review_at, compute_review_at_from, interval_for};

pub use session_store::SessionStore;

pub use storage::{KeyValueStore, MemoryStore, SqliteStore};

pub use study::{StudyService, SubmitOutcome};

pub use webhook::{SubmissionNotice, SubmissionPayload, SubmissionWebhook};
