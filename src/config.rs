// 应用配置
// 默认值 + 环境变量覆盖

use std::env;
use std::path::PathBuf;
use tokio::time::Duration;

use crate::services::debounce::DEFAULT_DEBOUNCE_MS;
use crate::utils;

/// 应用配置
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// 为空时使用 Mock 判题
    pub judge_url: Option<String>,
    pub submission_webhook_url: Option<String>,
    /// 直连失败后的代理地址
    pub proxy_url: Option<String>,
    pub code_debounce_ms: u64,
    /// 远程请求超时，为空表示不设超时
    pub judge_timeout_secs: Option<u64>,
    pub log_level: log::LevelFilter,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = utils::get_app_data_dir();
        Self {
            bind_addr: "127.0.0.1:8787".to_string(),
            db_path: utils::get_database_path(&data_dir),
            data_dir,
            judge_url: None,
            submission_webhook_url: None,
            proxy_url: None,
            code_debounce_ms: DEFAULT_DEBOUNCE_MS,
            judge_timeout_secs: None,
            log_level: log::LevelFilter::Info,
            log_file: None,
        }
    }
}

impl AppConfig {
    /// 从进程环境变量读取，同时返回被忽略的无效值说明
    ///
    /// 读取配置时日志尚未初始化，警告由调用方在初始化日志后输出。
    pub fn from_env() -> (Self, Vec<String>) {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取，空字符串视为未设置
    pub fn from_lookup<F>(lookup: F) -> (Self, Vec<String>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        let mut warnings = Vec::new();

        if let Some(addr) = get("REVIEW_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(dir) = get("REVIEW_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
            config.db_path = utils::get_database_path(&config.data_dir);
        }
        if let Some(path) = get("REVIEW_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        config.judge_url = get("REVIEW_JUDGE_URL");
        config.submission_webhook_url = get("REVIEW_SUBMISSION_WEBHOOK_URL");
        config.proxy_url = get("REVIEW_PROXY_URL");

        if let Some(raw) = get("REVIEW_CODE_DEBOUNCE_MS") {
            match raw.parse() {
                Ok(ms) => config.code_debounce_ms = ms,
                Err(_) => warnings.push(format!("ignoring invalid REVIEW_CODE_DEBOUNCE_MS={}", raw)),
            }
        }
        if let Some(raw) = get("REVIEW_JUDGE_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(0) => config.judge_timeout_secs = None,
                Ok(secs) => config.judge_timeout_secs = Some(secs),
                Err(_) => warnings.push(format!("ignoring invalid REVIEW_JUDGE_TIMEOUT_SECS={}", raw)),
            }
        }
        if let Some(raw) = get("REVIEW_LOG_LEVEL") {
            match raw.parse() {
                Ok(level) => config.log_level = level,
                Err(_) => warnings.push(format!("ignoring invalid REVIEW_LOG_LEVEL={}", raw)),
            }
        }
        if let Some(path) = get("REVIEW_LOG_FILE") {
            config.log_file = Some(PathBuf::from(path));
        } else if get("REVIEW_LOG_TO_FILE").is_some() {
            config.log_file = Some(utils::get_log_path(&config.data_dir));
        }

        (config, warnings)
    }

    pub fn code_debounce(&self) -> Duration {
        Duration::from_millis(self.code_debounce_ms)
    }

    pub fn judge_timeout(&self) -> Option<Duration> {
        self.judge_timeout_secs.map(Duration::from_secs)
    }
}
