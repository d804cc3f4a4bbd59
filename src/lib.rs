//! 面试刷题复习
//! 记录每道题的作答会话，按理解程度排期复习，并提供本地 HTTP 接口

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

use anyhow::Context;
use std::sync::Arc;

use commands::{AppState, SubmissionProxy};
use config::AppConfig;
use services::{
    AuthFlag, JudgeClient, KeyValueStore, MockJudge, RemoteJudge, SessionStore, SqliteStore,
    StudyService, SubmissionWebhook,
};

/// 按配置组装服务与命令状态
pub fn build_state(config: &AppConfig) -> error::Result<AppState> {
    let storage: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&config.db_path)?);
    let store = SessionStore::open(Arc::clone(&storage))?;

    let judge: Arc<dyn JudgeClient> = match &config.judge_url {
        Some(url) => Arc::new(RemoteJudge::new(url.clone(), config.judge_timeout())?),
        None => {
            log::info!("no judge url configured, using mock judge");
            Arc::new(MockJudge::new())
        }
    };

    let webhook = match &config.submission_webhook_url {
        Some(url) => Some(SubmissionWebhook::new(
            url.clone(),
            config.proxy_url.clone(),
            config.judge_timeout(),
        )?),
        None => None,
    };

    let proxy = SubmissionProxy::with_timeout(
        config.submission_webhook_url.clone(),
        config.judge_timeout(),
    )?;

    let study = StudyService::new(store, judge, webhook, config.code_debounce());
    Ok(AppState::new(study, AuthFlag::new(storage), proxy))
}

/// 启动 HTTP 服务，直到收到 Ctrl-C
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let state = build_state(&config).context("failed to initialize services")?;
    let app = commands::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    log::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("shutting down");
        })
        .await
        .context("server error")?;

    Ok(())
}
