// 日志初始化
// log 门面 + fern 输出到 stderr，可选追加写入日志文件

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 日志行格式：`[时间 级别 模块] 消息`
pub fn format_line(
    time: &str,
    level: log::Level,
    target: &str,
    message: &std::fmt::Arguments<'_>,
) -> String {
    format!("[{} {} {}] {}", time, level, target, message)
}

/// 初始化全局日志，只能调用一次
pub fn init(level: log::LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
            out.finish(format_args!(
                "{}",
                format_line(&time, record.level(), record.target(), message)
            ))
        })
        .level(level)
        // 第三方 HTTP 栈过于啰嗦
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("hyper_util", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .chain(std::io::stderr());

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
        let file = fern::log_file(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        dispatch = dispatch.chain(file);
    }

    dispatch.apply().context("logger already initialized")?;
    Ok(())
}
