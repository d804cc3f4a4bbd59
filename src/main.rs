use anyhow::Result;

use interview_review::config::AppConfig;
use interview_review::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, warnings) = AppConfig::from_env();

    logging::init(config.log_level, config.log_file.as_deref())?;
    for warning in &warnings {
        log::warn!("{}", warning);
    }
    log::info!(
        "interview-review {} starting, data in {}",
        env!("CARGO_PKG_VERSION"),
        config.data_dir.display()
    );

    interview_review::run(config).await
}
