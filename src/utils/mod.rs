use std::env;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "interview-review";

/// 应用数据目录，`$HOME` 不存在时退回当前目录
pub fn get_app_data_dir() -> PathBuf {
    let mut path = env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    path.push(".local/share");
    path.push(APP_DIR);
    path
}

pub fn get_database_path(data_dir: &Path) -> PathBuf {
    data_dir.join("interview-review.db")
}

pub fn get_log_path(data_dir: &Path) -> PathBuf {
    data_dir.join("logs").join("interview-review.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_live_under_data_dir() {
        let dir = PathBuf::from("/data");
        assert_eq!(get_database_path(&dir), PathBuf::from("/data/interview-review.db"));
        assert_eq!(get_log_path(&dir), PathBuf::from("/data/logs/interview-review.log"));
        assert!(get_app_data_dir().ends_with("interview-review"));
    }
}
