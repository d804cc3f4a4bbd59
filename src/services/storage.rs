// 持久化存储模块
// 以键值对形式保存整块 JSON，提供 SQLite 与内存两种实现

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Result, ReviewError};

/// 会话集合的存储键
pub const SESSIONS_KEY: &str = "interview-review.sessions";

/// 登录标记的存储键
pub const AUTH_KEY: &str = "interview-review.auth";

/// 键值存储
pub trait KeyValueStore: Send + Sync {
    /// 读取键对应的值
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// 写入（覆盖）键对应的值
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// 删除键
    fn remove(&self, key: &str) -> Result<()>;
}

/// SQLite 键值存储
pub struct SqliteStore {
    pool: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// 打开（必要时创建）数据库文件
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // 确保数据目录存在
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&db_path)?;
        let store = Self {
            pool: Arc::new(Mutex::new(conn)),
            db_path,
        };

        store.initialize()?;
        log::info!("opened key-value store at {}", store.db_path.display());
        Ok(store)
    }

    /// 内存数据库，主要用于测试
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            pool: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            db_path: PathBuf::from(":memory:"),
        };
        store.initialize()?;
        Ok(store)
    }

    /// 初始化表结构
    pub fn initialize(&self) -> Result<()> {
        let conn = self.pool.lock().map_err(ReviewError::poisoned)?;

        // journal_mode 会返回一行结果，内存库上为 "memory"
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl KeyValueStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let conn = self.pool.lock().map_err(ReviewError::poisoned)?;

        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                rusqlite::params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.pool.lock().map_err(ReviewError::poisoned)?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, now],
        )?;

        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.pool.lock().map_err(ReviewError::poisoned)?;

        conn.execute("DELETE FROM kv_store WHERE key = ?", rusqlite::params![key])?;

        Ok(())
    }
}

/// 内存键值存储
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(ReviewError::poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(ReviewError::poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(ReviewError::poisoned)?;
        entries.remove(key);
        Ok(())
    }
}
