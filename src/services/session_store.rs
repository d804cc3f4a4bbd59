//! 会话存储
//! 以 id 为键的会话集合，每次变更后同步序列化整个集合写入持久化存储

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Problem, Session, SessionPatch};
use crate::services::lifecycle;
use crate::services::storage::{KeyValueStore, SESSIONS_KEY};

/// 持久化格式版本
const SNAPSHOT_VERSION: u32 = 1;

/// 持久化快照
#[derive(Debug, Serialize, Deserialize)]
struct SessionSnapshot {
    version: u32,
    sessions: BTreeMap<String, Session>,
}

/// 会话存储
///
/// 更新为写时复制：先在副本上完成转换，持久化成功后才替换内存中的会话。
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    storage: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    /// 从持久化存储加载会话集合
    ///
    /// 数据损坏时记录警告并以空集合启动。
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let sessions = match storage.load(SESSIONS_KEY)? {
            Some(raw) => match serde_json::from_str::<SessionSnapshot>(&raw) {
                Ok(snapshot) => snapshot.sessions.into_iter().collect(),
                Err(e) => {
                    log::warn!("discarding unreadable session snapshot: {}", e);
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        };

        log::info!("loaded {} sessions", sessions.len());
        Ok(Self { sessions, storage })
    }

    // ==================== 写操作 ====================

    /// 为题目创建新会话，返回会话 id
    pub fn create(&mut self, problem: Problem) -> Result<String> {
        self.create_at(problem, Utc::now())
    }

    pub fn create_at(&mut self, problem: Problem, now: DateTime<Utc>) -> Result<String> {
        let mut id = Uuid::new_v4().to_string();
        while self.sessions.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }

        let session = Session::new(id.clone(), problem, now);
        self.commit(session)?;

        log::debug!("created session {}", id);
        Ok(id)
    }

    /// 合并部分更新
    ///
    /// 未知 id 静默忽略，返回 `Ok(false)`。
    pub fn update(&mut self, id: &str, patch: SessionPatch) -> Result<bool> {
        self.update_at(id, patch, Utc::now())
    }

    pub fn update_at(&mut self, id: &str, patch: SessionPatch, now: DateTime<Utc>) -> Result<bool> {
        let Some(current) = self.sessions.get(id) else {
            log::debug!("update ignored for unknown session {}", id);
            return Ok(false);
        };

        let next = lifecycle::apply_patch(current, patch, now);
        self.commit(next)?;
        Ok(true)
    }

    /// 写回一次纯状态转换的结果
    ///
    /// 未知 id 静默忽略；`createdAt` 始终保留原值。
    pub fn replace(&mut self, mut session: Session) -> Result<bool> {
        let Some(current) = self.sessions.get(&session.id) else {
            log::debug!("replace ignored for unknown session {}", session.id);
            return Ok(false);
        };

        session.created_at = current.created_at;
        self.commit(session)?;
        Ok(true)
    }

    /// 题面缺失时补全，已有题面则不变
    pub fn attach_statement(&mut self, id: &str, statement: String) -> Result<bool> {
        let Some(current) = self.sessions.get(id) else {
            return Ok(false);
        };

        match lifecycle::attach_statement(current, statement, Utc::now()) {
            Some(next) => {
                self.commit(next)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ==================== 读操作 ====================

    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).cloned()
    }

    /// 所有会话的快照，按创建时间排序
    pub fn all(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // ==================== 辅助方法 ====================

    /// 插入会话并持久化，持久化失败时回滚
    fn commit(&mut self, session: Session) -> Result<()> {
        let id = session.id.clone();
        let previous = self.sessions.insert(id.clone(), session);

        if let Err(e) = self.persist() {
            match previous {
                Some(old) => {
                    self.sessions.insert(id, old);
                }
                None => {
                    self.sessions.remove(&id);
                }
            }
            log::error!("failed to persist sessions: {}", e);
            return Err(e);
        }

        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let snapshot = SessionSnapshot {
            version: SNAPSHOT_VERSION,
            sessions: self
                .sessions
                .iter()
                .map(|(id, session)| (id.clone(), session.clone()))
                .collect(),
        };

        let raw = serde_json::to_string(&snapshot)?;
        self.storage.save(SESSIONS_KEY, &raw)
    }
}
