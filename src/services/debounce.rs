//! 防抖写入
//! 按键合并短时间内的多次写入：新的调度会取消尚未执行的旧任务并重新计时

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Duration;

/// 代码编辑的默认静默期
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

struct PendingTask {
    generation: u64,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<String, PendingTask>>>;

/// 可取消的防抖调度器
pub struct Debouncer {
    delay: Duration,
    pending: PendingMap,
    next_generation: AtomicU64,
}

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<String, PendingTask>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 在静默期后执行任务，覆盖同一键上尚未执行的任务
    ///
    /// 不在 tokio 运行时内调用时立即执行。
    pub fn schedule<F>(&self, key: &str, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::warn!("no async runtime, running debounced task for {} immediately", key);
                self.cancel(key);
                task();
                return;
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        let owned_key = key.to_string();

        let mut guard = lock(&self.pending);
        if let Some(previous) = guard.remove(key) {
            previous.handle.abort();
        }

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut guard = lock(&pending);
                match guard.get(&owned_key) {
                    Some(current) if current.generation == generation => {
                        guard.remove(&owned_key);
                    }
                    // 已被更新的调度取代
                    _ => return,
                }
            }

            task();
        });

        guard.insert(key.to_string(), PendingTask { generation, handle });
    }

    /// 取消键上尚未执行的任务，返回是否确有任务被取消
    pub fn cancel(&self, key: &str) -> bool {
        match lock(&self.pending).remove(key) {
            Some(task) => {
                task.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.pending).contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        for (_, task) in lock(&self.pending).drain() {
            task.handle.abort();
        }
    }
}
