//! In-memory map of task identifiers to their records and control signals.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::control::TaskControl;
use crate::error::TaskError;
use crate::task::{Task, TaskId, TaskStatusView};

/// Reads never observe a half-applied update: every mutation happens under
/// the write lock and readers clone what they need.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// One registered task.
#[derive(Debug)]
pub struct TaskHandle {
    record: RwLock<Task>,
    control: TaskControl,
}

impl TaskHandle {
    pub fn new(task: Task) -> Self {
        Self { record: RwLock::new(task), control: TaskControl::new() }
    }

    pub fn id(&self) -> TaskId {
        read(&self.record).id
    }

    pub fn control(&self) -> &TaskControl {
        &self.control
    }

    /// Consistent copy of the whole record.
    pub fn snapshot(&self) -> Task {
        read(&self.record).clone()
    }

    pub fn view(&self) -> TaskStatusView {
        read(&self.record).view()
    }

    /// Runs `f` against the record under the write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut Task) -> R) -> R {
        f(&mut write(&self.record))
    }

    pub fn inspect<R>(&self, f: impl FnOnce(&Task) -> R) -> R {
        f(&read(&self.record))
    }
}

pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<TaskHandle>>>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry").field("tasks", &self.len()).finish()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self { tasks: RwLock::new(HashMap::new()) }
    }

    /// Registers a task. Identifiers are never reused.
    pub fn insert(&self, task: Task) -> Result<Arc<TaskHandle>, TaskError> {
        let id = task.id;
        let mut tasks = write(&self.tasks);
        if tasks.contains_key(&id) {
            return Err(TaskError::Duplicate(id));
        }
        let handle = Arc::new(TaskHandle::new(task));
        tasks.insert(id, Arc::clone(&handle));
        debug!(task_id = %id, "Task registered");
        Ok(handle)
    }

    pub fn get(&self, id: &TaskId) -> Result<Arc<TaskHandle>, TaskError> {
        read(&self.tasks)
            .get(id)
            .cloned()
            .ok_or(TaskError::NotFound(*id))
    }

    /// Drops a finished task. Live tasks have to be cancelled first.
    pub fn remove(&self, id: &TaskId) -> Result<Task, TaskError> {
        let mut tasks = write(&self.tasks);
        let handle = tasks.get(id).ok_or(TaskError::NotFound(*id))?;
        let snapshot = handle.snapshot();
        if !snapshot.is_terminal() {
            return Err(TaskError::InvalidState { action: "delete", status: snapshot.status });
        }
        tasks.remove(id);
        Ok(snapshot)
    }

    /// Status views, newest first.
    pub fn list(&self) -> Vec<TaskStatusView> {
        let mut views: Vec<TaskStatusView> = read(&self.tasks).values().map(|h| h.view()).collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views
    }

    pub fn len(&self) -> usize {
        read(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes terminal tasks that finished more than `ttl` ago.
    pub fn evict_expired(&self, ttl: Duration) -> usize {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let now = Utc::now();
        let mut tasks = write(&self.tasks);
        let before = tasks.len();
        tasks.retain(|_, handle| {
            handle.inspect(|t| match t.finished_at {
                Some(done) if t.is_terminal() => now.signed_duration_since(done) <= ttl,
                _ => true,
            })
        });
        before - tasks.len()
    }

    /// Evicts expired tasks every `interval` until the returned handle is aborted.
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration, ttl: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = registry.evict_expired(ttl);
                if evicted > 0 {
                    info!(evicted, remaining = registry.len(), "Evicted expired tasks");
                }
            }
        })
    }
}
