//! TaskRegistry: process-wide, mutex-guarded in-memory job tracker.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;

use sim_types::domain::task::{ProgressDetail, Task, TaskFilter, TaskId, TaskStatus};

use crate::error::{Error, Result};

#[derive(Debug, Default, Clone)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub progress_detail: Option<ProgressDetail>,
}

/// One registry per process, guarded by a single mutex.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, task_type: impl Into<String>, metadata: Value) -> TaskId {
        let task = Task::new(task_type, metadata);
        let task_id = task.task_id.clone();
        self.tasks.lock().unwrap().insert(task_id.clone(), task);
        task_id
    }

    /// Atomic and monotonic in progress when transitioning to `processing`.
    pub fn update(&self, task_id: &TaskId, update: TaskUpdate) -> Result<()> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| Error::NotFound(format!("task {task_id}")))?;

        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(progress) = update.progress {
            if task.status == TaskStatus::Processing {
                task.progress = progress.max(task.progress);
            } else {
                task.progress = progress;
            }
        }
        if let Some(message) = update.message {
            task.message = message;
        }
        if update.result.is_some() {
            task.result = update.result;
        }
        if update.error.is_some() {
            task.error = update.error;
        }
        if update.progress_detail.is_some() {
            task.progress_detail = update.progress_detail;
        }
        task.updated_at = Utc::now();
        Ok(())
    }

    pub fn complete(&self, task_id: &TaskId, result: Value) -> Result<()> {
        self.update(
            task_id,
            TaskUpdate {
                status: Some(TaskStatus::Completed),
                progress: Some(100),
                result: Some(result),
                ..Default::default()
            },
        )
    }

    pub fn fail(&self, task_id: &TaskId, error: impl Into<String>) -> Result<()> {
        self.update(
            task_id,
            TaskUpdate {
                status: Some(TaskStatus::Failed),
                error: Some(error.into()),
                ..Default::default()
            },
        )
    }

    pub fn get(&self, task_id: &TaskId) -> Option<Task> {
        self.tasks.lock().unwrap().get(task_id).cloned()
    }

    pub fn list(&self, filter: Option<&TaskFilter>) -> Vec<Task> {
        let tasks = self.tasks.lock().unwrap();
        let mut items: Vec<Task> = tasks
            .values()
            .filter(|t| match filter {
                Some(f) => {
                    f.status.is_none_or(|s| s == t.status)
                        && f.task_type.as_deref().is_none_or(|ty| ty == t.task_type)
                }
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    pub fn cleanup_older_than(&self, age: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|_, t| {
            let terminal = matches!(t.status, TaskStatus::Completed | TaskStatus::Failed);
            !(terminal && t.updated_at < cutoff)
        });
        before - tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_starts_pending_at_zero_progress() {
        let registry = TaskRegistry::new();
        let id = registry.create("ontology_generation", Value::Null);
        let task = registry.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
    }

    #[test]
    fn progress_is_monotonic_while_processing() {
        let registry = TaskRegistry::new();
        let id = registry.create("graph_build", Value::Null);
        registry
            .update(&id, TaskUpdate { status: Some(TaskStatus::Processing), progress: Some(50), ..Default::default() })
            .unwrap();
        registry.update(&id, TaskUpdate { progress: Some(10), ..Default::default() }).unwrap();
        let task = registry.get(&id).unwrap();
        assert_eq!(task.progress, 50);
    }

    #[test]
    fn complete_sets_status_and_full_progress() {
        let registry = TaskRegistry::new();
        let id = registry.create("graph_build", Value::Null);
        registry.complete(&id, serde_json::json!({"graph_id": "g1"})).unwrap();
        let task = registry.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
    }

    #[test]
    fn list_filters_by_status_and_type() {
        let registry = TaskRegistry::new();
        let a = registry.create("graph_build", Value::Null);
        let _b = registry.create("ontology_generation", Value::Null);
        registry.complete(&a, Value::Null).unwrap();

        let filter = TaskFilter { status: Some(TaskStatus::Completed), task_type: None };
        let results = registry.list(Some(&filter));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].task_id, a);
    }

    #[test]
    fn update_on_unknown_task_errors() {
        let registry = TaskRegistry::new();
        let bogus = TaskId::from("does-not-exist".to_string());
        assert!(registry.update(&bogus, TaskUpdate::default()).is_err());
    }
}
