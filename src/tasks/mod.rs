//! Task lifecycle store: state-machine-governed work units with DAG
//! dependency validation and an append-only note trail.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is a transition on the lifecycle diagram.
    fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Blocked)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (Blocked, InProgress)
        )
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Note {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub assigned_to: String,
    pub created_by: String,
    pub priority: u8,
    pub status: TaskStatus,
    pub progress: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub dependencies: Vec<Uuid>,
    pub metadata: serde_json::Value,
    pub notes: Vec<Note>,
}

struct TaskStore {
    tasks: HashMap<Uuid, Task>,
    by_agent: HashMap<String, HashSet<Uuid>>,
}

pub struct TaskManager {
    store: Mutex<TaskStore>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(TaskStore {
                tasks: HashMap::new(),
                by_agent: HashMap::new(),
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_task(
        &self,
        title: impl Into<String>,
        description: impl Into<String>,
        assigned_to: impl Into<String>,
        created_by: impl Into<String>,
        priority: u8,
        due_date: Option<DateTime<Utc>>,
        dependencies: Vec<Uuid>,
        metadata: serde_json::Value,
    ) -> CoreResult<Task> {
        if !(1..=5).contains(&priority) {
            return Err(CoreError::validation("priority must be in 1..=5"));
        }
        let mut store = self.store.lock().unwrap();
        for dep in &dependencies {
            if !store.tasks.contains_key(dep) {
                return Err(CoreError::not_found("task", dep.to_string()));
            }
        }

        let assigned_to = assigned_to.into();
        let id = Uuid::new_v4();
        // A fresh task id cannot appear in any existing task's dependency
        // chain yet, so the only cycle to guard against is a dependency
        // list that (transitively) depends on itself — impossible for a
        // brand-new id. Validate anyway for defense against duplicate ids.
        if dependencies.contains(&id) {
            return Err(CoreError::conflict("task cannot depend on itself"));
        }

        let now = Utc::now();
        let task = Task {
            id,
            title: title.into(),
            description: description.into(),
            assigned_to: assigned_to.clone(),
            created_by: created_by.into(),
            priority,
            status: TaskStatus::Pending,
            progress: 0.0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            due_date,
            dependencies,
            metadata,
            notes: Vec::new(),
        };
        store.tasks.insert(id, task.clone());
        store.by_agent.entry(assigned_to).or_default().insert(id);
        Ok(task)
    }

    pub fn get_task(&self, task_id: Uuid) -> CoreResult<Task> {
        self.store
            .lock()
            .unwrap()
            .tasks
            .get(&task_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("task", task_id.to_string()))
    }

    pub fn update_status(
        &self,
        task_id: Uuid,
        new_status: TaskStatus,
        progress: Option<f32>,
        note: Option<String>,
    ) -> CoreResult<Task> {
        let mut store = self.store.lock().unwrap();
        let task = store
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| CoreError::not_found("task", task_id.to_string()))?;

        if task.status != new_status && !task.status.can_transition_to(new_status) {
            return Err(CoreError::conflict(format!(
                "invalid transition from {:?} to {new_status:?}",
                task.status
            )));
        }

        task.status = new_status;
        if let Some(p) = progress {
            task.progress = p.clamp(0.0, 1.0);
        }
        if new_status == TaskStatus::Completed {
            task.progress = 1.0;
            task.completed_at = Some(Utc::now());
        }
        if let Some(content) = note {
            task.notes.push(Note {
                content,
                timestamp: Utc::now(),
            });
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    pub fn reassign(&self, task_id: Uuid, new_assignee: impl Into<String>) -> CoreResult<Task> {
        let new_assignee = new_assignee.into();
        let mut store = self.store.lock().unwrap();
        let old_assignee = store
            .tasks
            .get(&task_id)
            .map(|t| t.assigned_to.clone())
            .ok_or_else(|| CoreError::not_found("task", task_id.to_string()))?;

        if let Some(set) = store.by_agent.get_mut(&old_assignee) {
            set.remove(&task_id);
        }
        store
            .by_agent
            .entry(new_assignee.clone())
            .or_default()
            .insert(task_id);

        let task = store.tasks.get_mut(&task_id).unwrap();
        let note = format!("Reassigned from {} to {}", old_assignee, new_assignee);
        task.assigned_to = new_assignee;
        task.notes.push(Note {
            content: note,
            timestamp: Utc::now(),
        });
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    pub fn add_note(&self, task_id: Uuid, content: impl Into<String>) -> CoreResult<Task> {
        let mut store = self.store.lock().unwrap();
        let task = store
            .tasks
            .get_mut(&task_id)
            .ok_or_else(|| CoreError::not_found("task", task_id.to_string()))?;
        task.notes.push(Note {
            content: content.into(),
            timestamp: Utc::now(),
        });
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    pub fn tasks_for_agent(&self, agent_id: &str, status_filter: Option<TaskStatus>) -> Vec<Task> {
        let store = self.store.lock().unwrap();
        store
            .by_agent
            .get(agent_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| store.tasks.get(id))
                    .filter(|t| status_filter.is_none_or(|s| t.status == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn all_tasks(&self, status_filter: Option<TaskStatus>) -> Vec<Task> {
        self.store
            .lock()
            .unwrap()
            .tasks
            .values()
            .filter(|t| status_filter.is_none_or(|s| t.status == s))
            .cloned()
            .collect()
    }

    pub fn delete_task(&self, task_id: Uuid) -> CoreResult<()> {
        let mut store = self.store.lock().unwrap();
        let task = store
            .tasks
            .remove(&task_id)
            .ok_or_else(|| CoreError::not_found("task", task_id.to_string()))?;
        if let Some(set) = store.by_agent.get_mut(&task.assigned_to) {
            set.remove(&task_id);
        }
        Ok(())
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_task() -> (TaskManager, Uuid) {
        let mgr = TaskManager::new();
        let task = mgr
            .create_task(
                "Title",
                "Description",
                "agent-1",
                "system",
                3,
                None,
                vec![],
                serde_json::Value::Null,
            )
            .unwrap();
        (mgr, task.id)
    }

    #[test]
    fn valid_transition_sequence() {
        let (mgr, id) = manager_with_task();
        mgr.update_status(id, TaskStatus::InProgress, None, None)
            .unwrap();
        let task = mgr
            .update_status(id, TaskStatus::Completed, None, None)
            .unwrap();
        assert_eq!(task.progress, 1.0);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn invalid_transition_rejected() {
        let (mgr, id) = manager_with_task();
        let err = mgr
            .update_status(id, TaskStatus::Completed, None, None)
            .unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::Conflict);
    }

    #[test]
    fn dependency_on_missing_task_rejected() {
        let mgr = TaskManager::new();
        let result = mgr.create_task(
            "t",
            "d",
            "agent-1",
            "system",
            3,
            None,
            vec![Uuid::new_v4()],
            serde_json::Value::Null,
        );
        assert!(result.is_err());
    }

    #[test]
    fn reassign_moves_between_agent_indices() {
        let (mgr, id) = manager_with_task();
        mgr.reassign(id, "agent-2").unwrap();
        assert!(mgr.tasks_for_agent("agent-1", None).is_empty());
        assert_eq!(mgr.tasks_for_agent("agent-2", None).len(), 1);
    }

    #[test]
    fn priority_out_of_range_rejected() {
        let mgr = TaskManager::new();
        let result = mgr.create_task(
            "t",
            "d",
            "agent-1",
            "system",
            9,
            None,
            vec![],
            serde_json::Value::Null,
        );
        assert!(result.is_err());
    }
}
