//! Task models

use super::validate_not_blank;
use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    /// Statuses shown on the dashboard as still open
    pub const OPEN: [TaskStatus; 2] = [TaskStatus::Pending, TaskStatus::InProgress];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "task_priority", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deal_id: Option<Uuid>,
    pub assigned_to_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub deal_id: Option<Uuid>,
    pub assigned_to_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub deal_id: Option<Uuid>,
    pub assigned_to_id: Uuid,
}

impl NewTask {
    pub fn from_request(req: CreateTaskRequest, caller: Uuid) -> Self {
        Self {
            title: req.title,
            description: req.description,
            priority: req.priority.unwrap_or_default(),
            due_date: req.due_date,
            deal_id: req.deal_id,
            assigned_to_id: req.assigned_to_id.unwrap_or(caller),
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to_id: Option<Uuid>,
}

/// A task update with the completion timestamp resolved.
///
/// `completed_at` is always written, unlike the other fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskChanges {
    pub fn apply(&self, task: &mut Task) {
        if let Some(v) = &self.title {
            task.title = v.clone();
        }
        if let Some(v) = &self.description {
            task.description = Some(v.clone());
        }
        if let Some(v) = self.status {
            task.status = v;
        }
        if let Some(v) = self.priority {
            task.priority = v;
        }
        if let Some(v) = self.due_date {
            task.due_date = Some(v);
        }
        if let Some(v) = self.assigned_to_id {
            task.assigned_to_id = v;
        }
        task.completed_at = self.completed_at;
    }
}

/// Query string of `GET /api/tasks`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Any of these statuses; empty means all
    pub statuses: Vec<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assigned_to: Option<Uuid>,
    pub deal_id: Option<Uuid>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&task.status))
            && self.priority.map_or(true, |p| task.priority == p)
            && self.assigned_to.map_or(true, |u| task.assigned_to_id == u)
            && self.deal_id.map_or(true, |d| task.deal_id == Some(d))
    }
}

impl From<&TaskQuery> for TaskFilter {
    fn from(query: &TaskQuery) -> Self {
        Self {
            statuses: query.status.into_iter().collect(),
            priority: query.priority,
            assigned_to: query.assigned_to,
            deal_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignee_defaults_to_caller() {
        let caller = Uuid::new_v4();
        let req: CreateTaskRequest =
            serde_json::from_value(serde_json::json!({"title": "Send contract"})).unwrap();
        let task = NewTask::from_request(req, caller);
        assert_eq!(task.assigned_to_id, caller);
        assert_eq!(task.priority, TaskPriority::Medium);
    }

    #[test]
    fn test_status_filter_accepts_any_listed() {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: "Call back".into(),
            description: None,
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
            due_date: None,
            completed_at: None,
            deal_id: None,
            assigned_to_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        let open = TaskFilter {
            statuses: TaskStatus::OPEN.to_vec(),
            ..Default::default()
        };
        assert!(open.matches(&task));

        let done = TaskFilter {
            statuses: vec![TaskStatus::Completed],
            ..Default::default()
        };
        assert!(!done.matches(&task));
    }
}
