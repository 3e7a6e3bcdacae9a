//! Task models and request DTOs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type TaskId = Uuid;
pub type ProjectId = Uuid;

/// Workflow status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Pending,
    Completed,
    Stuck,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::NotStarted,
        TaskStatus::InProgress,
        TaskStatus::Pending,
        TaskStatus::Completed,
        TaskStatus::Stuck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Stuck => "stuck",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// A project grouping tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// A task row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    /// Orthogonal to `status`: archiving keeps the status for unarchive
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_gantt_task: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new active, not-started task
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            title: title.into(),
            status: TaskStatus::NotStarted,
            priority: Priority::default(),
            due_date: None,
            is_archived: false,
            is_gantt_task: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Position-determining state of the task's card
    pub fn card_state(&self) -> CardState {
        CardState {
            status: self.status,
            archived: self.is_archived,
        }
    }

    /// Overwrite status and archive flag from a card state
    pub fn set_card_state(&mut self, state: CardState) {
        self.status = state.status;
        self.is_archived = state.archived;
    }

    /// Apply the set fields of `patch`
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(is_archived) = patch.is_archived {
            self.is_archived = is_archived;
        }
        self.updated_at = Some(Utc::now());
    }
}

/// `(status, archived)` — every card's column is a function of this pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardState {
    pub status: TaskStatus,
    pub archived: bool,
}

impl CardState {
    pub fn active(status: TaskStatus) -> Self {
        Self {
            status,
            archived: false,
        }
    }

    pub fn archived(status: TaskStatus) -> Self {
        Self {
            status,
            archived: true,
        }
    }
}

/// Partial update of a task row; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub is_archived: Option<bool>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// The single write that unarchives into `status`
    pub fn unarchive(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            is_archived: Some(false),
            ..Default::default()
        }
    }
}

/// A subtask, owned by its parent task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: TaskId,
    pub title: String,
    #[serde(default)]
    pub is_done: bool,
    pub created_at: DateTime<Utc>,
}

impl Subtask {
    pub fn new(task_id: TaskId, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            title: title.into(),
            is_done: false,
            created_at: Utc::now(),
        }
    }
}

/// A progress update posted on a task, owned by the task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub id: Uuid,
    pub task_id: TaskId,
    pub body: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TaskUpdate {
    pub fn new(task_id: TaskId, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            body: body.into(),
            author: None,
            created_at: Utc::now(),
        }
    }
}

/// Scheduling data of a Gantt task (1:1 with the task)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GanttTaskData {
    pub task_id: TaskId,
    /// Stored only when `dependencies` is empty; derived otherwise
    pub start_date: Option<NaiveDate>,
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
}

/// Scheduling input for a new or edited Gantt task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GanttSpec {
    pub start_date: Option<NaiveDate>,
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
}

/// Request to create a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub project_id: ProjectId,
    pub title: String,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Present for Gantt tasks
    #[serde(default)]
    pub gantt: Option<GanttSpec>,
}

impl CreateTaskRequest {
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            status: None,
            priority: None,
            due_date: None,
            gantt: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_gantt(mut self, gantt: GanttSpec) -> Self {
        self.gantt = Some(gantt);
        self
    }
}
