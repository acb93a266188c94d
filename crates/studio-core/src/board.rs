//! Kanban board: immutable snapshots, a pure reducer and a JSON persistence
//! boundary.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomField {
    pub id: String,
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Title of the column the task was last placed in.
    pub status: String,
    pub due_date: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    pub created_at: String,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: String::new(),
            due_date: None,
            subtasks: Vec::new(),
            custom_fields: Vec::new(),
            created_at: created_at.to_rfc3339(),
        }
    }

    /// Fraction of completed subtasks, `None` without subtasks.
    pub fn progress(&self) -> Option<(usize, usize)> {
        if self.subtasks.is_empty() {
            return None;
        }
        let done = self.subtasks.iter().filter(|s| s.completed).count();
        Some((done, self.subtasks.len()))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowTriggerType {
    TaskAdded,
    TaskMovedHere,
    TaskMovedAway,
    Manual,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTrigger {
    #[serde(rename = "type")]
    pub kind: WorkflowTriggerType,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowActionType {
    MoveTask,
    SendNotification,
    UpdateField,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowAction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: WorkflowActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_column_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_value: Option<String>,
}

/// Column automation. Stored and round-tripped; not executed.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub trigger: WorkflowTrigger,
    #[serde(default)]
    pub actions: Vec<WorkflowAction>,
    pub enabled: bool,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workflows: Vec<Workflow>,
}

impl Column {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            tasks: Vec::new(),
            color: None,
            workflows: Vec::new(),
        }
    }
}

/// Position of a task: column id plus index within the column.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub column_id: String,
    pub index: usize,
}

impl Location {
    pub fn new(column_id: impl Into<String>, index: usize) -> Self {
        Self {
            column_id: column_id.into(),
            index,
        }
    }
}

/// Partial task update; `None` fields are left as they are.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<String>>,
    pub subtasks: Option<Vec<Subtask>>,
    pub custom_fields: Option<Vec<CustomField>>,
}

/// Partial column update; `None` fields are left as they are.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPatch {
    pub title: Option<String>,
    /// `Some(None)` clears the color.
    pub color: Option<Option<String>>,
    pub workflows: Option<Vec<Workflow>>,
}

/// A single board update.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BoardAction {
    /// Drag-and-drop result. No destination means the drop was cancelled.
    MoveTask {
        task_id: String,
        source: Location,
        destination: Option<Location>,
    },
    AddTask {
        column_id: String,
        task: Task,
    },
    UpdateTask {
        task_id: String,
        patch: TaskPatch,
    },
    DeleteTask {
        task_id: String,
    },
    /// Appends a copy of the task to its own column.
    DuplicateTask {
        task_id: String,
        new_id: String,
        created_at: String,
    },
    AddColumn {
        id: String,
        title: String,
    },
    DeleteColumn {
        column_id: String,
    },
    UpdateColumn {
        column_id: String,
        patch: ColumnPatch,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("task {task_id} is not at {column_id}[{index}]")]
    StaleSource {
        task_id: String,
        column_id: String,
        index: usize,
    },
    #[error("column title must not be empty")]
    EmptyColumnTitle,
    #[error("duplicate id: {0}")]
    DuplicateId(String),
}

/// Immutable board snapshot.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub columns: Vec<Column>,
}

impl Board {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    /// Finds a task and the index of the column holding it.
    pub fn find_task(&self, task_id: &str) -> Option<(usize, &Task)> {
        self.columns.iter().enumerate().find_map(|(idx, col)| {
            col.tasks.iter().find(|t| t.id == task_id).map(|t| (idx, t))
        })
    }

    /// Current location of a task.
    pub fn locate(&self, task_id: &str) -> Option<Location> {
        self.columns.iter().find_map(|col| {
            col.tasks
                .iter()
                .position(|t| t.id == task_id)
                .map(|index| Location::new(col.id.clone(), index))
        })
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    /// Applies `action` and returns the next snapshot. `self` is unchanged.
    pub fn apply(&self, action: BoardAction) -> Result<Board, BoardError> {
        let mut next = self.clone();
        match action {
            BoardAction::MoveTask {
                task_id,
                source,
                destination,
            } => {
                let Some(destination) = destination else {
                    return Ok(next);
                };
                if source == destination {
                    return Ok(next);
                }
                next.move_task(&task_id, &source, &destination)?;
            }
            BoardAction::AddTask { column_id, task } => {
                if self.find_task(&task.id).is_some() {
                    return Err(BoardError::DuplicateId(task.id));
                }
                let column = next.column_mut(&column_id)?;
                column.tasks.push(task);
            }
            BoardAction::UpdateTask { task_id, patch } => {
                let task = next
                    .columns
                    .iter_mut()
                    .flat_map(|c| c.tasks.iter_mut())
                    .find(|t| t.id == task_id)
                    .ok_or(BoardError::TaskNotFound(task_id))?;
                apply_task_patch(task, patch);
            }
            BoardAction::DeleteTask { task_id } => {
                for column in &mut next.columns {
                    column.tasks.retain(|t| t.id != task_id);
                }
            }
            BoardAction::DuplicateTask {
                task_id,
                new_id,
                created_at,
            } => {
                if self.find_task(&new_id).is_some() {
                    return Err(BoardError::DuplicateId(new_id));
                }
                let (column_idx, task) = self
                    .find_task(&task_id)
                    .ok_or(BoardError::TaskNotFound(task_id))?;
                let copy = Task {
                    id: new_id,
                    created_at,
                    ..task.clone()
                };
                next.columns[column_idx].tasks.push(copy);
            }
            BoardAction::AddColumn { id, title } => {
                let title = title.trim();
                if title.is_empty() {
                    return Err(BoardError::EmptyColumnTitle);
                }
                if self.column(&id).is_some() {
                    return Err(BoardError::DuplicateId(id));
                }
                next.columns.push(Column::new(id, title));
            }
            BoardAction::DeleteColumn { column_id } => {
                next.columns.retain(|c| c.id != column_id);
            }
            BoardAction::UpdateColumn { column_id, patch } => {
                let column = next.column_mut(&column_id)?;
                if let Some(title) = patch.title {
                    column.title = title;
                }
                if let Some(color) = patch.color {
                    column.color = color;
                }
                if let Some(workflows) = patch.workflows {
                    column.workflows = workflows;
                }
            }
        }
        Ok(next)
    }

    fn column_mut(&mut self, column_id: &str) -> Result<&mut Column, BoardError> {
        self.columns
            .iter_mut()
            .find(|c| c.id == column_id)
            .ok_or_else(|| BoardError::ColumnNotFound(column_id.to_string()))
    }

    // Removes at the source index, inserts at the destination index (clamped)
    // and stamps the destination column title as the task status.
    fn move_task(
        &mut self,
        task_id: &str,
        source: &Location,
        destination: &Location,
    ) -> Result<(), BoardError> {
        if self.find_task(task_id).is_none() {
            debug!(task_id, "move ignored: task not on board");
            return Ok(());
        }
        if self.column(&destination.column_id).is_none() {
            return Err(BoardError::ColumnNotFound(destination.column_id.clone()));
        }

        let from = self.column_mut(&source.column_id)?;
        if from.tasks.get(source.index).map(|t| t.id.as_str()) != Some(task_id) {
            return Err(BoardError::StaleSource {
                task_id: task_id.to_string(),
                column_id: source.column_id.clone(),
                index: source.index,
            });
        }
        let mut task = from.tasks.remove(source.index);

        let to = self.column_mut(&destination.column_id)?;
        task.status = to.title.clone();
        let index = destination.index.min(to.tasks.len());
        to.tasks.insert(index, task);
        Ok(())
    }

    /// Default board shown on first launch.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let day = Duration::days(1);
        let ts = |at: DateTime<Utc>| at.to_rfc3339();
        let sub = |id: &str, title: &str, completed: bool| Subtask {
            id: id.into(),
            title: title.into(),
            completed,
        };
        let field = |id: &str, name: &str, value: &str| CustomField {
            id: id.into(),
            name: name.into(),
            value: value.into(),
        };
        let task = |id: &str, title: &str, description: &str, status: &str, due: DateTime<Utc>, age_days: i64| Task {
            id: id.into(),
            title: title.into(),
            description: Some(description.into()),
            status: status.into(),
            due_date: Some(ts(due)),
            subtasks: Vec::new(),
            custom_fields: Vec::new(),
            created_at: ts(now - day * age_days as i32),
        };

        let todo = Column {
            tasks: vec![
                Task {
                    subtasks: vec![
                        sub("st-1", "Read specification document", true),
                        sub("st-2", "Create summary notes", false),
                        sub("st-3", "Schedule team review", false),
                    ],
                    custom_fields: vec![
                        field("cf-1", "Priority", "High"),
                        field("cf-2", "Assigned", "John Smith"),
                    ],
                    ..task(
                        "task-1",
                        "Review production pipeline specs",
                        "Review the latest production pipeline requirements and document changes",
                        "To Do",
                        now + day,
                        2,
                    )
                },
                Task {
                    subtasks: vec![
                        sub("st-4", "Design schema changes", false),
                        sub("st-5", "Write migration script", false),
                    ],
                    custom_fields: vec![
                        field("cf-3", "Priority", "Medium"),
                        field("cf-4", "Assigned", "Sarah Johnson"),
                    ],
                    ..task(
                        "task-2",
                        "Update database schema",
                        "Add new columns for content versioning",
                        "To Do",
                        now + day * 7,
                        3,
                    )
                },
            ],
            ..Column::new("col-1", "To Do")
        };

        let in_progress = Column {
            tasks: vec![Task {
                subtasks: vec![
                    sub("st-6", "Define validation rules", true),
                    sub("st-7", "Implement validator module", true),
                    sub("st-8", "Add unit tests", false),
                ],
                custom_fields: vec![
                    field("cf-5", "Priority", "High"),
                    field("cf-6", "Progress", "70%"),
                ],
                ..task(
                    "task-3",
                    "Implement content validation",
                    "Build validation rules for uploaded content",
                    "In Progress",
                    now,
                    1,
                )
            }],
            color: Some("bg-blue-50 dark:bg-blue-900/30".into()),
            ..Column::new("col-2", "In Progress")
        };

        let completed = Column {
            tasks: vec![
                Task {
                    subtasks: vec![
                        sub("st-9", "Configure GitHub Actions", true),
                        sub("st-10", "Set up test environment", true),
                        sub("st-11", "Deploy to staging", true),
                    ],
                    custom_fields: vec![
                        field("cf-7", "Priority", "High"),
                        field("cf-8", "CompletedBy", "Mike Chen"),
                    ],
                    ..task(
                        "task-4",
                        "Set up CI/CD pipeline",
                        "Configure automated testing and deployment",
                        "Completed",
                        now - day,
                        5,
                    )
                },
                Task {
                    subtasks: vec![
                        sub("st-12", "List all endpoints", true),
                        sub("st-13", "Write endpoint docs", true),
                        sub("st-14", "Create usage examples", true),
                    ],
                    custom_fields: vec![
                        field("cf-9", "Priority", "Medium"),
                        field("cf-10", "CompletedBy", "Emma Wilson"),
                    ],
                    ..task(
                        "task-5",
                        "Create API documentation",
                        "Document all REST endpoints with examples",
                        "Completed",
                        now - day,
                        7,
                    )
                },
            ],
            color: Some("bg-green-50 dark:bg-green-900/30".into()),
            ..Column::new("col-3", "Completed")
        };

        Self::new(vec![todo, in_progress, completed])
    }
}

fn apply_task_patch(task: &mut Task, patch: TaskPatch) {
    if let Some(title) = patch.title {
        task.title = title;
    }
    if let Some(description) = patch.description {
        task.description = Some(description);
    }
    if let Some(status) = patch.status {
        task.status = status;
    }
    if let Some(due_date) = patch.due_date {
        task.due_date = due_date;
    }
    if let Some(subtasks) = patch.subtasks {
        task.subtasks = subtasks;
    }
    if let Some(custom_fields) = patch.custom_fields {
        task.custom_fields = custom_fields;
    }
}

/// Fresh task id in the board's `task-…` form.
pub fn new_task_id() -> String {
    format!("task-{}", uuid::Uuid::new_v4())
}

/// Fresh column id in the board's `col-…` form.
pub fn new_column_id() -> String {
    format!("col-{}", uuid::Uuid::new_v4())
}

/// Errors from the persistence boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("board snapshot is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("board store lock poisoned")]
    Poisoned,
}

/// Load/save boundary for board snapshots.
pub trait BoardStore: Send + Sync {
    /// Returns the saved snapshot, or `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<Board>, StoreError>;
    fn save(&self, board: &Board) -> Result<(), StoreError>;
}

/// Loads the saved board or falls back to [`Board::seeded`].
pub fn load_or_seed(store: &dyn BoardStore, now: DateTime<Utc>) -> Result<Board, StoreError> {
    Ok(store.load()?.unwrap_or_else(|| Board::seeded(now)))
}

/// Stores the board as one JSON blob `{ "columns": [...] }`.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl BoardStore for JsonFileStore {
    fn load(&self) -> Result<Option<Board>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        let board: Board = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), columns = board.columns.len(), "board loaded");
        Ok(Some(board))
    }

    fn save(&self, board: &Board) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let raw = serde_json::to_string_pretty(board)?;
        std::fs::write(&self.path, raw).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), tasks = board.task_count(), "board saved");
        Ok(())
    }
}

/// In-memory store holding the serialized blob.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoardStore for MemoryStore {
    fn load(&self) -> Result<Option<Board>, StoreError> {
        let blob = self.blob.lock().map_err(|_| StoreError::Poisoned)?;
        match blob.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, board: &Board) -> Result<(), StoreError> {
        let raw = serde_json::to_string(board)?;
        *self.blob.lock().map_err(|_| StoreError::Poisoned)? = Some(raw);
        Ok(())
    }
}
