use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use studio_core::board::{
    Board, BoardAction, BoardStore, ColumnPatch, JsonFileStore, Location, Subtask, Task,
    TaskPatch, load_or_seed, new_column_id, new_task_id,
};
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum BoardCommand {
    /// Print the board.
    Show {
        /// Print the stored JSON instead.
        #[arg(long)]
        json: bool,
    },
    /// Move a task to another column or position.
    Move {
        task_id: String,
        column_id: String,
        /// Position in the target column; defaults to the end.
        #[arg(long)]
        index: Option<usize>,
    },
    /// Add a task to a column.
    AddTask {
        column_id: String,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// RFC 3339 timestamp or YYYY-MM-DD.
        #[arg(long)]
        due: Option<String>,
    },
    /// Change task fields.
    UpdateTask {
        task_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
    },
    /// Add a subtask to a task.
    AddSubtask { task_id: String, title: String },
    /// Flip a subtask between done and open.
    ToggleSubtask { task_id: String, subtask_id: String },
    DeleteTask { task_id: String },
    /// Copy a task to the end of its column.
    DuplicateTask { task_id: String },
    AddColumn { title: String },
    /// Rename or recolor a column.
    UpdateColumn {
        column_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_color")]
        color: Option<String>,
        #[arg(long)]
        clear_color: bool,
    },
    /// Delete a column and its tasks.
    DeleteColumn { column_id: String },
    /// Replace the board with the starter board.
    Reset,
}

pub fn run(path: &Path, command: BoardCommand) -> anyhow::Result<()> {
    let store = JsonFileStore::new(path);
    let now = Utc::now();
    let board = load_or_seed(&store, now)
        .with_context(|| format!("failed to load board from {}", path.display()))?;

    let next = match command {
        BoardCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&board)?);
            } else {
                print!("{}", render_board(&board));
            }
            return Ok(());
        }
        BoardCommand::Reset => Board::seeded(now),
        command => {
            let action = to_action(&board, command, now)?;
            board.apply(action)?
        }
    };

    store
        .save(&next)
        .with_context(|| format!("failed to save board to {}", path.display()))?;
    info!(path = %path.display(), tasks = next.task_count(), "board saved");
    print!("{}", render_board(&next));
    Ok(())
}

fn to_action(board: &Board, command: BoardCommand, now: DateTime<Utc>) -> anyhow::Result<BoardAction> {
    let action = match command {
        BoardCommand::Move {
            task_id,
            column_id,
            index,
        } => {
            let source = board
                .locate(&task_id)
                .ok_or_else(|| anyhow!("task not found: {task_id}"))?;
            BoardAction::MoveTask {
                task_id,
                source,
                destination: Some(Location::new(column_id, index.unwrap_or(usize::MAX))),
            }
        }
        BoardCommand::AddTask {
            column_id,
            title,
            description,
            due,
        } => {
            let column = board
                .column(&column_id)
                .ok_or_else(|| anyhow!("column not found: {column_id}"))?;
            let mut task = Task::new(new_task_id(), title, now);
            task.status = column.title.clone();
            task.description = description;
            task.due_date = due.as_deref().map(parse_due).transpose()?;
            BoardAction::AddTask { column_id, task }
        }
        BoardCommand::UpdateTask {
            task_id,
            title,
            description,
            due,
            clear_due,
        } => {
            let due_date = match (due, clear_due) {
                (_, true) => Some(None),
                (Some(due), false) => Some(Some(parse_due(&due)?)),
                (None, false) => None,
            };
            BoardAction::UpdateTask {
                task_id,
                patch: TaskPatch {
                    title,
                    description,
                    due_date,
                    ..TaskPatch::default()
                },
            }
        }
        BoardCommand::AddSubtask { task_id, title } => {
            let mut subtasks = subtasks_of(board, &task_id)?;
            subtasks.push(Subtask {
                id: format!("subtask-{}", uuid_suffix(&new_task_id())),
                title,
                completed: false,
            });
            subtask_patch(task_id, subtasks)
        }
        BoardCommand::ToggleSubtask {
            task_id,
            subtask_id,
        } => {
            let mut subtasks = subtasks_of(board, &task_id)?;
            let subtask = subtasks
                .iter_mut()
                .find(|s| s.id == subtask_id)
                .ok_or_else(|| anyhow!("subtask not found: {subtask_id}"))?;
            subtask.completed = !subtask.completed;
            subtask_patch(task_id, subtasks)
        }
        BoardCommand::DeleteTask { task_id } => BoardAction::DeleteTask { task_id },
        BoardCommand::DuplicateTask { task_id } => BoardAction::DuplicateTask {
            task_id,
            new_id: new_task_id(),
            created_at: now.to_rfc3339(),
        },
        BoardCommand::AddColumn { title } => BoardAction::AddColumn {
            id: new_column_id(),
            title,
        },
        BoardCommand::UpdateColumn {
            column_id,
            title,
            color,
            clear_color,
        } => BoardAction::UpdateColumn {
            column_id,
            patch: ColumnPatch {
                title,
                color: if clear_color { Some(None) } else { color.map(Some) },
                ..ColumnPatch::default()
            },
        },
        BoardCommand::DeleteColumn { column_id } => BoardAction::DeleteColumn { column_id },
        BoardCommand::Show { .. } | BoardCommand::Reset => {
            return Err(anyhow!("command does not change the board"));
        }
    };
    Ok(action)
}

fn subtasks_of(board: &Board, task_id: &str) -> anyhow::Result<Vec<Subtask>> {
    board
        .find_task(task_id)
        .map(|(_, task)| task.subtasks.clone())
        .ok_or_else(|| anyhow!("task not found: {task_id}"))
}

fn subtask_patch(task_id: String, subtasks: Vec<Subtask>) -> BoardAction {
    BoardAction::UpdateTask {
        task_id,
        patch: TaskPatch {
            subtasks: Some(subtasks),
            ..TaskPatch::default()
        },
    }
}

fn uuid_suffix(id: &str) -> &str {
    id.strip_prefix("task-").unwrap_or(id)
}

// Accepts a full timestamp or a bare date (midnight UTC).
fn parse_due(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc).to_rfc3339());
    }
    let date = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid due date: {raw:?}"))?;
    let at = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("invalid due date: {raw:?}"))?
        .and_utc();
    Ok(at.to_rfc3339())
}

fn render_board(board: &Board) -> String {
    let mut out = String::new();
    for column in &board.columns {
        let _ = writeln!(out, "{} [{}] ({})", column.title, column.id, column.tasks.len());
        for task in &column.tasks {
            let _ = write!(out, "  - {} [{}]", task.title, task.id);
            if let Some(due) = task.due_date.as_deref() {
                let shown = DateTime::parse_from_rfc3339(due)
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|_| due.to_string());
                let _ = write!(out, " due {shown}");
            }
            if let Some((done, total)) = task.progress() {
                let _ = write!(out, " {done}/{total}");
            }
            let _ = writeln!(out);
        }
    }
    out
}
