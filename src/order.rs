use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::warn;

use crate::error::AppError;
use crate::model::Task;

pub const TASK_ORDER_FILE: &str = "task_order.json";

/// Locally persisted display order of today's task ids. A cache, not a
/// source of truth: an unreadable log reads as empty.
pub trait OrderLog: Send + Sync {
    fn load(&self) -> Vec<String>;
    fn save(&self, ids: &[String]) -> Result<(), AppError>;
}

pub struct FileOrderLog {
    path: PathBuf,
}

impl FileOrderLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl OrderLog for FileOrderLog {
    fn load(&self) -> Vec<String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "task order unreadable");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(ids) => ids,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "task order garbled, using default sort");
                Vec::new()
            }
        }
    }

    fn save(&self, ids: &[String]) -> Result<(), AppError> {
        crate::db::ensure_parent_dir(&self.path)?;
        fs::write(&self.path, serde_json::to_string(ids)?)?;
        Ok(())
    }
}

/// Placement for ids the order log has never seen: open before done,
/// routines before other work, then by text.
pub fn new_task_cmp(a: &Task, b: &Task) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| b.is_recurring().cmp(&a.is_recurring()))
        .then_with(|| a.text.cmp(&b.text))
}

/// Lays `tasks` out in saved order. Saved ids with no task are dropped and
/// unseen tasks are appended in `new_task_cmp` order.
pub fn apply_order(tasks: Vec<Task>, saved: &[String]) -> Vec<Task> {
    let index: HashMap<String, usize> = tasks
        .iter()
        .enumerate()
        .map(|(idx, task)| (task.id.clone(), idx))
        .collect();
    let mut slots: Vec<Option<Task>> = tasks.into_iter().map(Some).collect();

    let mut ordered = Vec::with_capacity(slots.len());
    for id in saved {
        if let Some(task) = index.get(id).and_then(|idx| slots[*idx].take()) {
            ordered.push(task);
        }
    }

    let mut unseen: Vec<Task> = slots.into_iter().flatten().collect();
    unseen.sort_by(new_task_cmp);
    ordered.extend(unseen);
    ordered
}

pub fn order_ids(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|task| task.id.clone()).collect()
}
