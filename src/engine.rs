use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dates::{day_index, iso_date_string, week_id};
use crate::error::AppError;
use crate::model::{
    task_id_for, to_document, DailyMetrics, MomentKind, StepStatus, Task, TaskType, WeeklyStep,
    DAILY_METRICS, JOURNAL_ENTRIES, MOMENTS_LOG, WEEKLY_STEPS,
};
use crate::order::{apply_order, order_ids, OrderLog};
use crate::routines::routines_for_day;
use crate::store::{Document, DocumentStore, Filter, Patch, Snapshot, WriteOp};

const STORED_TASK_TYPES: [&str; 2] = ["planned", "ad-hoc"];

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loaded,
    Failed(String),
}

#[derive(Default)]
struct DayState {
    tasks: Vec<Task>,
    in_flight: HashSet<String>,
    metrics: DailyMetrics,
    load: LoadState,
}

/// Today's worklist: merges stored steps, rolled-over steps and routines, and
/// keeps the local view in step with the store through optimistic updates.
pub struct DailyEngine {
    store: Arc<dyn DocumentStore>,
    order_log: Arc<dyn OrderLog>,
    today: NaiveDate,
    state: Mutex<DayState>,
}

impl DailyEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        order_log: Arc<dyn OrderLog>,
        today: NaiveDate,
    ) -> Self {
        Self {
            store,
            order_log,
            today,
            state: Mutex::new(DayState::default()),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }

    pub async fn load_state(&self) -> LoadState {
        self.state.lock().await.load.clone()
    }

    pub async fn metrics(&self) -> DailyMetrics {
        self.state.lock().await.metrics.clone()
    }

    /// Rebuilds the list from the store. Any read or rollover failure leaves
    /// an empty list in the `Failed` state rather than a partial one.
    pub async fn build(&self) -> Result<Vec<Task>, AppError> {
        info!(today = %self.today, "building daily task list");
        match self.collect().await {
            Ok((tasks, metrics)) => {
                let ordered = apply_order(tasks, &self.order_log.load());
                let mut state = self.state.lock().await;
                state.tasks = ordered.clone();
                state.metrics = metrics;
                state.load = LoadState::Loaded;
                self.persist_order(&state.tasks);
                info!(count = ordered.len(), "daily task list ready");
                Ok(ordered)
            }
            Err(err) => {
                warn!(error = %err, "daily task list failed to load");
                let mut state = self.state.lock().await;
                state.tasks.clear();
                state.load = LoadState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    async fn collect(&self) -> Result<(Vec<Task>, DailyMetrics), AppError> {
        let today = iso_date_string(self.today);
        let metrics = match self.store.get(DAILY_METRICS, &today).await? {
            Some(doc) => DailyMetrics::from_document(&today, doc).unwrap_or_else(|err| {
                warn!(error = %err, "ignoring malformed daily metrics");
                DailyMetrics::default()
            }),
            None => DailyMetrics::default(),
        };

        let mut tasks = Vec::new();
        let mut seen = HashSet::new();

        let assigned = self
            .store
            .query(
                WEEKLY_STEPS,
                &[
                    Filter::is_in("taskType", &STORED_TASK_TYPES),
                    Filter::eq("currentAssignedDate", today.as_str()),
                ],
                None,
            )
            .await?;
        for step in decode_steps(assigned) {
            let status = metrics.tasks_status.get(&task_id_for(&step.id));
            let task = Task::from_step(&step, status);
            if seen.insert(task.id.clone()) {
                tasks.push(task);
            }
        }

        for step in self.sweep_rollovers().await? {
            let task = Task::from_step(&step, None);
            if seen.insert(task.id.clone()) {
                tasks.push(task);
            }
        }

        for routine in routines_for_day(day_index(self.today)) {
            if seen.contains(routine.id) {
                continue;
            }
            let status = metrics.tasks_status.get(routine.id);
            tasks.push(Task::from_routine(routine, self.today, status));
            seen.insert(routine.id.to_string());
        }

        Ok((tasks, metrics))
    }

    /// Moves every pending step assigned before today onto today, bumping its
    /// rollover count, in one batch. A second sweep on the same day finds
    /// nothing because the moved steps no longer match the date filter.
    pub async fn sweep_rollovers(&self) -> Result<Vec<WeeklyStep>, AppError> {
        let today = iso_date_string(self.today);
        let overdue = self
            .store
            .query(
                WEEKLY_STEPS,
                &[
                    Filter::eq("status", StepStatus::Pending.as_str()),
                    Filter::is_in("taskType", &STORED_TASK_TYPES),
                    Filter::lt("currentAssignedDate", today.as_str()),
                ],
                None,
            )
            .await?;
        let steps = decode_steps(overdue);
        if steps.is_empty() {
            return Ok(steps);
        }

        let ops = steps
            .iter()
            .map(|step| {
                WriteOp::update(
                    WEEKLY_STEPS,
                    &step.id,
                    Patch::new()
                        .set("currentAssignedDate", today.as_str())
                        .increment("rolloverCount", 1),
                )
            })
            .collect();
        self.store.batch_write(ops).await?;
        info!(count = steps.len(), "rolled over overdue tasks");

        Ok(steps
            .into_iter()
            .map(|mut step| {
                step.current_assigned_date = self.today;
                step.rollover_count += 1;
                step
            })
            .collect())
    }

    /// Flips completion. Done tasks sink to the end, reopened ones rise to the
    /// front. A failed write restores the previous state and position.
    pub async fn toggle_completion(&self, task_id: &str) -> Result<Task, AppError> {
        let (updated, previous, previous_index, score, ops) = {
            let mut state = self.state.lock().await;
            if state.in_flight.contains(task_id) {
                return Err(AppError::InFlight(task_id.to_string()));
            }
            let index = position(&state.tasks, task_id)?;
            let previous = state.tasks[index].clone();
            let mut updated = previous.clone();
            updated.set_completed(!previous.completed, Utc::now());

            let mut tasks = state.tasks.clone();
            tasks.remove(index);
            if updated.completed {
                tasks.push(updated.clone());
            } else {
                tasks.insert(0, updated.clone());
            }
            let score = productivity_score(&tasks, self.today);
            let ops = self.toggle_writes(&updated, score)?;

            state.tasks = tasks;
            state.in_flight.insert(task_id.to_string());
            self.persist_order(&state.tasks);
            (updated, previous, index, score, ops)
        };

        let result = self.store.batch_write(ops).await;

        let outcome = {
            let mut state = self.state.lock().await;
            state.in_flight.remove(task_id);
            match result {
                Ok(()) => {
                    state.metrics.productivity_score = score;
                    state
                        .metrics
                        .tasks_status
                        .insert(task_id.to_string(), updated.status_entry());
                    debug!(task_id, completed = updated.completed, "toggle saved");
                    Ok(updated)
                }
                Err(err) => {
                    warn!(task_id, error = %err, "toggle failed, restoring previous state");
                    if let Some(index) = state.tasks.iter().position(|task| task.id == task_id) {
                        let mut task = state.tasks.remove(index);
                        task.completed = previous.completed;
                        task.completed_at = previous.completed_at;
                        let restore_at = previous_index.min(state.tasks.len());
                        state.tasks.insert(restore_at, task);
                        self.persist_order(&state.tasks);
                    }
                    Err(err)
                }
            }
        };
        self.reconcile_score().await;
        outcome
    }

    /// Rewrites the stored score when it no longer matches the local list.
    /// A toggle sends the score of its optimistic list, so a concurrent
    /// toggle's rollback can leave a count that includes a reverted task.
    async fn reconcile_score(&self) {
        let mut state = self.state.lock().await;
        let score = productivity_score(&state.tasks, self.today);
        let sent = state.metrics.productivity_score;
        if score == sent {
            return;
        }

        let record = json!({
            "productivityScore": score,
            "lastUpdated": Utc::now(),
        });
        let Value::Object(record) = record else {
            return;
        };
        let today = iso_date_string(self.today);
        match self.store.set(DAILY_METRICS, &today, record, true).await {
            Ok(()) => {
                state.metrics.productivity_score = score;
                debug!(from = sent, to = score, "productivity score corrected");
            }
            Err(err) => warn!(score, error = %err, "productivity score correction not saved"),
        }
    }

    fn toggle_writes(&self, task: &Task, score: u32) -> Result<Vec<WriteOp>, AppError> {
        let today = iso_date_string(self.today);
        let now = Utc::now();

        let mut status = Document::new();
        status.insert(task.id.clone(), serde_json::to_value(task.status_entry())?);
        let mut metrics = Document::new();
        metrics.insert("tasksStatus".to_string(), Value::Object(status));
        metrics.insert("productivityScore".to_string(), Value::from(score));
        metrics.insert("lastUpdated".to_string(), serde_json::to_value(now)?);

        let mut ops = vec![WriteOp::set(DAILY_METRICS, &today, metrics, true)];
        if let (false, Some(original_id)) = (task.is_recurring(), task.original_id.as_deref()) {
            let status = if task.completed {
                StepStatus::Completed
            } else {
                StepStatus::Pending
            };
            ops.push(WriteOp::update(
                WEEKLY_STEPS,
                original_id,
                Patch::new()
                    .set("status", status.as_str())
                    .set("completedAt", serde_json::to_value(task.completed_at)?),
            ));
        }
        Ok(ops)
    }

    /// Creates a same-day task and puts it at the top of the list.
    pub async fn add_ad_hoc_task(&self, text: &str, axis_theme: &str) -> Result<Task, AppError> {
        let text = text.trim();
        let axis_theme = axis_theme.trim();
        if text.is_empty() {
            return Err(AppError::Validation("task text cannot be empty".to_string()));
        }
        if axis_theme.is_empty() {
            return Err(AppError::Validation("axis theme cannot be empty".to_string()));
        }

        let id = self.store.generate_id(WEEKLY_STEPS);
        let step = WeeklyStep {
            id: id.clone(),
            planned_steps: text.to_string(),
            axis_theme: axis_theme.to_string(),
            week_id: week_id(self.today),
            assigned_days: Vec::new(),
            task_type: TaskType::AdHoc,
            status: StepStatus::Pending,
            current_assigned_date: self.today,
            rollover_count: 0,
            created_at: Some(Utc::now()),
            completed_at: None,
        };
        self.store
            .set(WEEKLY_STEPS, &id, to_document(&step)?, false)
            .await?;

        let task = Task::from_step(&step, None);
        let mut state = self.state.lock().await;
        state.tasks.retain(|existing| existing.id != task.id);
        state.tasks.insert(0, task.clone());
        self.persist_order(&state.tasks);
        info!(task_id = %task.id, "added ad-hoc task");
        Ok(task)
    }

    /// Moves a stored task to another date without counting it as a rollover.
    pub async fn reassign_date(&self, task_id: &str, new_date: NaiveDate) -> Result<(), AppError> {
        let original_id = {
            let mut state = self.state.lock().await;
            let index = position(&state.tasks, task_id)?;
            let task = &state.tasks[index];
            if task.is_recurring() {
                return Err(AppError::InvalidOperation(format!(
                    "{task_id} is a recurring routine and cannot be moved to another date"
                )));
            }
            let original_id = task.original_id.clone().ok_or_else(|| {
                AppError::InvalidOperation(format!("{task_id} has no stored record"))
            })?;
            if !state.in_flight.insert(task_id.to_string()) {
                return Err(AppError::InFlight(task_id.to_string()));
            }
            original_id
        };

        let result = self
            .store
            .update(
                WEEKLY_STEPS,
                &original_id,
                Patch::new().set("currentAssignedDate", iso_date_string(new_date)),
            )
            .await;

        let mut state = self.state.lock().await;
        state.in_flight.remove(task_id);
        result?;
        if let Some(task) = state.tasks.iter_mut().find(|task| task.id == task_id) {
            task.current_assigned_date = new_date;
        }
        info!(task_id, date = %new_date, "reassigned task");
        Ok(())
    }

    /// Marks the task being worked on now by moving it to the top.
    pub async fn promote_to_front(&self, task_id: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let index = position(&state.tasks, task_id)?;
        if index > 0 {
            let task = state.tasks.remove(index);
            state.tasks.insert(0, task);
            self.persist_order(&state.tasks);
        }
        Ok(())
    }

    /// Drops `dragged_id` into `target_id`'s slot. Returns false, changing
    /// nothing, when the ids match or either one is missing.
    pub async fn reorder(&self, dragged_id: &str, target_id: &str) -> bool {
        if dragged_id == target_id {
            return false;
        }
        let mut state = self.state.lock().await;
        let dragged = state.tasks.iter().position(|task| task.id == dragged_id);
        let target = state.tasks.iter().position(|task| task.id == target_id);
        let (Some(dragged), Some(target)) = (dragged, target) else {
            return false;
        };
        let task = state.tasks.remove(dragged);
        state.tasks.insert(target, task);
        self.persist_order(&state.tasks);
        true
    }

    /// Bumps today's epiphany or despair counter; a non-empty detail is logged
    /// alongside in the same batch. The count is written as an absolute value,
    /// so it needs the stored counters from a successful build.
    pub async fn record_moment(
        &self,
        kind: MomentKind,
        detail: Option<&str>,
    ) -> Result<u32, AppError> {
        let today = iso_date_string(self.today);
        let next = {
            let mut state = self.state.lock().await;
            if state.load != LoadState::Loaded {
                return Err(AppError::InvalidOperation(format!(
                    "cannot record {} before today's metrics are loaded",
                    kind.as_str()
                )));
            }
            let next = state.metrics.moment_count(kind) + 1;
            state.metrics.set_moment_count(kind, next);
            next
        };

        let mut record = Document::new();
        record.insert(kind.counter_field().to_string(), Value::from(next));
        record.insert("lastUpdated".to_string(), serde_json::to_value(Utc::now())?);
        let mut ops = vec![WriteOp::set(DAILY_METRICS, &today, record, true)];
        if let Some(text) = detail.map(str::trim).filter(|text| !text.is_empty()) {
            let entry = json!({
                "type": kind.as_str(),
                "text": text,
                "date": today,
                "timestamp": Utc::now(),
            });
            if let Value::Object(entry) = entry {
                let id = self.store.generate_id(MOMENTS_LOG);
                ops.push(WriteOp::set(MOMENTS_LOG, &id, entry, false));
            }
        }

        if let Err(err) = self.store.batch_write(ops).await {
            warn!(kind = kind.as_str(), error = %err, "moment not saved");
            let mut state = self.state.lock().await;
            if state.metrics.moment_count(kind) == next {
                state.metrics.set_moment_count(kind, next - 1);
            }
            return Err(err);
        }
        Ok(next)
    }

    /// Saves a free-text journal entry for today and returns its id.
    pub async fn add_journal_entry(&self, text: &str) -> Result<String, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("journal entry cannot be empty".to_string()));
        }

        let entry = json!({
            "entryText": text,
            "createdAt": Utc::now(),
            "dateString": iso_date_string(self.today),
            "dayOfWeek": day_index(self.today),
            "timeOfDay": Local::now().format("%H:%M").to_string(),
        });
        let Value::Object(entry) = entry else {
            return Err(AppError::Validation("journal entry must be an object".to_string()));
        };
        let id = self.store.generate_id(JOURNAL_ENTRIES);
        self.store.set(JOURNAL_ENTRIES, &id, entry, false).await?;
        info!(entry_id = %id, "journal entry saved");
        Ok(id)
    }

    fn persist_order(&self, tasks: &[Task]) {
        if let Err(err) = self.order_log.save(&order_ids(tasks)) {
            warn!(error = %err, "task order not saved");
        }
    }
}

fn position(tasks: &[Task], task_id: &str) -> Result<usize, AppError> {
    tasks
        .iter()
        .position(|task| task.id == task_id)
        .ok_or_else(|| AppError::NotFound(format!("task {task_id} is not on today's list")))
}

fn productivity_score(tasks: &[Task], today: NaiveDate) -> u32 {
    tasks
        .iter()
        .filter(|task| task.completed && task.current_assigned_date == today)
        .count() as u32
}

fn decode_steps(snapshots: Vec<Snapshot>) -> Vec<WeeklyStep> {
    snapshots
        .into_iter()
        .filter_map(|snap| match WeeklyStep::from_document(&snap.id, snap.data) {
            Ok(step) => Some(step),
            Err(err) => {
                warn!(error = %err, "skipping malformed weekly step");
                None
            }
        })
        .collect()
}
