use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::routines::Routine;
use crate::store::Document;

pub const WEEKLY_STEPS: &str = "weeklySteps";
pub const WEEKLY_PLANS: &str = "weeklyPlan";
pub const DAILY_METRICS: &str = "dailyMetrics";
pub const MOMENTS_LOG: &str = "momentsLog";
pub const JOURNAL_ENTRIES: &str = "journalEntries";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Planned,
    AdHoc,
    Recurring,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::AdHoc => "ad-hoc",
            Self::Recurring => "recurring",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Completed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Pending,
    Completed,
}

impl GoalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Pending => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MomentKind {
    Epiphany,
    Despair,
}

impl MomentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Epiphany => "epiphany",
            Self::Despair => "despair",
        }
    }

    pub fn counter_field(&self) -> &'static str {
        match self {
            Self::Epiphany => "epiphanyCount",
            Self::Despair => "despairCount",
        }
    }
}

/// One entry of today's worklist. Store-backed tasks carry the id of their
/// weekly step record; routines have none.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: String,
    pub original_id: Option<String>,
    pub text: String,
    pub task_type: TaskType,
    pub axis_theme: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub current_assigned_date: NaiveDate,
    pub rollover_count: u32,
}

impl Task {
    pub fn from_step(step: &WeeklyStep, status: Option<&TaskStatusEntry>) -> Self {
        let (completed, completed_at) = match status {
            Some(entry) => (entry.completed, entry.completed_at),
            None => (
                step.status == StepStatus::Completed,
                step.completed_at,
            ),
        };
        let mut task = Self {
            id: task_id_for(&step.id),
            original_id: Some(step.id.clone()),
            text: step.planned_steps.clone(),
            task_type: step.task_type,
            axis_theme: step.axis_theme.clone(),
            completed: false,
            completed_at: None,
            current_assigned_date: step.current_assigned_date,
            rollover_count: step.rollover_count,
        };
        task.set_completed(completed, completed_at.unwrap_or_else(Utc::now));
        task
    }

    pub fn from_routine(
        routine: &Routine,
        today: NaiveDate,
        status: Option<&TaskStatusEntry>,
    ) -> Self {
        let mut task = Self {
            id: routine.id.to_string(),
            original_id: None,
            text: routine.text.to_string(),
            task_type: TaskType::Recurring,
            axis_theme: routine.axis_theme.to_string(),
            completed: false,
            completed_at: None,
            current_assigned_date: today,
            rollover_count: 0,
        };
        if let Some(entry) = status {
            task.set_completed(entry.completed, entry.completed_at.unwrap_or_else(Utc::now));
        }
        task
    }

    pub fn is_recurring(&self) -> bool {
        self.task_type == TaskType::Recurring
    }

    /// Keeps `completed_at` present exactly when the task is completed.
    pub fn set_completed(&mut self, completed: bool, at: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = if completed { Some(at) } else { None };
    }

    pub fn status_entry(&self) -> TaskStatusEntry {
        TaskStatusEntry {
            completed: self.completed,
            completed_at: self.completed_at,
        }
    }
}

pub fn task_id_for(doc_id: &str) -> String {
    format!("task-{doc_id}")
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusEntry {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyMetrics {
    pub tasks_status: BTreeMap<String, TaskStatusEntry>,
    pub productivity_score: u32,
    pub epiphany_count: u32,
    pub despair_count: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

impl DailyMetrics {
    pub fn from_document(date: &str, doc: Document) -> Result<Self, AppError> {
        decode("daily metrics", date, doc)
    }

    pub fn moment_count(&self, kind: MomentKind) -> u32 {
        match kind {
            MomentKind::Epiphany => self.epiphany_count,
            MomentKind::Despair => self.despair_count,
        }
    }

    pub fn set_moment_count(&mut self, kind: MomentKind, count: u32) {
        match kind {
            MomentKind::Epiphany => self.epiphany_count = count,
            MomentKind::Despair => self.despair_count = count,
        }
    }
}

/// Persisted unit of planned or ad-hoc work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStep {
    #[serde(skip)]
    pub id: String,
    pub planned_steps: String,
    pub axis_theme: String,
    pub week_id: String,
    #[serde(default)]
    pub assigned_days: Vec<u8>,
    pub task_type: TaskType,
    pub status: StepStatus,
    pub current_assigned_date: NaiveDate,
    #[serde(default)]
    pub rollover_count: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WeeklyStep {
    pub fn from_document(id: &str, doc: Document) -> Result<Self, AppError> {
        let mut step: Self = decode("weekly step", id, doc)?;
        if step.task_type == TaskType::Recurring {
            return Err(AppError::Validation(format!(
                "weekly step {id}: recurring tasks are never stored"
            )));
        }
        if step.planned_steps.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "weekly step {id}: plannedSteps is empty"
            )));
        }
        if let Some(day) = step.assigned_days.iter().find(|day| **day > 6) {
            return Err(AppError::Validation(format!(
                "weekly step {id}: weekday index {day} is out of range"
            )));
        }
        step.id = id.to_string();
        Ok(step)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlan {
    pub week_id: String,
    #[serde(default)]
    pub axis_goals: BTreeMap<String, String>,
    #[serde(default)]
    pub axis_goal_status: BTreeMap<String, GoalStatus>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl WeeklyPlan {
    pub fn from_document(id: &str, doc: Document) -> Result<Self, AppError> {
        decode("weekly plan", id, doc)
    }

    pub fn goal_status(&self, axis: &str) -> GoalStatus {
        self.axis_goal_status.get(axis).copied().unwrap_or_default()
    }
}

/// In-progress step from the weekly planner; may still be an incomplete draft.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepDraft {
    pub text: String,
    pub assigned_days: BTreeSet<u8>,
}

impl StepDraft {
    pub fn new(text: &str, days: &[u8]) -> Self {
        Self {
            text: text.to_string(),
            assigned_days: days.iter().copied().collect(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AxisDraft {
    pub axis: String,
    pub goal: String,
    pub steps: Vec<StepDraft>,
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document, AppError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Validation(format!(
            "expected an object record, got {other}"
        ))),
    }
}

fn decode<T: DeserializeOwned>(kind: &str, id: &str, doc: Document) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(doc))
        .map_err(|err| AppError::Validation(format!("{kind} {id}: {err}")))
}
