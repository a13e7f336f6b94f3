use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::dates::{
    date_in_week, monday_offset, upcoming_monday, week_id, week_start, AXIS_THEMES,
};
use crate::error::AppError;
use crate::model::{
    to_document, AxisDraft, GoalStatus, StepStatus, TaskType, WeeklyPlan, WeeklyStep,
    WEEKLY_PLANS, WEEKLY_STEPS,
};
use crate::store::{Document, DocumentStore, Filter, WriteOp};

/// Records a finished planning session produces, before ids are assigned.
#[derive(Clone, Debug, PartialEq)]
pub struct WeekExpansion {
    pub week_id: String,
    pub monday: NaiveDate,
    pub plan: WeeklyPlan,
    pub steps: Vec<WeeklyStep>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AxisReview {
    pub axis: String,
    pub goal: Option<String>,
    pub goal_status: GoalStatus,
    pub steps: Vec<WeeklyStep>,
}

/// Weekday indexes in the order a week is shown, Monday first.
pub const DISPLAY_DAY_ORDER: [u8; 7] = [1, 2, 3, 4, 5, 6, 0];

/// One weekday of a planned week: its theme, that theme's goal and every
/// step scheduled on the day, whatever the step's axis.
#[derive(Clone, Debug, PartialEq)]
pub struct DayAgenda {
    pub day_index: u8,
    pub date: Option<NaiveDate>,
    pub axis: &'static str,
    pub goal: Option<String>,
    pub goal_status: GoalStatus,
    pub steps: Vec<WeeklyStep>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WeeklyReview {
    pub week_id: String,
    pub plan: Option<WeeklyPlan>,
    pub axes: Vec<AxisReview>,
    pub days: Vec<DayAgenda>,
}

/// Expands per-axis drafts into the plan and step records for the week after
/// `today`. Steps without text or without days are incomplete drafts and are
/// dropped; each kept step starts on its earliest day, Monday first.
///
/// "Earliest" follows the planned week's Monday-to-Sunday order, so Sunday
/// (index 0) only wins when it is the step's sole day, unlike picking the
/// lowest day index.
pub fn expand_week(today: NaiveDate, drafts: &[AxisDraft]) -> Result<WeekExpansion, AppError> {
    let monday = upcoming_monday(today);
    let week_id = week_id(monday);
    let now = Utc::now();

    let mut seen = BTreeSet::new();
    let mut axis_goals = BTreeMap::new();
    let mut steps = Vec::new();

    for draft in drafts {
        let axis = draft.axis.trim();
        if !AXIS_THEMES.contains(&axis) {
            return Err(AppError::Validation(format!(
                "unknown axis '{axis}', expected one of: {}",
                AXIS_THEMES.join(", ")
            )));
        }
        if !seen.insert(axis) {
            return Err(AppError::Validation(format!("axis '{axis}' is planned twice")));
        }

        let goal = draft.goal.trim();
        if !goal.is_empty() {
            axis_goals.insert(axis.to_string(), goal.to_string());
        }

        for step in &draft.steps {
            if let Some(day) = step.assigned_days.iter().find(|day| **day > 6) {
                return Err(AppError::Validation(format!(
                    "weekday index {day} is out of range, expected 0-6"
                )));
            }
            let text = step.text.trim();
            let Some(earliest) = step
                .assigned_days
                .iter()
                .copied()
                .min_by_key(|day| monday_offset(*day))
            else {
                continue;
            };
            if text.is_empty() {
                continue;
            }
            steps.push(WeeklyStep {
                id: String::new(),
                planned_steps: text.to_string(),
                axis_theme: axis.to_string(),
                week_id: week_id.clone(),
                assigned_days: step.assigned_days.iter().copied().collect(),
                task_type: TaskType::Planned,
                status: StepStatus::Pending,
                current_assigned_date: date_in_week(monday, earliest),
                rollover_count: 0,
                created_at: Some(now),
                completed_at: None,
            });
        }
    }

    Ok(WeekExpansion {
        plan: WeeklyPlan {
            week_id: week_id.clone(),
            axis_goals,
            axis_goal_status: BTreeMap::new(),
            created_at: Some(now),
            last_updated_at: Some(now),
        },
        week_id,
        monday,
        steps,
    })
}

/// Writes the plan and every step in a single batch and returns the stored
/// expansion with ids filled in. The plan record is replaced, not merged.
pub async fn finish_planning(
    store: &dyn DocumentStore,
    today: NaiveDate,
    drafts: &[AxisDraft],
) -> Result<WeekExpansion, AppError> {
    let mut expansion = expand_week(today, drafts)?;

    let mut ops = Vec::with_capacity(expansion.steps.len() + 1);
    ops.push(WriteOp::set(
        WEEKLY_PLANS,
        &expansion.week_id,
        to_document(&expansion.plan)?,
        false,
    ));
    for step in &mut expansion.steps {
        step.id = store.generate_id(WEEKLY_STEPS);
        ops.push(WriteOp::set(WEEKLY_STEPS, &step.id, to_document(step)?, false));
    }

    store.batch_write(ops).await?;
    info!(
        week_id = %expansion.week_id,
        steps = expansion.steps.len(),
        "weekly plan saved"
    );
    Ok(expansion)
}

/// Flips one axis goal between pending and completed; returns the new status.
pub async fn toggle_goal_status(
    store: &dyn DocumentStore,
    week_id: &str,
    axis: &str,
) -> Result<GoalStatus, AppError> {
    let doc = store
        .get(WEEKLY_PLANS, week_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no weekly plan for {week_id}")))?;
    let plan = WeeklyPlan::from_document(week_id, doc)?;
    let next = plan.goal_status(axis).toggled();

    let mut status = Document::new();
    status.insert(axis.to_string(), Value::from(next.as_str()));
    let mut change = Document::new();
    change.insert("axisGoalStatus".to_string(), Value::Object(status));
    change.insert("lastUpdatedAt".to_string(), serde_json::to_value(Utc::now())?);
    store.set(WEEKLY_PLANS, week_id, change, true).await?;
    info!(week_id, axis, status = next.as_str(), "goal status toggled");
    Ok(next)
}

pub async fn weekly_review(store: &dyn DocumentStore, week_id: &str) -> Result<WeeklyReview, AppError> {
    let plan = store
        .get(WEEKLY_PLANS, week_id)
        .await?
        .map(|doc| WeeklyPlan::from_document(week_id, doc))
        .transpose()?;

    let snapshots = store
        .query(WEEKLY_STEPS, &[Filter::eq("weekId", week_id)], None)
        .await?;
    let mut by_axis: BTreeMap<String, Vec<WeeklyStep>> = BTreeMap::new();
    for snap in snapshots {
        match WeeklyStep::from_document(&snap.id, snap.data) {
            Ok(step) => by_axis.entry(step.axis_theme.clone()).or_default().push(step),
            Err(err) => warn!(error = %err, "skipping malformed weekly step"),
        }
    }
    for steps in by_axis.values_mut() {
        steps.sort_by(|a, b| {
            a.current_assigned_date
                .cmp(&b.current_assigned_date)
                .then_with(|| a.planned_steps.cmp(&b.planned_steps))
        });
    }

    let mut axes_in_order: Vec<String> = AXIS_THEMES.iter().map(|axis| axis.to_string()).collect();
    let mut extra: BTreeSet<String> = by_axis.keys().cloned().collect();
    if let Some(plan) = &plan {
        extra.extend(plan.axis_goals.keys().cloned());
    }
    extra.retain(|axis| !AXIS_THEMES.contains(&axis.as_str()));
    axes_in_order.extend(extra);

    let axes = axes_in_order
        .into_iter()
        .filter_map(|axis| {
            let goal = plan
                .as_ref()
                .and_then(|plan| plan.axis_goals.get(&axis).cloned());
            let steps = by_axis.remove(&axis).unwrap_or_default();
            if goal.is_none() && steps.is_empty() {
                return None;
            }
            let goal_status = plan
                .as_ref()
                .map(|plan| plan.goal_status(&axis))
                .unwrap_or_default();
            Some(AxisReview {
                axis,
                goal,
                goal_status,
                steps,
            })
        })
        .collect::<Vec<_>>();

    let days = day_agenda(week_id, plan.as_ref(), &axes);
    Ok(WeeklyReview {
        week_id: week_id.to_string(),
        plan,
        axes,
        days,
    })
}

/// Lays the week out day by day, Monday to Sunday. Steps keep the axis order
/// of `axes`; dates are left out when `week_id` does not parse.
pub fn day_agenda(
    week_id: &str,
    plan: Option<&WeeklyPlan>,
    axes: &[AxisReview],
) -> Vec<DayAgenda> {
    let monday = week_start(week_id).ok();
    DISPLAY_DAY_ORDER
        .iter()
        .map(|&day| {
            let axis = AXIS_THEMES[usize::from(day)];
            let steps = axes
                .iter()
                .flat_map(|review| review.steps.iter())
                .filter(|step| step.assigned_days.contains(&day))
                .cloned()
                .collect();
            DayAgenda {
                day_index: day,
                date: monday.map(|monday| date_in_week(monday, day)),
                axis,
                goal: plan.and_then(|plan| plan.axis_goals.get(axis).cloned()),
                goal_status: plan.map(|plan| plan.goal_status(axis)).unwrap_or_default(),
                steps,
            }
        })
        .collect()
}
