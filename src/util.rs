use chrono::{DateTime, NaiveDate, Utc};

use crate::dates::{axis_for_day, axis_slug, day_index, day_name, iso_date_string, week_start, DAY_NAMES};
use crate::engine::LoadState;
use crate::model::{DailyMetrics, GoalStatus, StepStatus, Task};
use crate::planner::{DayAgenda, WeekExpansion, WeeklyReview};
use crate::routines::Routine;

pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M").to_string()
}

fn checkbox(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}

pub fn format_task_line(task: &Task, today: NaiveDate) -> String {
    let mut line = format!(
        "{} {} ({}, {}, id {})",
        checkbox(task.completed),
        task.text,
        task.axis_theme,
        task.task_type.as_str(),
        task.id
    );
    if task.rollover_count > 0 {
        line.push_str(&format!(" rolled over x{}", task.rollover_count));
    }
    if task.current_assigned_date != today {
        line.push_str(&format!(" -> {}", iso_date_string(task.current_assigned_date)));
    }
    if let Some(at) = task.completed_at {
        line.push_str(&format!(" done {}", format_datetime(at)));
    }
    line
}

pub fn format_today(
    today: NaiveDate,
    tasks: &[Task],
    metrics: &DailyMetrics,
    load: &LoadState,
) -> String {
    let index = day_index(today);
    let mut output = String::new();
    output.push_str(&format!("Date: {} ({})\n", iso_date_string(today), day_name(index)));
    if let Some(axis) = axis_for_day(index) {
        output.push_str(&format!("Theme: {axis} [{}]\n", axis_slug(axis)));
    }
    let done = tasks.iter().filter(|task| task.completed).count();
    output.push_str(&format!("Completed: {done}/{}\n", tasks.len()));
    output.push_str(&format!(
        "Moments: epiphany {}, despair {}\n",
        metrics.epiphany_count, metrics.despair_count
    ));
    output.push('\n');
    if let LoadState::Failed(reason) = load {
        output.push_str(&format!("Tasks: unavailable ({reason})"));
        return output;
    }
    if tasks.is_empty() {
        output.push_str("Tasks: (none)");
        return output;
    }
    output.push_str("Tasks:\n");
    for task in tasks {
        output.push_str(&format_task_line(task, today));
        output.push('\n');
    }
    output.trim_end().to_string()
}

pub fn format_week_expansion(expansion: &WeekExpansion) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "Week: {} (starts {})\n",
        expansion.week_id,
        iso_date_string(expansion.monday)
    ));
    output.push_str(&format!("Goals: {}\n", expansion.plan.axis_goals.len()));
    output.push_str(&format!("Steps: {}\n", expansion.steps.len()));
    for step in &expansion.steps {
        output.push_str(&format!(
            "- {} ({}) starts {}\n",
            step.planned_steps,
            step.axis_theme,
            iso_date_string(step.current_assigned_date)
        ));
    }
    output.trim_end().to_string()
}

pub fn format_weekly_review(review: &WeeklyReview) -> String {
    let mut output = String::new();
    output.push_str(&format!("Week: {}", review.week_id));
    if let Ok(monday) = week_start(&review.week_id) {
        output.push_str(&format!(
            " ({} to {})",
            iso_date_string(monday),
            iso_date_string(monday + chrono::Duration::days(6))
        ));
    }
    output.push('\n');
    if review.plan.is_none() {
        output.push_str("Plan: (none)\n");
    }
    if review.axes.is_empty() {
        output.push_str("\nAxes: (none)");
        return output;
    }
    for axis in &review.axes {
        output.push('\n');
        output.push_str(&format!("{}:\n", axis.axis));
        if let Some(goal) = &axis.goal {
            output.push_str(&format!(
                "  Goal {} {}\n",
                checkbox(axis.goal_status == GoalStatus::Completed),
                goal
            ));
        }
        for step in &axis.steps {
            let days: Vec<&str> = step
                .assigned_days
                .iter()
                .map(|day| &day_name(*day)[..3])
                .collect();
            output.push_str(&format!(
                "  {} {} ({}; {}; on {})\n",
                checkbox(step.status == StepStatus::Completed),
                step.planned_steps,
                step.task_type.as_str(),
                if days.is_empty() {
                    "no days".to_string()
                } else {
                    days.join(", ")
                },
                iso_date_string(step.current_assigned_date)
            ));
        }
    }
    output.push_str("\nBy day:\n");
    output.push_str(&format_day_agenda(&review.days));
    output.trim_end().to_string()
}

pub fn format_day_agenda(days: &[DayAgenda]) -> String {
    let mut output = String::new();
    for day in days {
        output.push_str(day_name(day.day_index));
        if let Some(date) = day.date {
            output.push_str(&format!(" {}", iso_date_string(date)));
        }
        output.push_str(&format!(" - {}\n", day.axis));
        if let Some(goal) = &day.goal {
            output.push_str(&format!(
                "  goal: {goal} ({})\n",
                day.goal_status.as_str()
            ));
        }
        if day.steps.is_empty() {
            output.push_str("  (no steps)\n");
        }
        for step in &day.steps {
            output.push_str(&format!(
                "  {} {} ({})\n",
                checkbox(step.status == StepStatus::Completed),
                step.planned_steps,
                step.axis_theme
            ));
        }
    }
    output.trim_end().to_string()
}

pub fn format_calendar(year: i32, month: u32, grid: &[[Option<u32>; 7]]) -> String {
    let mut output = format!("{year}-{month:02}\n");
    let header: Vec<&str> = DAY_NAMES.iter().map(|name| &name[..2]).collect();
    output.push_str(&header.join(" "));
    output.push('\n');
    for week in grid {
        let cells: Vec<String> = week
            .iter()
            .map(|cell| match cell {
                Some(day) => format!("{day:>2}"),
                None => "  ".to_string(),
            })
            .collect();
        output.push_str(cells.join(" ").trim_end());
        output.push('\n');
    }
    output.trim_end().to_string()
}

pub fn format_routines(day: u8, routines: &[&Routine]) -> String {
    let mut output = format!("Routines for {}:\n", day_name(day));
    if routines.is_empty() {
        output.push_str("(none)");
        return output;
    }
    for routine in routines {
        output.push_str(&format!(
            "- {} ({}, id {})\n",
            routine.text, routine.axis_theme, routine.id
        ));
    }
    output.trim_end().to_string()
}
