mod cli;
mod config;
mod dates;
mod db;
mod engine;
mod entities;
mod error;
mod model;
mod order;
mod planner;
mod routines;
mod store;
mod util;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, MomentArg, PlanCommand};
use crate::config::{Settings, LOG_ENV};
use crate::dates::{calendar_grid, day_index, parse_date, week_id};
use crate::engine::{DailyEngine, LoadState};
use crate::error::AppError;
use crate::model::{AxisDraft, MomentKind, StepDraft};
use crate::order::FileOrderLog;
use crate::routines::routines_for_day;
use crate::store::sqlite::SqliteStore;
use crate::store::DocumentStore;
use crate::util::{
    format_calendar, format_routines, format_today, format_week_expansion, format_weekly_review,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let Cli {
        data_dir,
        date,
        command,
    } = Cli::parse();
    let settings = Settings::resolve(data_dir, date)?;

    match command {
        Command::WeekId(args) => {
            let date = match args.date {
                Some(value) => parse_date(&value)?,
                None => settings.today,
            };
            println!("{}", week_id(date));
            return Ok(());
        }
        Command::Calendar(args) => {
            let grid = calendar_grid(args.year, args.month - 1)?;
            println!("{}", format_calendar(args.year, args.month, &grid));
            return Ok(());
        }
        Command::Routines(args) => {
            let day = args.day.unwrap_or_else(|| day_index(settings.today));
            let routines: Vec<_> = routines_for_day(day).collect();
            println!("{}", format_routines(day, &routines));
            return Ok(());
        }
        _ => {}
    }

    let db_path = db::resolve_db_path(&settings.data_dir);
    db::ensure_parent_dir(&db_path)?;
    let mut lock = db::open_lock(&db_path)?;
    let _guard = lock.write()?;

    let conn = db::connect(&db_path).await?;
    db::ensure_schema(&conn).await?;
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(conn));

    match command {
        Command::Plan(command) => handle_plan(store.as_ref(), &settings, command).await,
        command => {
            let order_log = Arc::new(FileOrderLog::new(db::resolve_order_path(
                &settings.data_dir,
            )));
            let engine = DailyEngine::new(store, order_log, settings.today);
            handle_day(&engine, command).await
        }
    }
}

async fn handle_day(engine: &DailyEngine, command: Command) -> Result<(), AppError> {
    if let Command::Journal(args) = &command {
        let id = engine.add_journal_entry(&args.text).await?;
        println!("Saved journal entry ID: {id}");
        return Ok(());
    }

    if let Err(err) = engine.build().await {
        if matches!(command, Command::Today) {
            let load = LoadState::Failed(err.to_string());
            println!(
                "{}",
                format_today(engine.today(), &[], &engine.metrics().await, &load)
            );
        }
        return Err(err);
    }

    match command {
        Command::Today => {}
        Command::Toggle(args) => {
            let task = engine.toggle_completion(&args.id).await?;
            let state = if task.completed { "completed" } else { "pending" };
            println!("Task {} marked {state}.", task.id);
        }
        Command::Add(args) => {
            let task = engine.add_ad_hoc_task(&args.text, &args.axis).await?;
            println!("Created task ID: {}", task.id);
        }
        Command::Reassign(args) => {
            let date = parse_date(&args.date)?;
            engine.reassign_date(&args.id, date).await?;
            println!("Task {} moved to {}.", args.id, args.date.trim());
        }
        Command::Promote(args) => {
            engine.promote_to_front(&args.id).await?;
            println!("Task {} moved to front.", args.id);
        }
        Command::Reorder(args) => {
            if engine.reorder(&args.dragged, &args.target).await {
                println!("Task {} moved to position of {}.", args.dragged, args.target);
            } else {
                println!("Order unchanged.");
            }
        }
        Command::Moment(args) => {
            let kind = match args.kind {
                MomentArg::Epiphany => MomentKind::Epiphany,
                MomentArg::Despair => MomentKind::Despair,
            };
            let count = engine.record_moment(kind, args.detail.as_deref()).await?;
            println!("Recorded {} #{count} for today.", kind.as_str());
            return Ok(());
        }
        Command::Journal(_)
        | Command::Plan(_)
        | Command::WeekId(_)
        | Command::Calendar(_)
        | Command::Routines(_) => {
            return Ok(());
        }
    }

    println!(
        "{}",
        format_today(
            engine.today(),
            &engine.tasks().await,
            &engine.metrics().await,
            &engine.load_state().await,
        )
    );
    Ok(())
}

async fn handle_plan(
    store: &dyn DocumentStore,
    settings: &Settings,
    command: PlanCommand,
) -> Result<(), AppError> {
    match command {
        PlanCommand::Finish(args) => {
            let drafts = parse_plan_finish_axes(&args.args)?;
            let expansion = planner::finish_planning(store, settings.today, &drafts).await?;
            println!("Saved weekly plan: {}", expansion.week_id);
            println!("{}", format_week_expansion(&expansion));
        }
        PlanCommand::Show(args) => {
            let week = args.week.unwrap_or_else(|| week_id(settings.today));
            let review = planner::weekly_review(store, week.trim()).await?;
            println!("{}", format_weekly_review(&review));
        }
        PlanCommand::Goal(args) => {
            let week = args.week.unwrap_or_else(|| week_id(settings.today));
            let status = planner::toggle_goal_status(store, week.trim(), args.axis.trim()).await?;
            println!(
                "Goal for {} in {} marked {}.",
                args.axis.trim(),
                week.trim(),
                status.as_str()
            );
        }
    }
    Ok(())
}

#[derive(Debug)]
struct AxisDraftBuilder {
    draft: AxisDraft,
    current_step: Option<StepDraft>,
}

impl AxisDraftBuilder {
    fn new(axis: &str) -> Self {
        Self {
            draft: AxisDraft {
                axis: axis.to_string(),
                ..AxisDraft::default()
            },
            current_step: None,
        }
    }

    fn start_step(&mut self, text: &str) {
        if let Some(step) = self.current_step.take() {
            self.draft.steps.push(step);
        }
        self.current_step = Some(StepDraft::new(text, &[]));
    }

    fn into_draft(mut self) -> AxisDraft {
        if let Some(step) = self.current_step.take() {
            self.draft.steps.push(step);
        }
        self.draft
    }
}

fn parse_plan_finish_axes(args: &[String]) -> Result<Vec<AxisDraft>, AppError> {
    let mut axes = Vec::new();
    let mut current: Option<AxisDraftBuilder> = None;
    let mut idx = 0;

    while idx < args.len() {
        let flag = args[idx].as_str();
        if flag == "--" {
            idx += 1;
            continue;
        }
        let value = match flag {
            "--axis" | "--goal" | "--step" | "--days" => args.get(idx + 1).ok_or_else(|| {
                AppError::Validation(format!("plan finish {flag} requires a value"))
            })?,
            unexpected => {
                return Err(AppError::Validation(format!(
                    "plan finish unexpected argument: {unexpected}"
                )));
            }
        };

        if flag == "--axis" {
            if let Some(axis) = current.take() {
                axes.push(axis.into_draft());
            }
            current = Some(AxisDraftBuilder::new(value.trim()));
            idx += 2;
            continue;
        }

        let axis = current.as_mut().ok_or_else(|| {
            AppError::Validation(format!("plan finish {flag} must follow an --axis"))
        })?;
        match flag {
            "--goal" => axis.draft.goal = value.to_string(),
            "--step" => axis.start_step(value),
            _ => {
                let step = axis.current_step.as_mut().ok_or_else(|| {
                    AppError::Validation("plan finish --days must follow a --step".to_string())
                })?;
                step.assigned_days = parse_days(value)?.into_iter().collect();
            }
        }
        idx += 2;
    }

    if let Some(axis) = current.take() {
        axes.push(axis.into_draft());
    }
    Ok(axes)
}

fn parse_days(value: &str) -> Result<Vec<u8>, AppError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<u8>() {
            Ok(day) if day <= 6 => Ok(day),
            _ => Err(AppError::Validation(format!(
                "invalid day '{part}', expected 0 (Sunday) to 6 (Saturday)"
            ))),
        })
        .collect()
}
