use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "dayplan",
    version,
    about = "Daily task list with rollover and weekly planning"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Data directory (defaults to $DAYPLAN_HOME, then ~/.dayplan)"
    )]
    pub data_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "YYYY-MM-DD",
        help = "Treat this date as today (defaults to $DAYPLAN_TODAY, then the local date)"
    )]
    pub date: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Today,
    Toggle(TaskRef),
    Add(TaskAdd),
    Reassign(TaskReassign),
    Promote(TaskRef),
    Reorder(TaskReorder),
    Moment(MomentAdd),
    Journal(JournalAdd),
    #[command(subcommand)]
    Plan(PlanCommand),
    #[command(name = "week-id")]
    WeekId(WeekIdArgs),
    Calendar(CalendarArgs),
    Routines(RoutinesArgs),
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    Finish(PlanFinish),
    Show(PlanShow),
    Goal(PlanGoal),
}

#[derive(Args, Debug)]
pub struct TaskRef {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct TaskAdd {
    pub text: String,
    #[arg(long)]
    pub axis: String,
}

#[derive(Args, Debug)]
pub struct TaskReassign {
    pub id: String,
    #[arg(value_name = "YYYY-MM-DD")]
    pub date: String,
}

#[derive(Args, Debug)]
pub struct TaskReorder {
    pub dragged: String,
    pub target: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum MomentArg {
    Epiphany,
    Despair,
}

#[derive(Args, Debug)]
pub struct MomentAdd {
    #[arg(value_enum)]
    pub kind: MomentArg,
    #[arg(long)]
    pub detail: Option<String>,
}

#[derive(Args, Debug)]
pub struct JournalAdd {
    pub text: String,
}

#[derive(Args, Debug)]
pub struct PlanFinish {
    #[arg(
        value_name = "ARGS",
        num_args = 0..,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        help = "Use --axis <axis> [--goal <goal>] [--step <text> --days <0-6,...>] repeating per axis"
    )]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PlanShow {
    #[arg(long, value_name = "WEEK_ID")]
    pub week: Option<String>,
}

#[derive(Args, Debug)]
pub struct PlanGoal {
    pub axis: String,
    #[arg(long, value_name = "WEEK_ID")]
    pub week: Option<String>,
}

#[derive(Args, Debug)]
pub struct WeekIdArgs {
    #[arg(value_name = "YYYY-MM-DD")]
    pub date: Option<String>,
}

#[derive(Args, Debug)]
pub struct CalendarArgs {
    pub year: i32,
    #[arg(value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: u32,
}

#[derive(Args, Debug)]
pub struct RoutinesArgs {
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=6))]
    pub day: Option<u8>,
}
