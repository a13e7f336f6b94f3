use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use sea_orm::{ConnectionTrait, Database, DatabaseBackend, Statement};
use tempfile::TempDir;
use url::Url;

const TODAY: &str = "2026-10-13";

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dayplan"))
}

fn run_cmd_on(dir: &TempDir, date: &str, args: &[&str]) -> Output {
    let mut cmd = Command::new(bin_path());
    cmd.env_remove("DAYPLAN_HOME")
        .env_remove("DAYPLAN_TODAY")
        .env_remove("DAYPLAN_LOG")
        .arg("--data-dir")
        .arg(dir.path())
        .arg("--date")
        .arg(date)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd.spawn()
        .expect("spawn command")
        .wait_with_output()
        .expect("wait output")
}

fn run_cmd(dir: &TempDir, args: &[&str]) -> Output {
    run_cmd_on(dir, TODAY, args)
}

fn output_stdout(output: Output) -> String {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout utf8")
}

fn output_stderr(output: Output) -> String {
    assert!(!output.status.success(), "command unexpectedly succeeded");
    String::from_utf8(output.stderr).expect("stderr utf8")
}

fn parse_task_id(stdout: &str) -> String {
    let prefix = "Created task ID: ";
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
        .expect("task output")
        .trim()
        .to_string()
}

fn task_lines(stdout: &str) -> Vec<&str> {
    stdout
        .lines()
        .filter(|line| line.starts_with("[ ] ") || line.starts_with("[x] "))
        .collect()
}

fn line_for<'a>(stdout: &'a str, needle: &str) -> &'a str {
    task_lines(stdout)
        .into_iter()
        .find(|line| line.contains(needle))
        .unwrap_or_else(|| panic!("no task line containing {needle} in:\n{stdout}"))
}

#[test]
fn week_id_handles_year_boundaries() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(&dir, &["week-id", "2027-01-01"]));
    assert_eq!(stdout.trim(), "2026-W53");
    let stdout = output_stdout(run_cmd(&dir, &["week-id"]));
    assert_eq!(stdout.trim(), "2026-W42");
}

#[test]
fn calendar_prints_sunday_first_grid() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(&dir, &["calendar", "2026", "2"]));
    let lines: Vec<&str> = stdout.trim_end().lines().collect();
    assert_eq!(lines[0], "2026-02");
    assert_eq!(lines[1], "Su Mo Tu We Th Fr Sa");
    assert_eq!(lines[2], " 1  2  3  4  5  6  7");
    assert_eq!(lines.len(), 6);

    let stderr = output_stderr(run_cmd(&dir, &["calendar", "2026", "13"]));
    assert!(stderr.contains("13"));
}

#[test]
fn routines_follow_weekday() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(&dir, &["routines"]));
    assert!(stdout.starts_with("Routines for Tuesday:"));
    assert!(stdout.contains("routine_budget"));

    let stdout = output_stdout(run_cmd(&dir, &["routines", "--day", "0"]));
    assert!(stdout.contains("routine_prepare"));
    assert!(!stdout.contains("routine_ready"));
}

#[test]
fn today_lists_routines_with_theme() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(&dir, &["today"]));
    assert!(stdout.contains("Date: 2026-10-13 (Tuesday)"));
    assert!(stdout.contains("Theme: Financial [financial]"));
    assert!(stdout.contains("Completed: 0/7"));
    assert_eq!(task_lines(&stdout).len(), 7);
    assert!(dir.path().join("dayplan.db").exists());
    assert!(dir.path().join("task_order.json").exists());
}

#[test]
fn ad_hoc_task_lands_on_top_and_toggles() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(&dir, &["add", "Buy stamps", "--axis", "Financial"]));
    let task_id = parse_task_id(&stdout);
    assert!(task_id.starts_with("task-"));

    let stdout = output_stdout(run_cmd(&dir, &["today"]));
    let first = task_lines(&stdout)[0];
    assert!(first.starts_with("[ ] Buy stamps (Financial, ad-hoc"));

    let stdout = output_stdout(run_cmd(&dir, &["toggle", &task_id]));
    assert!(stdout.contains(&format!("Task {task_id} marked completed.")));
    assert!(stdout.contains("Completed: 1/8"));
    let last = *task_lines(&stdout).last().expect("task line");
    assert!(last.starts_with("[x] Buy stamps"));

    let stdout = output_stdout(run_cmd(&dir, &["toggle", &task_id]));
    assert!(stdout.contains(&format!("Task {task_id} marked pending.")));
    assert!(task_lines(&stdout)[0].starts_with("[ ] Buy stamps"));
}

#[test]
fn add_rejects_blank_text() {
    let dir = TempDir::new().expect("temp dir");
    let stderr = output_stderr(run_cmd(&dir, &["add", "   ", "--axis", "Gear"]));
    assert!(stderr.contains("Invalid input: task text cannot be empty"));
}

#[test]
fn planned_steps_roll_over_once_per_day() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(
        &dir,
        &[
            "plan", "finish", "--axis", "Physical", "--goal", "Run 20km", "--step", "Long run",
            "--days", "2,4", "--step", "No days yet",
        ],
    ));
    assert!(stdout.contains("Saved weekly plan: 2026-W43"));
    assert!(stdout.contains("Steps: 1"));
    assert!(stdout.contains("- Long run (Physical) starts 2026-10-20"));

    let stdout = output_stdout(run_cmd_on(&dir, "2026-10-20", &["today"]));
    let line = line_for(&stdout, "Long run");
    assert!(!line.contains("rolled over"));

    let stdout = output_stdout(run_cmd_on(&dir, "2026-10-22", &["today"]));
    assert!(line_for(&stdout, "Long run").contains("rolled over x1"));
    let stdout = output_stdout(run_cmd_on(&dir, "2026-10-22", &["today"]));
    assert!(line_for(&stdout, "Long run").contains("rolled over x1"));
}

#[test]
fn plan_show_and_goal_toggle() {
    let dir = TempDir::new().expect("temp dir");
    output_stdout(run_cmd(
        &dir,
        &[
            "plan", "finish", "--axis", "Gear", "--goal", "Fix bike", "--step", "Oil chain",
            "--days", "0,3",
        ],
    ));

    let stdout = output_stdout(run_cmd(&dir, &["plan", "show", "--week", "2026-W43"]));
    assert!(stdout.contains("Week: 2026-W43 (2026-10-19 to 2026-10-25)"));
    assert!(stdout.contains("Goal [ ] Fix bike"));
    assert!(stdout.contains("[ ] Oil chain (planned; Sun, Wed; on 2026-10-21)"));
    assert!(stdout.contains("By day:\nMonday 2026-10-19 - Physical\n  (no steps)"));
    assert!(stdout.contains("Wednesday 2026-10-21 - Gear\n  goal: Fix bike (pending)\n  [ ] Oil chain (Gear)"));
    assert!(stdout.contains("Sunday 2026-10-25 - Rest and preparation\n  [ ] Oil chain (Gear)"));

    let stdout = output_stdout(run_cmd(&dir, &["plan", "goal", "Gear", "--week", "2026-W43"]));
    assert_eq!(stdout.trim(), "Goal for Gear in 2026-W43 marked completed.");
    let stdout = output_stdout(run_cmd(&dir, &["plan", "show", "--week", "2026-W43"]));
    assert!(stdout.contains("Goal [x] Fix bike"));
    assert!(stdout.contains("goal: Fix bike (completed)"));

    let stderr = output_stderr(run_cmd(&dir, &["plan", "goal", "Gear"]));
    assert!(stderr.contains("Not found"));
}

#[test]
fn plan_finish_rejects_unknown_axis() {
    let dir = TempDir::new().expect("temp dir");
    let stderr = output_stderr(run_cmd(&dir, &["plan", "finish", "--axis", "Cooking"]));
    assert!(stderr.contains("unknown axis 'Cooking'"));
}

#[test]
fn reassign_rejects_recurring_routine() {
    let dir = TempDir::new().expect("temp dir");
    let stderr = output_stderr(run_cmd(&dir, &["reassign", "routine_am", "2026-10-20"]));
    assert!(stderr.contains("Not allowed"));
}

#[test]
fn reassigned_task_leaves_today() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(&dir, &["add", "Call bank", "--axis", "Financial"]));
    let task_id = parse_task_id(&stdout);

    let stdout = output_stdout(run_cmd(&dir, &["reassign", &task_id, "2026-10-15"]));
    assert!(stdout.contains("-> 2026-10-15"));
    let stdout = output_stdout(run_cmd(&dir, &["today"]));
    assert!(!stdout.contains("Call bank"));
    let stdout = output_stdout(run_cmd_on(&dir, "2026-10-15", &["today"]));
    assert!(!line_for(&stdout, "Call bank").contains("rolled over"));
}

#[test]
fn reorder_and_promote_persist_between_runs() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(&dir, &["today"]));
    let lines = task_lines(&stdout);
    let last = lines.last().expect("task line").to_string();
    assert!(!lines[0].contains("id routine_budget"));

    output_stdout(run_cmd(&dir, &["promote", "routine_budget"]));
    let stdout = output_stdout(run_cmd(&dir, &["today"]));
    assert!(task_lines(&stdout)[0].contains("id routine_budget"));

    let stdout = output_stdout(run_cmd(&dir, &["reorder", "routine_budget", "routine_budget"]));
    assert!(stdout.starts_with("Order unchanged."));

    let target = last
        .rsplit("id ")
        .next()
        .and_then(|rest| rest.split(')').next())
        .expect("task id")
        .to_string();
    output_stdout(run_cmd(&dir, &["reorder", "routine_budget", &target]));
    let stdout = output_stdout(run_cmd(&dir, &["today"]));
    assert!(task_lines(&stdout)
        .last()
        .expect("task line")
        .contains("id routine_budget"));
}

#[test]
fn moments_are_counted() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(
        &dir,
        &["moment", "epiphany", "--detail", "Batch the errands"],
    ));
    assert_eq!(stdout.trim(), "Recorded epiphany #1 for today.");
    output_stdout(run_cmd(&dir, &["moment", "despair"]));
    let stdout = output_stdout(run_cmd(&dir, &["today"]));
    assert!(stdout.contains("Moments: epiphany 1, despair 1"));
}

#[test]
fn journal_entries_are_saved_and_blank_text_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let stdout = output_stdout(run_cmd(&dir, &["journal", "Slept badly, keep today light"]));
    let id = stdout
        .trim()
        .strip_prefix("Saved journal entry ID: ")
        .expect("journal output");
    assert!(!id.is_empty());

    let stderr = output_stderr(run_cmd(&dir, &["journal", "   "]));
    assert!(stderr.contains("Invalid input: journal entry cannot be empty"));
}

#[test]
fn toggle_unknown_task_reports_not_found() {
    let dir = TempDir::new().expect("temp dir");
    let stderr = output_stderr(run_cmd(&dir, &["toggle", "task-missing"]));
    assert!(stderr.contains("Not found"));
}

#[tokio::test]
async fn malformed_store_records_are_skipped() {
    let dir = TempDir::new().expect("temp dir");
    output_stdout(run_cmd(&dir, &["add", "Keep me", "--axis", "Gear"]));

    let db_path = dir.path().join("dayplan.db");
    let mut url = Url::from_file_path(&db_path).expect("db path");
    url.set_query(Some("mode=rwc"));
    let sqlite_url = url.as_str().replacen("file://", "sqlite://", 1);
    let db = Database::connect(&sqlite_url).await.expect("connect db");
    db.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        format!(
            "INSERT INTO documents (collection, doc_id, body, created_at, updated_at) \
             VALUES ('weeklySteps', 'broken', '{{\"taskType\":\"planned\",\"currentAssignedDate\":\"{TODAY}\"}}', \
             '2026-10-13T00:00:00+00:00', '2026-10-13T00:00:00+00:00');"
        ),
    ))
    .await
    .expect("insert broken step");

    let stdout = output_stdout(run_cmd(&dir, &["today"]));
    assert!(stdout.contains("Keep me"));
    assert!(!stdout.contains("task-broken"));
}
