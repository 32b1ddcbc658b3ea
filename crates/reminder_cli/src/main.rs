mod cli;

use clap::Parser;
use clap::error::ErrorKind;
use cli::{Cli, Command, ReminderCommand, collect_overrides};
use reminder_core::clock::{Clock, SystemClock, now_local};
use reminder_core::config::{Config, load_config_with_fallback, merge_overrides};
use reminder_core::driver::{Foreground, TickReport, Worker, spawn_worker};
use reminder_core::error::AppError;
use reminder_core::model::{Reminder, Task, TaskStatus, parse_weekday};
use reminder_core::notify::notifier_from_env;
use reminder_core::schedule::{format_summary, next_fire_time};
use reminder_core::storage::JsonFileKvStore;
use reminder_core::storage::json_store;
use reminder_core::task_api::{self, RecurrenceRequest, ReminderEdit};
use std::sync::Arc;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "REMINDAPP_LOG";

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Reminders")]
    reminders: String,
    #[tabled(rename = "Next")]
    next: String,
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Completed => "completed",
    }
}

fn format_instant(at: OffsetDateTime) -> Result<String, AppError> {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// Earliest upcoming fire time across a pending task's reminders.
fn next_for_task(task: &Task, now: OffsetDateTime) -> Option<OffsetDateTime> {
    if !task.is_pending() {
        return None;
    }
    task.reminders
        .iter()
        .filter_map(|reminder| next_fire_time(reminder, now))
        .min()
}

fn next_label(next: Option<OffsetDateTime>) -> Result<String, AppError> {
    match next {
        Some(at) => format_instant(at),
        None => Ok("-".to_string()),
    }
}

fn print_tasks_table(tasks: &[Task]) -> Result<(), AppError> {
    if tasks.is_empty() {
        println!("No tasks");
        return Ok(());
    }

    let now = now_local();
    let mut rows = Vec::with_capacity(tasks.len());
    for task in tasks {
        let reminders = task
            .reminders
            .iter()
            .map(format_summary)
            .collect::<Vec<_>>()
            .join("; ");
        rows.push(TaskRow {
            id: task.id.clone(),
            title: task.title.clone(),
            status: status_label(task.status),
            reminders: if reminders.is_empty() {
                "-".to_string()
            } else {
                reminders
            },
            next: next_label(next_for_task(task, now))?,
        });
    }

    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");
    Ok(())
}

fn reminder_json(reminder: &Reminder, pending: bool, now: OffsetDateTime) -> serde_json::Value {
    let next = pending
        .then(|| next_fire_time(reminder, now))
        .flatten()
        .and_then(|at| format_instant(at).ok());
    serde_json::json!({
        "id": reminder.id(),
        "summary": format_summary(reminder),
        "next_fire": next,
        "reminder": reminder,
    })
}

fn task_json(task: &Task) -> serde_json::Value {
    let now = now_local();
    let reminders: Vec<_> = task
        .reminders
        .iter()
        .map(|reminder| reminder_json(reminder, task.is_pending(), now))
        .collect();
    serde_json::json!({
        "id": task.id,
        "title": task.title,
        "description": task.description,
        "status": task.status,
        "created_at": task.created_at,
        "completed_at": task.completed_at,
        "reminders": reminders,
    })
}

fn print_task_json(task: &Task) {
    println!("{}", task_json(task));
}

fn print_task_details(task: &Task) -> Result<(), AppError> {
    let now = now_local();
    println!("{} ({})", task.title, task.id);
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    println!("Status: {}", status_label(task.status));
    println!("Created: {}", task.created_at);
    if let Some(completed_at) = task.completed_at.as_deref() {
        println!("Completed: {completed_at}");
    }

    if task.reminders.is_empty() {
        println!("Reminders: none");
        return Ok(());
    }
    println!("Reminders:");
    for reminder in &task.reminders {
        let next = task
            .is_pending()
            .then(|| next_fire_time(reminder, now))
            .flatten();
        println!(
            "  {} | {} | next: {}",
            reminder.id(),
            format_summary(reminder),
            next_label(next)?
        );
    }
    Ok(())
}

fn print_report(report: &TickReport, json: bool) {
    if json {
        let fired: Vec<_> = report
            .fired
            .iter()
            .map(|fired| {
                serde_json::json!({
                    "task_id": fired.task_id,
                    "task_title": fired.task_title,
                    "reminder_id": fired.reminder_id,
                    "summary": fired.summary,
                })
            })
            .collect();
        let failures: Vec<_> = report
            .failures
            .iter()
            .map(|failure| {
                serde_json::json!({
                    "task_id": failure.task_id,
                    "reminder_id": failure.reminder_id,
                    "error": failure.error.to_string(),
                })
            })
            .collect();
        println!("{}", serde_json::json!({ "fired": fired, "failures": failures }));
        return;
    }

    if report.fired.is_empty() {
        println!("No reminders due");
    }
    for fired in &report.fired {
        println!("Fired reminder: {} - {}", fired.task_title, fired.summary);
    }
    for failure in &report.failures {
        eprintln!(
            "WARNING: notification for {} failed: {}",
            failure.task_id, failure.error
        );
    }
}

const PERMISSION_DENIED: &str = "Notifications are disabled; reminders were left untouched";

fn parse_days(raw: &[String]) -> Result<Vec<u8>, AppError> {
    raw.iter()
        .filter(|day| !day.trim().is_empty())
        .map(|day| {
            parse_weekday(day)
                .ok_or_else(|| AppError::invalid_input(format!("unknown weekday '{}'", day.trim())))
        })
        .collect()
}

fn print_reminder_added(task: &Task, json: bool) {
    if json {
        print_task_json(task);
        return;
    }
    if let Some(reminder) = task.reminders.last() {
        println!(
            "Added reminder {} to {}: {}",
            reminder.id(),
            task.title,
            format_summary(reminder)
        );
    }
}

fn run_reminder_command(command: ReminderCommand, json: bool) -> Result<(), AppError> {
    match command {
        ReminderCommand::Once { task_id, datetime } => {
            let task = task_api::add_one_time_reminder(&task_id, &datetime)?;
            print_reminder_added(&task, json);
        }
        ReminderCommand::Every {
            task_id,
            every,
            unit,
            at,
            days,
        } => {
            let request = RecurrenceRequest {
                every,
                unit,
                at,
                days_of_week: parse_days(&days)?,
            };
            let task = task_api::add_recurring_reminder(&task_id, &request)?;
            print_reminder_added(&task, json);
        }
        ReminderCommand::Edit {
            task_id,
            reminder_id,
            kind,
            at_datetime,
            every,
            unit,
            at,
            toggle_days,
        } => {
            let edit = ReminderEdit {
                kind,
                datetime: at_datetime,
                every,
                unit,
                at,
                toggle_days: parse_days(&toggle_days)?,
            };
            let task = task_api::edit_reminder(&task_id, &reminder_id, &edit)?;
            if json {
                print_task_json(&task);
            } else if let Some(reminder) = task.reminder(reminder_id.trim()) {
                println!(
                    "Updated reminder {} on {}: {}",
                    reminder.id(),
                    task.title,
                    format_summary(reminder)
                );
            }
        }
        ReminderCommand::Remove {
            task_id,
            reminder_id,
        } => {
            let task = task_api::remove_reminder(&task_id, &reminder_id)?;
            if json {
                print_task_json(&task);
            } else {
                println!("Removed reminder {} from {}", reminder_id.trim(), task.title);
            }
        }
        ReminderCommand::Clear { task_id } => {
            let task = task_api::clear_reminders(&task_id)?;
            if json {
                print_task_json(&task);
            } else {
                println!("Cleared reminders: {} ({})", task.title, task.id);
            }
        }
    }
    Ok(())
}

async fn watch(config: Config, clock: Arc<dyn Clock>) -> Result<(), AppError> {
    let store_path = json_store::store_path()?;
    let notifier = notifier_from_env()?;
    let mut foreground = Foreground::new(store_path, notifier.clone(), clock.clone())
        .with_permission(config.notifications);

    let mut worker_handle = None;
    if config.worker {
        let mirror = JsonFileKvStore::new(config.resolved_mirror_path()?);
        info!(mirror = %mirror.path().display(), "starting background worker");
        let worker =
            Worker::new(mirror, notifier, clock).with_legacy_fallback(config.legacy_fallback);
        let (sender, handle) = spawn_worker(worker);
        foreground = foreground.with_worker(sender);
        worker_handle = Some(handle);
    }

    if config.notifications {
        println!("Watching reminders. Press Ctrl-C to stop.");
    } else {
        println!("Notifications are disabled; reminders stay idle. Press Ctrl-C to stop.");
    }
    foreground.run(shutdown_signal()).await?;

    // The foreground dropped its sender, so the worker drains and exits.
    if let Some(handle) = worker_handle {
        handle
            .await
            .map_err(|err| AppError::channel(err.to_string()))?;
    }
    println!("Stopped watching reminders.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
}

fn run_command(cli: Cli, config: Config) -> Result<(), AppError> {
    match cli.command {
        Command::Add { title, description } => {
            let task = task_api::add_task(&title, description.as_deref())?;
            if cli.json {
                print_task_json(&task);
            } else {
                println!("Added task: {} ({})", task.title, task.id);
            }
        }
        Command::Done { id } => {
            let task = task_api::toggle_task(&id)?;
            if cli.json {
                print_task_json(&task);
            } else if task.is_pending() {
                println!("Reopened task: {} ({})", task.title, task.id);
            } else {
                println!("Completed task: {} ({})", task.title, task.id);
            }
        }
        Command::Delete { id } => {
            let task = task_api::delete_task(&id)?;
            if cli.json {
                print_task_json(&task);
            } else {
                println!("Deleted task: {} ({})", task.title, task.id);
            }
        }
        Command::Show { id } => {
            let task = task_api::get_task_by_id(&id)?;
            if cli.json {
                print_task_json(&task);
            } else {
                print_task_details(&task)?;
            }
        }
        Command::List { all } => {
            let tasks = task_api::list_tasks(all)?;
            if cli.json {
                let payload: Vec<_> = tasks.iter().map(task_json).collect();
                println!("{}", serde_json::Value::Array(payload));
            } else {
                print_tasks_table(&tasks)?;
            }
        }
        Command::Reminder { reminder } => run_reminder_command(reminder, cli.json)?,
        Command::Tick => {
            if !config.notifications {
                if cli.json {
                    print_report(&TickReport::default(), true);
                } else {
                    println!("{PERMISSION_DENIED}");
                }
                return Ok(());
            }
            let notifier = notifier_from_env()?;
            let report = task_api::fire_due_reminders(notifier.as_ref(), SystemClock::new().now())?;
            print_report(&report, cli.json);
        }
        Command::Watch => {
            // Read the local offset before the runtime exists; some platforms
            // refuse to report it once other threads are running.
            let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|err| AppError::io(err.to_string()))?;
            runtime.block_on(watch(config, clock))?;
        }
    }

    Ok(())
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, AppError> {
    let loaded = load_config_with_fallback();
    if let Some(err) = loaded.error {
        warn!("using default config: {err}");
        eprintln!("WARNING: using default config: {err}");
    }
    let overrides = collect_overrides(&cli.config_override).map_err(AppError::invalid_input)?;
    Ok(merge_overrides(&loaded.config, &overrides))
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    let result = load_config(&cli).and_then(|config| run_command(cli, config));
    if let Err(err) = result {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
