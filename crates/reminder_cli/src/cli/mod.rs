use clap::{Parser, Subcommand};
use reminder_core::config::ConfigOverrides;
use reminder_core::model::{RecurrenceUnit, ReminderKind, TimeOfDay};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: remind add "Water plants" --description "balcony too"
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Toggle a task between pending and completed
    ///
    /// Example: remind done task-1
    Done { id: String },
    /// Delete a task
    ///
    /// Example: remind delete task-1
    Delete { id: String },
    /// Show a task with its reminders and their next fire times
    ///
    /// Example: remind show task-1
    Show { id: String },
    /// List tasks
    ///
    /// Example: remind list
    /// Example: remind list --all
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,
    },
    /// Manage a task's reminders
    Reminder {
        #[command(subcommand)]
        reminder: ReminderCommand,
    },
    /// Fire every due reminder once and exit
    ///
    /// Example: remind tick
    Tick,
    /// Keep firing reminders on every minute until Ctrl-C
    ///
    /// Example: remind watch
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum ReminderCommand {
    /// Add a one-time reminder
    ///
    /// Example: remind reminder once task-1 2025-12-24T18:00:00+01:00
    Once { task_id: String, datetime: String },
    /// Add a recurring reminder
    ///
    /// Example: remind reminder every task-1 4 hours
    /// Example: remind reminder every task-1 1 days --at 08:30
    /// Example: remind reminder every task-1 2 weeks --at 19:00 --days mon,thu
    Every {
        task_id: String,
        every: u32,
        unit: RecurrenceUnit,
        /// Time of day (HH:MM); ignored for hourly reminders
        #[arg(long, value_name = "HH:MM")]
        at: Option<TimeOfDay>,
        /// Weekdays for weekly reminders (sun..sat or 0..6)
        #[arg(long, value_delimiter = ',')]
        days: Vec<String>,
    },
    /// Edit one reminder in place
    ///
    /// Switching --kind resets the reminder to that kind's defaults first.
    ///
    /// Example: remind reminder edit task-1 rem-1733000000-0 --datetime 2025-12-24T18:00:00Z
    /// Example: remind reminder edit task-1 rem-1733000000-0 --kind recurring --unit weeks --toggle-day mon,fri
    Edit {
        task_id: String,
        reminder_id: String,
        /// Reminder kind (once or recurring)
        #[arg(long, value_parser = parse_kind)]
        kind: Option<ReminderKind>,
        /// New date and time for a one-time reminder (RFC3339)
        #[arg(long = "datetime", value_name = "RFC3339")]
        at_datetime: Option<String>,
        #[arg(long)]
        every: Option<u32>,
        #[arg(long)]
        unit: Option<RecurrenceUnit>,
        /// Time of day (HH:MM)
        #[arg(long, value_name = "HH:MM")]
        at: Option<TimeOfDay>,
        /// Weekdays to switch on or off (sun..sat or 0..6)
        #[arg(long = "toggle-day", value_delimiter = ',')]
        toggle_days: Vec<String>,
    },
    /// Remove one reminder
    ///
    /// Example: remind reminder remove task-1 rem-1733000000-0
    Remove { task_id: String, reminder_id: String },
    /// Remove every reminder of a task
    ///
    /// Example: remind reminder clear task-1
    Clear { task_id: String },
}

fn parse_kind(raw: &str) -> Result<ReminderKind, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "once" | "one-time" => Ok(ReminderKind::Once),
        "recurring" | "every" => Ok(ReminderKind::Recurring),
        other => Err(format!("unknown kind '{other}' (expected once or recurring)")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    Notifications,
    Worker,
    LegacyFallback,
    MirrorPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let field = canonicalize_flag_name(key_raw)
        .ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match field.as_str() {
        "notifications" => ConfigOverrideTarget::Notifications,
        "worker" => ConfigOverrideTarget::Worker,
        "legacy_fallback" => ConfigOverrideTarget::LegacyFallback,
        "mirror_path" => ConfigOverrideTarget::MirrorPath,
        other => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride { target, value })
}

/// Fold every `--config-override` into one set of overrides; later ones win.
pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)?;
        match parsed.target {
            ConfigOverrideTarget::Notifications => {
                overrides.notifications = Some(parse_flag(&parsed.value)?);
            }
            ConfigOverrideTarget::Worker => overrides.worker = Some(parse_flag(&parsed.value)?),
            ConfigOverrideTarget::LegacyFallback => {
                overrides.legacy_fallback = Some(parse_flag(&parsed.value)?);
            }
            ConfigOverrideTarget::MirrorPath => {
                if parsed.value.is_empty() {
                    return Err("mirror_path override cannot be empty".to_string());
                }
                overrides.mirror_path = Some(PathBuf::from(parsed.value));
            }
        }
    }
    Ok(overrides)
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
