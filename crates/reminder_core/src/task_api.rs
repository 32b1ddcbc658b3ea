use crate::driver::{TickReport, fire_due};
use crate::error::AppError;
use crate::model::{
    OneTimeReminder, RecurrenceUnit, RecurringReminder, Reminder, ReminderKind, Task, TaskStatus,
    TimeOfDay, new_reminder_id,
};
use crate::notify::Notifier;
use crate::storage::json_store;
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::path::Path;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

/// Shape of a recurring reminder as entered by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRequest {
    pub every: u32,
    pub unit: RecurrenceUnit,
    pub at: Option<TimeOfDay>,
    pub days_of_week: Vec<u8>,
}

/// Changes to one reminder, applied in field order. Switching `kind`
/// resets the reminder to that kind's defaults before anything else applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderEdit {
    pub kind: Option<ReminderKind>,
    pub datetime: Option<String>,
    pub every: Option<u32>,
    pub unit: Option<RecurrenceUnit>,
    pub at: Option<TimeOfDay>,
    pub toggle_days: Vec<u8>,
}

impl ReminderEdit {
    fn touches_recurrence(&self) -> bool {
        self.every.is_some() || self.unit.is_some() || self.at.is_some() || !self.toggle_days.is_empty()
    }
}

pub fn add_task(title: &str, description: Option<&str>) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    add_task_with_path(&path, title, description)
}

pub fn list_tasks(include_completed: bool) -> Result<Vec<Task>, AppError> {
    let path = json_store::store_path()?;
    list_tasks_with_path(&path, include_completed)
}

pub fn get_task_by_id(id: &str) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    get_task_by_id_with_path(&path, id)
}

pub fn toggle_task(id: &str) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    toggle_task_with_path(&path, id)
}

pub fn delete_task(id: &str) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    delete_task_with_path(&path, id)
}

pub fn add_one_time_reminder(task_id: &str, datetime: &str) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    add_one_time_reminder_with_path(&path, task_id, datetime)
}

pub fn add_recurring_reminder(task_id: &str, request: &RecurrenceRequest) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    add_recurring_reminder_with_path(&path, task_id, request)
}

pub fn remove_reminder(task_id: &str, reminder_id: &str) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    remove_reminder_with_path(&path, task_id, reminder_id)
}

pub fn clear_reminders(task_id: &str) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    clear_reminders_with_path(&path, task_id)
}

/// Replace a task's whole reminder list.
pub fn set_reminders(task_id: &str, reminders: Vec<Reminder>) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    set_reminders_with_path(&path, task_id, reminders)
}

/// Edit one reminder in place and write the task's list back whole.
pub fn edit_reminder(task_id: &str, reminder_id: &str, edit: &ReminderEdit) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    edit_reminder_with_path(&path, task_id, reminder_id, edit)
}

/// Record that a reminder fired at `now`. Calling it again for the same
/// minute leaves the store unchanged.
pub fn mark_reminder_fired(
    task_id: &str,
    reminder_id: &str,
    now: OffsetDateTime,
) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    mark_reminder_fired_with_path(&path, task_id, reminder_id, now)
}

/// One foreground tick against the authoritative store.
pub fn fire_due_reminders(
    notifier: &dyn Notifier,
    now: OffsetDateTime,
) -> Result<TickReport, AppError> {
    let path = json_store::store_path()?;
    let (_, report) = fire_and_persist(&path, notifier, now)?;
    Ok(report)
}

/// Load, fire everything due, and write fired state back. The store is
/// only rewritten when something fired.
///
/// Notifiers may block, so the fired state is patched onto a fresh load of
/// the store rather than saving the snapshot the tick evaluated. An edit
/// that landed in between survives; a reminder deleted in between stays
/// deleted.
pub(crate) fn fire_and_persist(
    path: &Path,
    notifier: &dyn Notifier,
    now: OffsetDateTime,
) -> Result<(Vec<Task>, TickReport), AppError> {
    let mut tasks = json_store::load_tasks(path)?;
    let report = fire_due(&mut tasks, now, notifier);
    if report.fired.is_empty() {
        return Ok((tasks, report));
    }

    let mut fresh = json_store::load_tasks(path)?;
    for fired in &report.fired {
        let patched = fresh
            .iter_mut()
            .find(|task| task.id == fired.task_id)
            .is_some_and(|task| task.mark_reminder_fired(&fired.reminder_id, now));
        if !patched {
            debug!(task_id = %fired.task_id, reminder_id = %fired.reminder_id, "fired reminder vanished before save");
        }
    }
    json_store::save_tasks(path, &fresh)?;
    debug!(fired = report.fired.len(), "persisted fired state");
    Ok((fresh, report))
}

fn add_task_with_path(
    path: &Path,
    title: &str,
    description: Option<&str>,
) -> Result<Task, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("title is required"));
    }

    let now = OffsetDateTime::now_utc();
    let task = Task {
        id: format!("task-{}", now.unix_timestamp_nanos()),
        title: trimmed.to_string(),
        description: description.map(str::trim).unwrap_or_default().to_string(),
        status: TaskStatus::Pending,
        created_at: timestamp(now)?,
        completed_at: None,
        reminders: Vec::new(),
    };

    let mut tasks = json_store::load_tasks(path)?;
    tasks.push(task.clone());
    json_store::save_tasks(path, &tasks)?;

    info!(task_id = %task.id, "task added");
    Ok(task)
}

fn list_tasks_with_path(path: &Path, include_completed: bool) -> Result<Vec<Task>, AppError> {
    let tasks = json_store::load_tasks(path)?;
    Ok(tasks
        .into_iter()
        .filter(|task| include_completed || task.is_pending())
        .collect())
}

fn get_task_by_id_with_path(path: &Path, id: &str) -> Result<Task, AppError> {
    let trimmed_id = required_id(id)?;
    json_store::load_tasks(path)?
        .into_iter()
        .find(|task| task.id == trimmed_id)
        .ok_or_else(|| AppError::invalid_input("task not found"))
}

fn toggle_task_with_path(path: &Path, id: &str) -> Result<Task, AppError> {
    update_task(path, id, |task| {
        match task.status {
            TaskStatus::Pending => {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(timestamp(OffsetDateTime::now_utc())?);
            }
            TaskStatus::Completed => {
                task.status = TaskStatus::Pending;
                task.completed_at = None;
            }
        }
        Ok(())
    })
}

fn delete_task_with_path(path: &Path, id: &str) -> Result<Task, AppError> {
    let trimmed_id = required_id(id)?;

    let mut tasks = json_store::load_tasks(path)?;
    let index = tasks
        .iter()
        .position(|task| task.id == trimmed_id)
        .ok_or_else(|| AppError::invalid_input("task not found"))?;

    let removed = tasks.remove(index);
    json_store::save_tasks(path, &tasks)?;

    Ok(removed)
}

fn add_one_time_reminder_with_path(
    path: &Path,
    task_id: &str,
    datetime: &str,
) -> Result<Task, AppError> {
    let trimmed_datetime = datetime.trim();
    if trimmed_datetime.is_empty() {
        return Err(AppError::invalid_input("datetime is required"));
    }
    let parsed = OffsetDateTime::parse(trimmed_datetime, &Rfc3339)
        .map_err(|_| AppError::invalid_input("datetime must be RFC3339"))?;

    let mut reminders = get_task_by_id_with_path(path, task_id)?.reminders;
    reminders.push(Reminder::Once(OneTimeReminder {
        id: new_reminder_id(),
        datetime: Some(parsed),
        fired: false,
    }));
    set_reminders_with_path(path, task_id, reminders)
}

fn add_recurring_reminder_with_path(
    path: &Path,
    task_id: &str,
    request: &RecurrenceRequest,
) -> Result<Task, AppError> {
    let every = NonZeroU32::new(request.every)
        .ok_or_else(|| AppError::invalid_input("every must be at least 1"))?;
    if request.unit != RecurrenceUnit::Weeks && !request.days_of_week.is_empty() {
        return Err(AppError::invalid_input("days only apply to weekly reminders"));
    }
    if let Some(day) = request.days_of_week.iter().find(|day| **day > 6) {
        return Err(AppError::invalid_input(format!("invalid weekday {day}")));
    }

    let mut days = request.days_of_week.clone();
    days.sort_unstable();
    days.dedup();

    let reminder = RecurringReminder {
        id: new_reminder_id(),
        unit: request.unit,
        every,
        time: request.at.unwrap_or_default(),
        days_of_week: (request.unit == RecurrenceUnit::Weeks).then_some(days),
        last_fired: None,
    };

    let mut reminders = get_task_by_id_with_path(path, task_id)?.reminders;
    reminders.push(Reminder::Recurring(reminder));
    set_reminders_with_path(path, task_id, reminders)
}

fn remove_reminder_with_path(path: &Path, task_id: &str, reminder_id: &str) -> Result<Task, AppError> {
    let trimmed_reminder = reminder_id.trim();
    if trimmed_reminder.is_empty() {
        return Err(AppError::invalid_input("reminder id is required"));
    }

    let mut reminders = get_task_by_id_with_path(path, task_id)?.reminders;
    let before = reminders.len();
    reminders.retain(|reminder| reminder.id() != trimmed_reminder);
    if reminders.len() == before {
        return Err(AppError::invalid_input("reminder not found"));
    }
    set_reminders_with_path(path, task_id, reminders)
}

fn clear_reminders_with_path(path: &Path, task_id: &str) -> Result<Task, AppError> {
    set_reminders_with_path(path, task_id, Vec::new())
}

fn set_reminders_with_path(
    path: &Path,
    task_id: &str,
    reminders: Vec<Reminder>,
) -> Result<Task, AppError> {
    ensure_unique_ids(&reminders)?;

    let count = reminders.len();
    let task = update_task(path, task_id, move |task| {
        task.reminders = reminders;
        Ok(())
    })?;
    debug!(task_id = %task.id, count, "reminders replaced");
    Ok(task)
}

fn ensure_unique_ids(reminders: &[Reminder]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    match reminders.iter().find(|reminder| !seen.insert(reminder.id())) {
        Some(duplicate) => Err(AppError::invalid_input(format!(
            "duplicate reminder id {}",
            duplicate.id()
        ))),
        None => Ok(()),
    }
}

fn edit_reminder_with_path(
    path: &Path,
    task_id: &str,
    reminder_id: &str,
    edit: &ReminderEdit,
) -> Result<Task, AppError> {
    let trimmed_reminder = reminder_id.trim();
    let mut reminders = get_task_by_id_with_path(path, task_id)?.reminders;
    let reminder = reminders
        .iter_mut()
        .find(|reminder| reminder.id() == trimmed_reminder)
        .ok_or_else(|| AppError::invalid_input("reminder not found"))?;
    apply_edit(reminder, edit)?;
    set_reminders_with_path(path, task_id, reminders)
}

fn apply_edit(reminder: &mut Reminder, edit: &ReminderEdit) -> Result<(), AppError> {
    if let Some(day) = edit.toggle_days.iter().find(|day| **day > 6) {
        return Err(AppError::invalid_input(format!("invalid weekday {day}")));
    }
    if edit.every == Some(0) {
        return Err(AppError::invalid_input("every must be at least 1"));
    }
    if let Some(kind) = edit.kind
        && kind != reminder.kind()
    {
        reminder.switch_kind(kind);
    }

    match reminder {
        Reminder::Once(once) => {
            if edit.touches_recurrence() {
                return Err(AppError::invalid_input(
                    "every, unit, time and days only apply to recurring reminders",
                ));
            }
            if let Some(raw) = edit.datetime.as_deref() {
                let parsed = OffsetDateTime::parse(raw.trim(), &Rfc3339)
                    .map_err(|_| AppError::invalid_input("datetime must be RFC3339"))?;
                // A fired one-time reminder stays fired.
                once.datetime = Some(parsed);
            }
        }
        Reminder::Recurring(recurring) => {
            if edit.datetime.is_some() {
                return Err(AppError::invalid_input(
                    "datetime only applies to one-time reminders",
                ));
            }
            if let Some(unit) = edit.unit {
                recurring.set_unit(unit);
            }
            if let Some(every) = edit.every {
                recurring.set_every(every);
            }
            if let Some(at) = edit.at {
                recurring.time = at;
            }
            if !edit.toggle_days.is_empty() && recurring.unit != RecurrenceUnit::Weeks {
                return Err(AppError::invalid_input("days only apply to weekly reminders"));
            }
            for day in &edit.toggle_days {
                recurring.toggle_day(*day);
            }
            if let Some(days) = recurring.days_of_week.as_mut() {
                days.sort_unstable();
            }
        }
    }
    Ok(())
}

fn mark_reminder_fired_with_path(
    path: &Path,
    task_id: &str,
    reminder_id: &str,
    now: OffsetDateTime,
) -> Result<Task, AppError> {
    update_task(path, task_id, |task| {
        if task.mark_reminder_fired(reminder_id.trim(), now) {
            Ok(())
        } else {
            Err(AppError::invalid_input("reminder not found"))
        }
    })
}

/// Load, patch one task, save. Nothing is written when `apply` fails.
fn update_task<F>(path: &Path, id: &str, apply: F) -> Result<Task, AppError>
where
    F: FnOnce(&mut Task) -> Result<(), AppError>,
{
    let trimmed_id = required_id(id)?;

    let mut tasks = json_store::load_tasks(path)?;
    let task = tasks
        .iter_mut()
        .find(|task| task.id == trimmed_id)
        .ok_or_else(|| AppError::invalid_input("task not found"))?;
    apply(task)?;
    let updated = task.clone();

    json_store::save_tasks(path, &tasks)?;
    Ok(updated)
}

fn required_id(id: &str) -> Result<&str, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }
    Ok(trimmed)
}

fn timestamp(at: OffsetDateTime) -> Result<String, AppError> {
    at.format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}
