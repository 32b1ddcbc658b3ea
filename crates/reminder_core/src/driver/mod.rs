//! Minute-aligned firing loop, hosted once by the foreground (which owns the
//! task store) and once by the background worker (which owns a mirror).

mod foreground;
mod timer;
mod worker;

pub use foreground::Foreground;
pub use timer::{MinuteTimer, TICK_PERIOD, delay_until_next_minute};
pub use worker::{Worker, spawn_worker};

use crate::error::AppError;
use crate::model::{Reminder, Task};
use crate::notify::{Notification, Notifier, activation_argument};
use crate::schedule::{format_reminder_in, should_fire};
use crate::sync::ScheduleEntry;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Armed,
    Running,
}

/// Anything that carries a task's reminders: the authoritative [`Task`] in
/// the foreground, a mirrored [`ScheduleEntry`] in the worker.
pub trait ReminderHolder {
    fn task_id(&self) -> &str;

    fn task_title(&self) -> &str;

    fn reminders_mut(&mut self) -> &mut Vec<Reminder>;

    fn is_eligible(&self) -> bool {
        true
    }
}

impl ReminderHolder for Task {
    fn task_id(&self) -> &str {
        &self.id
    }

    fn task_title(&self) -> &str {
        &self.title
    }

    fn reminders_mut(&mut self) -> &mut Vec<Reminder> {
        &mut self.reminders
    }

    fn is_eligible(&self) -> bool {
        self.is_pending()
    }
}

impl ReminderHolder for ScheduleEntry {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn task_title(&self) -> &str {
        &self.task_title
    }

    fn reminders_mut(&mut self) -> &mut Vec<Reminder> {
        &mut self.reminders
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredReminder {
    pub task_id: String,
    pub task_title: String,
    pub reminder_id: String,
    pub summary: String,
}

#[derive(Debug)]
pub struct NotificationFailure {
    pub task_id: String,
    pub reminder_id: String,
    pub error: AppError,
}

#[derive(Debug, Default)]
pub struct TickReport {
    pub fired: Vec<FiredReminder>,
    pub failures: Vec<NotificationFailure>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty() && self.failures.is_empty()
    }
}

/// Dedupe key for one reminder instance.
pub fn notification_tag(task_id: &str, reminder_id: &str) -> String {
    format!("{task_id}:{reminder_id}")
}

/// One tick: evaluate every reminder of every eligible holder in list order,
/// notify for each due one and mark it fired in place.
///
/// A failed display is recorded but the reminder is still marked fired, so
/// the same minute is not retried on the next tick.
pub fn fire_due<H: ReminderHolder>(
    holders: &mut [H],
    now: OffsetDateTime,
    notifier: &dyn Notifier,
) -> TickReport {
    let mut report = TickReport::default();

    for holder in holders.iter_mut() {
        if !holder.is_eligible() {
            continue;
        }
        let task_id = holder.task_id().to_string();
        let task_title = holder.task_title().to_string();

        for reminder in holder.reminders_mut().iter_mut() {
            if !should_fire(reminder, now) {
                continue;
            }

            let reminder_id = reminder.id().to_string();
            let summary = format_reminder_in(reminder, now.offset());
            let notification = Notification {
                title: format!("Reminder: {task_title}"),
                body: summary.clone(),
                tag: notification_tag(&task_id, &reminder_id),
                action: Some(activation_argument(&task_id)),
            };

            if let Err(err) = notifier.show(&notification) {
                warn!(%task_id, %reminder_id, "cannot show reminder notification: {err}");
                report.failures.push(NotificationFailure {
                    task_id: task_id.clone(),
                    reminder_id: reminder_id.clone(),
                    error: err,
                });
            }

            reminder.mark_fired(now);
            info!(%task_id, %reminder_id, "reminder fired");
            report.fired.push(FiredReminder {
                task_id: task_id.clone(),
                task_title: task_title.clone(),
                reminder_id,
                summary,
            });
        }
    }

    debug!(fired = report.fired.len(), at = %now, "tick evaluated");
    report
}
