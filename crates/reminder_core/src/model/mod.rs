mod reminder;
mod task;

pub use reminder::{
    OneTimeReminder, RecurrenceUnit, RecurringReminder, Reminder, ReminderKind, TimeOfDay,
    new_reminder_id, parse_weekday,
};
pub use task::{Task, TaskStatus};
