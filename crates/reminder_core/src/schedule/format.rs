use crate::clock::local_offset;
use crate::model::{RecurrenceUnit, Reminder};
use time::UtcOffset;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const UNSCHEDULED: &str = "No date set";
const PICK_PROMPT: &str = "Pick a date & time";

/// Human-readable summary, e.g. `Every 2 days at 09:00` or `Jun 1 at 09:00`.
/// One-time reminders are rendered in the local offset.
pub fn format_reminder(reminder: &Reminder) -> String {
    format_reminder_in(reminder, local_offset())
}

/// Editor summary line: prompts for a date while a one-time reminder is
/// still blank, otherwise the same text as [`format_reminder`].
pub fn format_summary(reminder: &Reminder) -> String {
    format_summary_in(reminder, local_offset())
}

pub fn format_summary_in(reminder: &Reminder, offset: UtcOffset) -> String {
    match reminder {
        Reminder::Once(once) if once.datetime.is_none() => PICK_PROMPT.to_string(),
        _ => format_reminder_in(reminder, offset),
    }
}

pub fn format_reminder_in(reminder: &Reminder, offset: UtcOffset) -> String {
    let recurring = match reminder {
        Reminder::Once(once) => {
            let Some(datetime) = once.datetime else {
                return UNSCHEDULED.to_string();
            };
            let local = datetime.to_offset(offset);
            let month = local.month().to_string();
            return format!(
                "{} {} at {:02}:{:02}",
                &month[..3],
                local.day(),
                local.hour(),
                local.minute()
            );
        }
        Reminder::Recurring(recurring) => recurring,
    };

    let every = recurring.every.get();
    let unit = if every == 1 {
        recurring.unit.singular().to_string()
    } else {
        format!("{every} {}", recurring.unit)
    };

    if recurring.unit == RecurrenceUnit::Hours {
        return format!("Every {unit}");
    }

    let label = format!("Every {unit} at {}", recurring.time);
    if recurring.unit != RecurrenceUnit::Weeks {
        return label;
    }

    let mut days: Vec<u8> = recurring
        .days_of_week
        .iter()
        .flatten()
        .copied()
        .filter(|day| *day <= 6)
        .collect();
    if days.is_empty() {
        return label;
    }
    days.sort_unstable();
    days.dedup();

    let names: Vec<&str> = days.iter().map(|day| DAY_NAMES[*day as usize]).collect();
    format!("{label} ({})", names.join(", "))
}
