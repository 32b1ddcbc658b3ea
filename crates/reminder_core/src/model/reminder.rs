use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;

static REMINDER_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A reminder attached to a task.
///
/// Serialized with a `type` tag of `once` or `recurring`. Switching between
/// the two kinds always goes through [`Reminder::switch_kind`], which keeps
/// only the id, so a reminder never carries fields from both variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reminder {
    Once(OneTimeReminder),
    Recurring(RecurringReminder),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    Once,
    Recurring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeReminder {
    pub id: String,
    /// `None` until a date has been picked. Stored as a blank string.
    #[serde(default, with = "blank_rfc3339")]
    pub datetime: Option<OffsetDateTime>,
    #[serde(default)]
    pub fired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringReminder {
    pub id: String,
    pub unit: RecurrenceUnit,
    pub every: NonZeroU32,
    /// Local time of day. Ignored for [`RecurrenceUnit::Hours`].
    #[serde(default)]
    pub time: TimeOfDay,
    /// Weekday indices, 0 = Sunday. Only consulted for weekly reminders.
    #[serde(
        default,
        deserialize_with = "deserialize_days",
        skip_serializing_if = "Option::is_none"
    )]
    pub days_of_week: Option<Vec<u8>>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_fired: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    Hours,
    Days,
    Weeks,
}

impl RecurrenceUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            Self::Hours => "hour",
            Self::Days => "day",
            Self::Weeks => "week",
        }
    }
}

impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceUnit {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hour" | "hours" | "h" => Ok(Self::Hours),
            "day" | "days" | "d" => Ok(Self::Days),
            "week" | "weeks" | "w" => Ok(Self::Weeks),
            other => Err(format!("unknown unit '{other}' (expected hours, days or weeks)")),
        }
    }
}

/// `HH:mm` wall-clock time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self { hour: 9, minute: 0 }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let (hour, minute) = trimmed
            .split_once(':')
            .ok_or_else(|| format!("time '{trimmed}' must be HH:mm"))?;
        let hour: u8 = hour
            .parse()
            .map_err(|_| format!("time '{trimmed}' has an invalid hour"))?;
        let minute: u8 = minute
            .parse()
            .map_err(|_| format!("time '{trimmed}' has an invalid minute"))?;
        TimeOfDay::new(hour, minute).ok_or_else(|| format!("time '{trimmed}' is out of range"))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn deserialize_days<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
    let days = Option::<Vec<u8>>::deserialize(deserializer)?;
    if let Some(day) = days.iter().flatten().find(|day| **day > 6) {
        return Err(serde::de::Error::custom(format!(
            "day of week {day} is out of range 0..=6"
        )));
    }
    Ok(days)
}

mod blank_rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(datetime) => {
                let formatted = datetime
                    .format(&Rfc3339)
                    .map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&formatted)
            }
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => OffsetDateTime::parse(value, &Rfc3339)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

pub fn new_reminder_id() -> String {
    let seq = REMINDER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "rem-{}-{seq}",
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    )
}

impl Reminder {
    /// Blank one-time reminder: no date picked, not fired.
    pub fn one_time() -> Self {
        Self::one_time_with_id(new_reminder_id())
    }

    /// Every day at 09:00, never fired.
    pub fn recurring() -> Self {
        Self::recurring_with_id(new_reminder_id())
    }

    fn one_time_with_id(id: String) -> Self {
        Self::Once(OneTimeReminder {
            id,
            datetime: None,
            fired: false,
        })
    }

    fn recurring_with_id(id: String) -> Self {
        Self::Recurring(RecurringReminder {
            id,
            unit: RecurrenceUnit::Days,
            every: NonZeroU32::MIN,
            time: TimeOfDay::default(),
            days_of_week: None,
            last_fired: None,
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Once(reminder) => &reminder.id,
            Self::Recurring(reminder) => &reminder.id,
        }
    }

    pub fn kind(&self) -> ReminderKind {
        match self {
            Self::Once(_) => ReminderKind::Once,
            Self::Recurring(_) => ReminderKind::Recurring,
        }
    }

    /// Reinitialize to the default of `kind`, keeping only the id.
    pub fn switch_kind(&mut self, kind: ReminderKind) {
        let id = self.id().to_string();
        *self = match kind {
            ReminderKind::Once => Self::one_time_with_id(id),
            ReminderKind::Recurring => Self::recurring_with_id(id),
        };
    }

    /// Apply the side effect of a fire event.
    pub fn mark_fired(&mut self, now: OffsetDateTime) {
        match self {
            Self::Once(reminder) => reminder.fired = true,
            Self::Recurring(reminder) => reminder.last_fired = Some(now),
        }
    }
}

impl RecurringReminder {
    pub fn set_every(&mut self, every: u32) {
        self.every = NonZeroU32::new(every).unwrap_or(NonZeroU32::MIN);
    }

    pub fn set_unit(&mut self, unit: RecurrenceUnit) {
        if unit == RecurrenceUnit::Weeks && self.days_of_week.is_none() {
            self.days_of_week = Some(Vec::new());
        }
        self.unit = unit;
    }

    pub fn toggle_day(&mut self, day: u8) {
        if day > 6 {
            return;
        }
        let days = self.days_of_week.get_or_insert_with(Vec::new);
        if days.contains(&day) {
            days.retain(|existing| *existing != day);
        } else {
            days.push(day);
        }
    }
}

/// Parse a weekday name (`mon`, `Monday`) or index (`1`) into 0 = Sunday.
pub fn parse_weekday(raw: &str) -> Option<u8> {
    let cleaned = raw.trim().to_ascii_lowercase();
    if let Ok(index) = cleaned.parse::<u8>() {
        return (index <= 6).then_some(index);
    }
    const NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
    NAMES
        .iter()
        .position(|name| cleaned.len() >= 3 && cleaned.starts_with(name))
        .map(|index| index as u8)
}
