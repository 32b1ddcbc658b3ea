use crate::error::AppError;
use crate::storage::KeyValueStore;
use crate::sync::ScheduleEntry;
use serde_json::Value;
use tracing::warn;

pub const SCHEDULE_KEY: &str = "reminder_schedule";
pub const COUNT_KEY: &str = "incomplete_count";

/// Read the mirrored schedule. Missing, unreadable or corrupt values all
/// yield an empty schedule.
pub fn load_schedule(store: &dyn KeyValueStore) -> Vec<ScheduleEntry> {
    match store.get(SCHEDULE_KEY) {
        Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|err| {
            warn!("discarding corrupt reminder schedule mirror: {err}");
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!("cannot read reminder schedule mirror: {err}");
            Vec::new()
        }
    }
}

/// Replace the mirrored schedule wholesale.
pub fn save_schedule(store: &mut dyn KeyValueStore, schedule: &[ScheduleEntry]) -> Result<(), AppError> {
    store.put(SCHEDULE_KEY, serde_json::to_value(schedule)?)
}

pub fn load_count(store: &dyn KeyValueStore) -> u64 {
    match store.get(COUNT_KEY) {
        Ok(Some(value)) => value.as_u64().unwrap_or_else(|| {
            warn!("discarding non-numeric incomplete count: {value}");
            0
        }),
        Ok(None) => 0,
        Err(err) => {
            warn!("cannot read incomplete count: {err}");
            0
        }
    }
}

pub fn save_count(store: &mut dyn KeyValueStore, count: u64) -> Result<(), AppError> {
    store.put(COUNT_KEY, Value::from(count))
}
