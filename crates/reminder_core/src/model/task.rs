use crate::model::Reminder;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub created_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    /// Display order, not firing priority.
    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn reminder(&self, reminder_id: &str) -> Option<&Reminder> {
        self.reminders
            .iter()
            .find(|reminder| reminder.id() == reminder_id)
    }

    /// Patch exactly one reminder's fired state. Returns `false` when the
    /// reminder is not on this task.
    pub fn mark_reminder_fired(&mut self, reminder_id: &str, now: OffsetDateTime) -> bool {
        match self
            .reminders
            .iter_mut()
            .find(|reminder| reminder.id() == reminder_id)
        {
            Some(reminder) => {
                reminder.mark_fired(now);
                true
            }
            None => false,
        }
    }
}
