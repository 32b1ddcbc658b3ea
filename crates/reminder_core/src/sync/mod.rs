//! One-way channel from the foreground (which owns the task store) to the
//! background worker (which only ever sees what it is sent).

mod mirror;

pub use mirror::{COUNT_KEY, SCHEDULE_KEY, load_count, load_schedule, save_count, save_schedule};

use crate::model::{Reminder, Task};
use serde::{Deserialize, Serialize};

/// Projection of a pending task's reminders, as mirrored by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub task_id: String,
    pub task_title: String,
    pub reminders: Vec<Reminder>,
    pub created_at: String,
}

/// Messages accepted by the background worker. The set is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    StartTimer { count: u64 },
    StopTimer,
    UpdateCount { count: u64 },
    SyncReminders { schedule: Vec<ScheduleEntry> },
}

impl WorkerMessage {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::StartTimer { .. } => "START_TIMER",
            Self::StopTimer => "STOP_TIMER",
            Self::UpdateCount { .. } => "UPDATE_COUNT",
            Self::SyncReminders { .. } => "SYNC_REMINDERS",
        }
    }
}

/// Pending tasks with at least one reminder, in task order.
pub fn build_schedule(tasks: &[Task]) -> Vec<ScheduleEntry> {
    tasks
        .iter()
        .filter(|task| task.is_pending() && !task.reminders.is_empty())
        .map(|task| ScheduleEntry {
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            reminders: task.reminders.clone(),
            created_at: task.created_at.clone(),
        })
        .collect()
}

pub fn incomplete_count(tasks: &[Task]) -> u64 {
    tasks.iter().filter(|task| task.is_pending()).count() as u64
}

#[cfg(test)]
mod tests {
    use super::{WorkerMessage, build_schedule, incomplete_count};
    use crate::model::{Reminder, Task, TaskStatus};

    fn task(id: &str, status: TaskStatus, reminders: Vec<Reminder>) -> Task {
        Task {
            id: id.to_string(),
            title: format!("title {id}"),
            description: String::new(),
            status,
            created_at: "2024-06-01T00:00:00Z".to_string(),
            completed_at: None,
            reminders,
        }
    }

    #[test]
    fn schedule_keeps_pending_tasks_with_reminders() {
        let tasks = vec![
            task("task-1", TaskStatus::Pending, vec![Reminder::recurring()]),
            task("task-2", TaskStatus::Pending, Vec::new()),
            task("task-3", TaskStatus::Completed, vec![Reminder::one_time()]),
            task("task-4", TaskStatus::Pending, vec![Reminder::one_time()]),
        ];

        let schedule = build_schedule(&tasks);
        let ids: Vec<&str> = schedule.iter().map(|entry| entry.task_id.as_str()).collect();

        assert_eq!(ids, vec!["task-1", "task-4"]);
        assert_eq!(schedule[0].task_title, "title task-1");
        assert_eq!(schedule[0].reminders, tasks[0].reminders);
        assert_eq!(incomplete_count(&tasks), 3);
    }

    #[test]
    fn messages_use_screaming_tags_on_the_wire() {
        let value = serde_json::to_value(WorkerMessage::StartTimer { count: 2 }).unwrap();
        assert_eq!(value, serde_json::json!({ "type": "START_TIMER", "count": 2 }));

        let stop: WorkerMessage =
            serde_json::from_value(serde_json::json!({ "type": "STOP_TIMER" })).unwrap();
        assert_eq!(stop, WorkerMessage::StopTimer);
        assert_eq!(stop.tag(), "STOP_TIMER");

        let sync: WorkerMessage = serde_json::from_value(serde_json::json!({
            "type": "SYNC_REMINDERS",
            "schedule": []
        }))
        .unwrap();
        assert_eq!(sync, WorkerMessage::SyncReminders { schedule: Vec::new() });
    }

    #[test]
    fn unknown_message_tags_are_rejected() {
        let parsed = serde_json::from_value::<WorkerMessage>(serde_json::json!({
            "type": "RESET_EVERYTHING"
        }));
        assert!(parsed.is_err());
    }
}
