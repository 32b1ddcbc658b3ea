use crate::clock::Clock;
use crate::driver::{DriverState, MinuteTimer, TickReport, delay_until_next_minute};
use crate::error::AppError;
use crate::model::Task;
use crate::notify::Notifier;
use crate::storage::json_store;
use crate::sync::{ScheduleEntry, WorkerMessage, build_schedule, incomplete_count};
use crate::task_api;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The foreground execution context: fires from the authoritative task
/// store, writes fired state back to it, and pushes the schedule to the
/// worker whenever the task list changes.
pub struct Foreground {
    store_path: PathBuf,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    worker: Option<mpsc::Sender<WorkerMessage>>,
    synced: Option<(u64, Vec<ScheduleEntry>)>,
    permission: bool,
    timer: MinuteTimer,
    state: DriverState,
}

impl Foreground {
    pub fn new(store_path: PathBuf, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store_path,
            notifier,
            clock,
            worker: None,
            synced: None,
            permission: true,
            timer: MinuteTimer::new(),
            state: DriverState::Idle,
        }
    }

    pub fn with_worker(mut self, worker: mpsc::Sender<WorkerMessage>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Without notification permission nothing is armed, synced or fired.
    pub fn with_permission(mut self, granted: bool) -> Self {
        self.permission = granted;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Arm the timer and start the worker with a fresh schedule.
    pub async fn enable(&mut self) -> Result<(), AppError> {
        if !self.permission {
            info!("notification permission not granted, reminders stay idle");
            return Ok(());
        }
        let tasks = json_store::load_tasks(&self.store_path)?;
        self.send(WorkerMessage::StartTimer {
            count: incomplete_count(&tasks),
        })
        .await;
        self.synced = None;
        self.sync(&tasks).await;

        self.timer.arm(delay_until_next_minute(self.clock.now()));
        self.state = DriverState::Armed;
        info!(store = %self.store_path.display(), "foreground reminders enabled");
        Ok(())
    }

    /// Cancel every pending wake here and ask the worker to stop its own.
    pub async fn disable(&mut self) {
        self.timer.disarm();
        self.state = DriverState::Idle;
        self.send(WorkerMessage::StopTimer).await;
        info!("foreground reminders disabled");
    }

    pub async fn tick(&mut self) -> Result<TickReport, AppError> {
        if !self.permission {
            return Ok(TickReport::default());
        }
        self.state = DriverState::Running;
        let now = self.clock.now();
        let result = task_api::fire_and_persist(&self.store_path, self.notifier.as_ref(), now);
        self.state = if self.timer.is_armed() {
            DriverState::Armed
        } else {
            DriverState::Idle
        };

        let (tasks, report) = result?;
        self.sync(&tasks).await;
        Ok(report)
    }

    /// Push count and schedule to the worker if they differ from what it was
    /// last sent.
    pub async fn sync(&mut self, tasks: &[Task]) {
        if !self.permission {
            return;
        }
        let count = incomplete_count(tasks);
        let schedule = build_schedule(tasks);
        if let Some((synced_count, synced_schedule)) = &self.synced
            && *synced_count == count
            && *synced_schedule == schedule
        {
            return;
        }

        debug!(count, entries = schedule.len(), "syncing reminder schedule");
        self.send(WorkerMessage::UpdateCount { count }).await;
        self.send(WorkerMessage::SyncReminders {
            schedule: schedule.clone(),
        })
        .await;
        self.synced = Some((count, schedule));
    }

    /// Run until `shutdown` resolves, then disable.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        self.enable().await?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.timer.next_tick() => {
                    match self.tick().await {
                        Ok(report) => {
                            for fired in &report.fired {
                                info!(task = %fired.task_title, "{}", fired.summary);
                            }
                        }
                        Err(err) => warn!("foreground tick failed: {err}"),
                    }
                }
            }
        }

        self.disable().await;
        Ok(())
    }

    async fn send(&mut self, message: WorkerMessage) {
        let Some(worker) = self.worker.as_ref() else {
            return;
        };
        let tag = message.tag();
        if worker.send(message).await.is_err() {
            warn!("worker channel closed, dropping {tag} and further syncs");
            self.worker = None;
        }
    }
}
