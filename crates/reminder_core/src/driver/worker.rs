use crate::clock::Clock;
use crate::driver::{DriverState, MinuteTimer, TickReport, delay_until_next_minute, fire_due};
use crate::notify::{Notification, Notifier};
use crate::storage::KeyValueStore;
use crate::sync::{WorkerMessage, load_count, load_schedule, save_count, save_schedule};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const WORKER_QUEUE_DEPTH: usize = 16;
const LEGACY_TITLE: &str = "Task Reminder";
const LEGACY_TAG: &str = "task-reminder";

/// The background execution context.
///
/// It never sees the task store: everything it fires comes from the mirror
/// the foreground syncs into its own key-value store. Fired state is written
/// to that mirror only, and the next sync from the foreground replaces it
/// with authoritative state.
pub struct Worker<S> {
    store: S,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    legacy_fallback: bool,
    timer: MinuteTimer,
    state: DriverState,
}

impl<S: KeyValueStore + 'static> Worker<S> {
    pub fn new(store: S, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifier,
            clock,
            legacy_fallback: true,
            timer: MinuteTimer::new(),
            state: DriverState::Idle,
        }
    }

    /// Whether an empty mirror falls back to the generic pending-count
    /// notification.
    pub fn with_legacy_fallback(mut self, enabled: bool) -> Self {
        self.legacy_fallback = enabled;
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn handle(&mut self, message: WorkerMessage) {
        debug!(tag = message.tag(), "worker message");
        match message {
            WorkerMessage::StartTimer { count } => {
                self.persist_count(count);
                self.timer.arm(delay_until_next_minute(self.clock.now()));
                self.state = DriverState::Armed;
                info!("worker timer armed");
            }
            WorkerMessage::StopTimer => {
                self.timer.disarm();
                self.state = DriverState::Idle;
                info!("worker timer stopped");
            }
            WorkerMessage::UpdateCount { count } => self.persist_count(count),
            WorkerMessage::SyncReminders { schedule } => {
                if let Err(err) = save_schedule(&mut self.store, &schedule) {
                    warn!("cannot persist reminder schedule mirror: {err}");
                }
            }
        }
    }

    pub fn tick(&mut self) -> TickReport {
        self.state = DriverState::Running;
        let report = self.tick_inner();
        self.state = if self.timer.is_armed() {
            DriverState::Armed
        } else {
            DriverState::Idle
        };
        report
    }

    fn tick_inner(&mut self) -> TickReport {
        let now = self.clock.now();
        let mut schedule = load_schedule(&self.store);

        if schedule.is_empty() {
            self.legacy_notification();
            return TickReport::default();
        }

        let report = fire_due(&mut schedule, now, self.notifier.as_ref());
        if !report.fired.is_empty()
            && let Err(err) = save_schedule(&mut self.store, &schedule)
        {
            warn!("cannot persist fired state to mirror: {err}");
        }
        report
    }

    fn legacy_notification(&self) {
        if !self.legacy_fallback {
            return;
        }
        let count = load_count(&self.store);
        if count == 0 {
            return;
        }

        let plural = if count == 1 { "" } else { "s" };
        let notification = Notification {
            title: LEGACY_TITLE.to_string(),
            body: format!("You have {count} task{plural} to do!"),
            tag: LEGACY_TAG.to_string(),
            action: None,
        };
        if let Err(err) = self.notifier.show(&notification) {
            warn!("cannot show pending-count notification: {err}");
        }
    }

    fn persist_count(&mut self, count: u64) {
        if let Err(err) = save_count(&mut self.store, count) {
            warn!("cannot persist incomplete count: {err}");
        }
    }

    /// Serve messages and ticks until every sender is dropped.
    pub async fn run(mut self, mut messages: mpsc::Receiver<WorkerMessage>) {
        loop {
            tokio::select! {
                message = messages.recv() => match message {
                    Some(message) => self.handle(message),
                    None => break,
                },
                _ = self.timer.next_tick() => {
                    self.tick();
                }
            }
        }

        self.timer.disarm();
        self.state = DriverState::Idle;
        debug!("worker stopped");
    }
}

pub fn spawn_worker<S: KeyValueStore + 'static>(
    worker: Worker<S>,
) -> (mpsc::Sender<WorkerMessage>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(WORKER_QUEUE_DEPTH);
    let handle = tokio::spawn(worker.run(rx));
    (tx, handle)
}
