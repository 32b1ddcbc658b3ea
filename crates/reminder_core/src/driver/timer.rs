use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

pub const TICK_PERIOD: Duration = Duration::from_secs(60);

/// Time left until the next wall-clock minute boundary. Exactly on a
/// boundary this is a full minute.
pub fn delay_until_next_minute(now: OffsetDateTime) -> Duration {
    let into_minute =
        Duration::from_secs(u64::from(now.second())) + Duration::from_nanos(u64::from(now.nanosecond()));
    TICK_PERIOD.saturating_sub(into_minute)
}

/// The single outstanding wake handle of one execution context.
///
/// Arming spawns one task that waits out the initial delay, emits a tick,
/// then emits one tick per [`TICK_PERIOD`]. Disarming aborts that task, which
/// covers both the pending first wait and the repeating phase. Re-arming
/// always disarms first, so there is never more than one tick source.
///
/// Every tick carries the generation it was armed under. An aborted task
/// that was mid-poll on another worker thread can still deliver one tick
/// after disarm; [`MinuteTimer::next_tick`] drops it as stale.
pub struct MinuteTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
    tick_tx: mpsc::Sender<u64>,
    tick_rx: mpsc::Receiver<u64>,
}

impl MinuteTimer {
    pub fn new() -> Self {
        let (tick_tx, tick_rx) = mpsc::channel(1);
        Self {
            handle: None,
            generation: 0,
            tick_tx,
            tick_rx,
        }
    }

    pub fn arm(&mut self, first_delay: Duration) {
        self.disarm();
        let ticks = self.tick_tx.clone();
        let generation = self.generation;
        debug!(delay_ms = first_delay.as_millis() as u64, generation, "arming minute timer");

        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(first_delay).await;
            if !emit(&ticks, generation) {
                return;
            }

            let mut interval = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            // A suspended host should resume with one tick, not a burst.
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !emit(&ticks, generation) {
                    return;
                }
            }
        }));
    }

    pub fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("minute timer disarmed");
        }
        self.generation = self.generation.wrapping_add(1);
        while self.tick_rx.try_recv().is_ok() {}
    }

    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Resolves on the next tick of the current arming. Never resolves
    /// while disarmed.
    pub async fn next_tick(&mut self) {
        loop {
            match self.tick_rx.recv().await {
                Some(generation) if generation == self.generation => return,
                Some(stale) => debug!(stale, "dropping tick from a previous arming"),
                None => std::future::pending::<()>().await,
            }
        }
    }
}

impl Default for MinuteTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MinuteTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// A tick still waiting to be consumed absorbs the new one, so a slow tick
/// body is never re-entered.
fn emit(ticks: &mpsc::Sender<u64>, generation: u64) -> bool {
    match ticks.try_send(generation) {
        Ok(()) | Err(TrySendError::Full(_)) => true,
        Err(TrySendError::Closed(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{MinuteTimer, delay_until_next_minute};
    use std::time::Duration;
    use time::macros::datetime;
    use tokio::time::{Instant, timeout};

    #[test]
    fn delay_aligns_to_the_next_minute() {
        assert_eq!(
            delay_until_next_minute(datetime!(2024-06-01 09:00:45 UTC)),
            Duration::from_secs(15)
        );
        assert_eq!(
            delay_until_next_minute(datetime!(2024-06-01 09:00:59.250 UTC)),
            Duration::from_millis(750)
        );
        assert_eq!(
            delay_until_next_minute(datetime!(2024-06-01 09:00:00 UTC)),
            Duration::from_secs(60)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_after_the_first_delay_then_every_minute() {
        let mut timer = MinuteTimer::new();
        let start = Instant::now();
        timer.arm(Duration::from_secs(20));
        assert!(timer.is_armed());

        timer.next_tick().await;
        assert_eq!(start.elapsed().as_secs(), 20);

        timer.next_tick().await;
        assert_eq!(start.elapsed().as_secs(), 80);

        timer.next_tick().await;
        assert_eq!(start.elapsed().as_secs(), 140);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_previous_schedule() {
        let mut timer = MinuteTimer::new();
        let start = Instant::now();
        timer.arm(Duration::from_secs(10));
        timer.arm(Duration::from_secs(30));

        timer.next_tick().await;
        assert_eq!(start.elapsed().as_secs(), 30);

        timer.next_tick().await;
        assert_eq!(start.elapsed().as_secs(), 90);
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_stops_both_phases() {
        let mut timer = MinuteTimer::new();
        timer.arm(Duration::from_secs(10));
        timer.disarm();
        assert!(!timer.is_armed());
        assert!(timeout(Duration::from_secs(300), timer.next_tick()).await.is_err());

        timer.arm(Duration::from_secs(5));
        timer.next_tick().await;
        timer.disarm();
        assert!(timeout(Duration::from_secs(300), timer.next_tick()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn tick_delivered_after_disarm_is_ignored() {
        let mut timer = MinuteTimer::new();
        timer.arm(Duration::from_secs(10));
        let armed_generation = timer.generation;
        timer.disarm();

        // A source from the previous arming that slipped one send past abort.
        timer.tick_tx.try_send(armed_generation).unwrap();
        assert!(timeout(Duration::from_secs(300), timer.next_tick()).await.is_err());

        timer.arm(Duration::from_secs(5));
        let start = Instant::now();
        timer.next_tick().await;
        assert_eq!(start.elapsed().as_secs(), 5);
    }
}
