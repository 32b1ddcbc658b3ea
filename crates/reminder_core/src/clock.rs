use time::{OffsetDateTime, UtcOffset};

/// Source of the current wall-clock instant for a firing loop.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Local wall clock. The offset is re-read on every call so a changed
/// system zone is picked up at the next tick; when the platform refuses to
/// report it (multi-threaded processes on some unixes) the offset captured
/// at construction is used instead.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    fallback: UtcOffset,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            fallback: local_offset(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        let offset = UtcOffset::current_local_offset().unwrap_or(self.fallback);
        OffsetDateTime::now_utc().to_offset(offset)
    }
}

/// Fixed instant, for tests and one-shot evaluation.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(local_offset())
}
