//! Reminder recurrence rules: when a reminder is due, when it will next be
//! due, and how to describe it.
//!
//! Nothing in here reads the clock or touches storage. Both the foreground
//! loop and the background worker call these functions with their own `now`
//! and must reach the same verdict for the same reminder state.

mod evaluator;
mod format;

pub use evaluator::{next_fire_time, should_fire};
pub use format::{format_reminder, format_reminder_in, format_summary, format_summary_in};
