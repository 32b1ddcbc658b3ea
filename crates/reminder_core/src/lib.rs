pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod model;
pub mod notify;
pub mod schedule;
pub mod storage;
pub mod sync;
pub mod task_api;
