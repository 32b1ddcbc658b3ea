pub mod json_store;
pub mod kv;

pub use kv::{JsonFileKvStore, KeyValueStore, MemoryKvStore};
