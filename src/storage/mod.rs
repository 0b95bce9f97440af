//! Local SQLite store for training runs and their held-out metrics.

mod runs;

pub use runs::{RunRecord, RunStore};
