mod format;

pub use format::{LogEvent, StructuredLogger};
