//! Log output: ndjson through `tracing`, plus direct JSON lines for responses and reports.

use serde::Serialize;
use std::io::Write;
use std::sync::Once;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// One audit line written outside `tracing` (e.g. a training report).
#[derive(Serialize)]
pub struct LogEvent<'a> {
    pub ts: String,
    pub level: &'a str,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

static INIT: Once = Once::new();

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber once; level from RUST_LOG or `default_level`.
    /// Logs go to stderr so stdout stays free for JSON responses.
    pub fn init(json: bool, default_level: &str) {
        INIT.call_once(|| {
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
            let result = if json {
                let fmt = tracing_subscriber::fmt::layer()
                    .json()
                    .with_span_events(FmtSpan::NONE)
                    .with_writer(std::io::stderr);
                tracing_subscriber::registry().with(filter).with(fmt).try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                    .try_init()
            };
            if let Err(e) = result {
                eprintln!("tracing subscriber already installed: {e}");
            }
        });
    }

    /// Write one serializable record as a single JSON line.
    pub fn emit_json(event: &impl Serialize, w: &mut impl Write) -> std::io::Result<()> {
        let line = serde_json::to_string(event).map_err(std::io::Error::other)?;
        writeln!(w, "{}", line)
    }
}
