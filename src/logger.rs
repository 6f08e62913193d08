// FlowCompare — Structured logging via tracing

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Log level is controlled by the `FLOWCOMPARE_LOG` env var (default: `warn`,
/// since progress is printed to stdout). Logs go to stderr.
/// Examples:
///   FLOWCOMPARE_LOG=debug
///   FLOWCOMPARE_LOG=flowcompare::github=trace,info
pub fn init() {
    let filter =
        EnvFilter::try_from_env("FLOWCOMPARE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

/// Initialize logger for tests (does not panic if called multiple times).
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
