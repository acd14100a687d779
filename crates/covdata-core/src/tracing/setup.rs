//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Initialize logging for processes embedding covdata.
///
/// Reads the `COVDATA_LOG` environment variable as an `EnvFilter` directive,
/// e.g. `COVDATA_LOG=covdata=debug` or `COVDATA_LOG=covdata::debug=trace`.
/// Falls back to `covdata=info` if unset or invalid.
///
/// Safe to call more than once. A subscriber installed elsewhere wins.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env("COVDATA_LOG")
            .unwrap_or_else(|_| EnvFilter::new("covdata=info"));

        let _ = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init();
    });
}
