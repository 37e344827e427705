//! Tracing setup for the simulator binary: stderr output, `RUST_LOG`
//! controlled, no file rotation (there's no long-lived daemon here to
//! rotate logs for — just one run per process).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Install the global subscriber. Call once, at process start.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = Registry::default().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr),
    );

    subscriber
        .try_init()
        .expect("logging must be initialized exactly once");
}
