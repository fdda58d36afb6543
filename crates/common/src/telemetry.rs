//! Logging setup shared by the binaries

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `target` logs at `level` and the other
/// workspace crates at `info`.
pub fn init_tracing(target: &str, level: &str) {
    let default_filter = format!(
        "{}={},switchboard_common=info,switchboard_proto=info",
        target, level
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
