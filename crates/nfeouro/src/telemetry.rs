#![forbid(unsafe_code)]

//! Log output for the command-line front end.
//!
//! Events go to stderr so that signed documents and request descriptors
//! written to stdout stay machine readable. `RUST_LOG` overrides the
//! default `info` level.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

static INIT: OnceLock<()> = OnceLock::new();

pub fn init_tracing() {
    init_with_default("info");
}

/// Install the subscriber once; later calls are no-ops.
pub fn init_with_default(default_filter: &str) {
    let _ = INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .with(env_filter)
            .try_init();
    });
}
