//! Shared tokio runtime for oracle calls.
//!
//! Oracle requests run on plain threads that block on this runtime, so the
//! Bevy schedule never waits on the network.

use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Runtime};

/// Global runtime for all oracle traffic.
pub static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("rain-oracle")
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime")
});
