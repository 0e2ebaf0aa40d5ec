pub mod errors;

pub const DEFAULT_THUMBNAIL_QUALITY: u8 = 75;

pub const DEFAULT_FETCH_TIMEOUT: &str = "10s";

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const MAX_DELETE_ATTEMPTS: u64 = 3;

pub const RECORD_ENV_PREFIX: &str = "RECORD_";

use std::sync::LazyLock;

use tokio::runtime::{Builder, Runtime};

// Record worker runtime
// Every capture and prune loop runs here; blocking filesystem and image work is
// pushed onto its blocking pool.
pub static WORKER_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .thread_name("record-worker")
        .enable_all()
        .build()
        .expect("Failed to build record worker Tokio runtime")
});
