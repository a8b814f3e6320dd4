// src/engine/pool.rs
//
// Global thread pool for batch compositing.
//
// One pool for the whole process, built lazily on first use. Thread count
// follows available_parallelism() (which respects cgroup CPU quota). Under
// the Node binding, UV_THREADPOOL_SIZE threads are left free for libuv so
// the AsyncTask workers are not starved.

use rayon::ThreadPool;
use std::sync::OnceLock;

/// Default libuv thread pool size (Node.js default)
#[cfg(feature = "napi")]
const DEFAULT_LIBUV_THREADPOOL_SIZE: usize = 4;

const MIN_RAYON_THREADS: usize = 1;

static GLOBAL_THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// Shared batch pool, or `None` if no pool could be built (callers then use
/// rayon's implicit global pool).
pub fn get_pool() -> Option<&'static ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let num_threads = worker_threads();
            match rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("compositor-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    tracing::warn!(
                        target: "studio_compositor::pool",
                        num_threads,
                        error = %e,
                        "failed to build batch thread pool"
                    );
                    None
                }
            }
        })
        .as_ref()
}

/// Threads the batch pool runs with.
pub fn worker_threads() -> usize {
    let detected = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(MIN_RAYON_THREADS);
    detected
        .saturating_sub(reserved_libuv_threads())
        .max(MIN_RAYON_THREADS)
}

#[cfg(feature = "napi")]
fn reserved_libuv_threads() -> usize {
    std::env::var("UV_THREADPOOL_SIZE")
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(DEFAULT_LIBUV_THREADPOOL_SIZE)
}

#[cfg(not(feature = "napi"))]
fn reserved_libuv_threads() -> usize {
    0
}
