//! Bridges the async object store driver into the blocking filesystem interface.
//!
//! Every request is spawned on one process-wide I/O runtime and the calling thread
//! blocks on the join handle. The caller never enters that runtime, so blocking calls
//! are safe from plain threads and from other runtimes' blocking pools alike.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Runtime};

use crate::error::{StoreError, StoreResult};

const IO_WORKER_THREADS: usize = 4;

static IO_RUNTIME: OnceLock<std::io::Result<Runtime>> = OnceLock::new();

fn io_runtime() -> StoreResult<&'static Runtime> {
    let runtime = IO_RUNTIME.get_or_init(|| {
        Builder::new_multi_thread()
            .worker_threads(IO_WORKER_THREADS)
            .thread_name("objfs-io")
            .enable_all()
            .build()
    });
    match runtime {
        Ok(rt) => Ok(rt),
        Err(e) => Err(StoreError::Runtime(format!("failed to start I/O runtime: {e}"))),
    }
}

/// Run `fut` on the I/O runtime and wait for it.
pub(crate) fn block_on<F, T>(fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = io_runtime()?.spawn(fut);
    futures::executor::block_on(handle).map_err(|e| StoreError::Runtime(e.to_string()))?
}
