//! Microtask Scheduler - the host's schedule-and-await primitive.
//!
//! A thread-local `LocalPool` stands in for the host microtask queue. Update
//! cycles are spawned here; nothing runs until the queue is drained with
//! [`run_microtasks`] or a future is driven to completion with [`block_on`].
//!
//! ```ignore
//! element.set("count", 5);
//! assert!(!element.host().has_attribute("count"));
//! run_microtasks();
//! assert_eq!(element.host().get_attribute("count"), Some("5".into()));
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;

// =============================================================================
// Queue State
// =============================================================================

struct MicrotaskQueue {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

thread_local! {
    static QUEUE: MicrotaskQueue = {
        let pool = LocalPool::new();
        let spawner = pool.spawner();
        MicrotaskQueue { pool: RefCell::new(pool), spawner }
    };
}

// =============================================================================
// Public API
// =============================================================================

/// Queue a task. It runs the next time the queue is drained.
pub fn spawn_local(task: impl Future<Output = ()> + 'static) {
    QUEUE.with(|queue| {
        if let Err(err) = queue.spawner.spawn_local(task) {
            tracing::warn!(%err, "failed to queue microtask");
        }
    });
}

/// Run queued tasks until none can make progress.
///
/// Calling this from inside a running task is a no-op.
pub fn run_microtasks() {
    QUEUE.with(|queue| match queue.pool.try_borrow_mut() {
        Ok(mut pool) => pool.run_until_stalled(),
        Err(_) => tracing::warn!("run_microtasks called from inside a microtask"),
    });
}

/// Drive `future` to completion, running queued tasks alongside it.
pub fn block_on<F: Future>(future: F) -> F::Output {
    QUEUE.with(|queue| match queue.pool.try_borrow_mut() {
        Ok(mut pool) => pool.run_until(future),
        Err(_) => {
            tracing::warn!("block_on called from inside a microtask");
            futures::executor::block_on(future)
        }
    })
}

/// Suspend the current task until the next turn of the queue.
pub fn next_microtask() -> impl Future<Output = ()> {
    YieldNow { yielded: false }
}

struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
