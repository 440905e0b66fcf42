//! Scoped correlation ids.
//!
//! Inside an async scope the id is stored in a tokio task-local, so it travels
//! with the task across `.await` points and worker threads, and two tasks
//! interleaved on one thread each see their own id. Outside any async scope it
//! is stored in a thread-local slot.

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use tokio::task::futures::TaskLocalFuture;
use uuid::Uuid;

/// HTTP header carrying the correlation id between services.
pub const CORRELATION_ID_HEADER: &str = "Request-ID";

/// Storage type of the task-local slot.
pub type CorrelationSlot = RefCell<Option<String>>;

tokio::task_local! {
    static TASK_CORRELATION_ID: CorrelationSlot;
}

thread_local! {
    static THREAD_CORRELATION_ID: RefCell<Option<String>> = const { RefCell::new(None) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Task,
    Thread,
}

/// Restores the id that was current before the matching [`set`].
#[derive(Debug)]
#[must_use = "pass the token to `reset` to restore the previous id"]
pub struct CorrelationToken {
    slot: Slot,
    previous: Option<String>,
    // Bound to the thread whose slot it restores
    _not_send: PhantomData<*const ()>,
}

/// Returns the id of the innermost active scope, if any.
pub fn current() -> Option<String> {
    match TASK_CORRELATION_ID.try_with(|cell| cell.borrow().clone()) {
        Ok(id) => id,
        Err(_) => THREAD_CORRELATION_ID.with(|cell| cell.borrow().clone()),
    }
}

/// Makes `id` current and returns a token that undoes the change.
pub fn set(id: impl Into<String>) -> CorrelationToken {
    replace(Some(id.into()))
}

/// Clears the current id. The token restores the previous one.
pub fn clear() -> CorrelationToken {
    replace(None)
}

fn replace(next: Option<String>) -> CorrelationToken {
    if let Ok(previous) = TASK_CORRELATION_ID.try_with(|cell| cell.replace(next.clone())) {
        return CorrelationToken {
            slot: Slot::Task,
            previous,
            _not_send: PhantomData,
        };
    }
    let previous = THREAD_CORRELATION_ID.with(|cell| cell.replace(next));
    CorrelationToken {
        slot: Slot::Thread,
        previous,
        _not_send: PhantomData,
    }
}

/// Restores the id that was current when `token` was issued.
pub fn reset(token: CorrelationToken) {
    let CorrelationToken { slot, previous, .. } = token;
    match slot {
        // The task scope is gone when a future is dropped outside of a poll;
        // its slot went with it, so there is nothing to restore.
        Slot::Task => {
            let _ = TASK_CORRELATION_ID.try_with(|cell| cell.replace(previous));
        }
        Slot::Thread => {
            THREAD_CORRELATION_ID.with(|cell| cell.replace(previous));
        }
    }
}

/// RAII scope: the id is current until the guard drops, including when the
/// scope is left by `?` or a panic.
///
/// Outside an async scope the id lives in a thread-local slot, which every
/// task polled on the same thread shares. The guard is therefore `!Send`, and
/// a spawned task cannot hold it across an `.await`:
///
/// ```compile_fail
/// async fn handler() {
///     let _guard = rask_log_pipeline::correlation::enter("req-1");
///     tokio::task::yield_now().await;
/// }
/// tokio::spawn(handler());
/// ```
///
/// Async code sets its id with [`scope`] or
/// [`CorrelationExt::with_correlation_id`]; inside those a guard only
/// touches the task's own slot.
#[derive(Debug)]
#[must_use = "the id is reset as soon as the guard is dropped"]
pub struct CorrelationGuard {
    token: Option<CorrelationToken>,
}

impl Drop for CorrelationGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            reset(token);
        }
    }
}

pub fn enter(id: impl Into<String>) -> CorrelationGuard {
    CorrelationGuard {
        token: Some(set(id)),
    }
}

/// Runs `f` with `id` as the current correlation id.
pub fn in_scope<R>(id: impl Into<String>, f: impl FnOnce() -> R) -> R {
    let _guard = enter(id);
    f()
}

/// Runs `future` with `id` as its correlation id for its whole lifetime.
pub async fn scope<F: Future>(id: impl Into<String>, future: F) -> F::Output {
    TASK_CORRELATION_ID
        .scope(RefCell::new(Some(id.into())), future)
        .await
}

/// Wraps a future about to be spawned so it inherits the caller's id.
pub fn propagate<F: Future>(future: F) -> TaskLocalFuture<CorrelationSlot, F> {
    TASK_CORRELATION_ID.scope(RefCell::new(current()), future)
}

pub trait CorrelationExt: Future + Sized {
    /// Attaches a correlation id to this future.
    fn with_correlation_id(self, id: impl Into<String>) -> TaskLocalFuture<CorrelationSlot, Self> {
        TASK_CORRELATION_ID.scope(RefCell::new(Some(id.into())), self)
    }
}

impl<F: Future> CorrelationExt for F {}

/// A fresh random id (UUID v4) for a new unit of work.
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
