use once_cell::sync::OnceCell;
use std::thread::{self, ThreadId};

static MAIN_THREAD: OnceCell<ThreadId> = OnceCell::new();

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Main thread already marked")]
    AlreadyMarked,
}

/// Tells whether the current thread is the distinguished context the foreign
/// runtime may need to call back into.
pub trait MainContext: Send + Sync {
    fn is_current(&self) -> bool;
}

/// For hosts without a notion of a main thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMainContext;

impl MainContext for NoMainContext {
    fn is_current(&self) -> bool {
        false
    }
}

/// A specific thread acting as the main context.
#[derive(Debug, Clone, Copy)]
pub struct MainThread {
    id: ThreadId,
}

impl MainThread {
    /// Treats the calling thread as the main context.
    pub fn current() -> Self {
        Self {
            id: thread::current().id(),
        }
    }

    pub fn with_id(id: ThreadId) -> Self {
        Self { id }
    }
}

impl MainContext for MainThread {
    fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }
}

/// Record the calling thread as the process-wide main thread (call once at startup)
pub fn mark_main_thread() -> Result<(), ContextError> {
    MAIN_THREAD
        .set(thread::current().id())
        .map_err(|_| ContextError::AlreadyMarked)
}

/// Reads the thread recorded by [`mark_main_thread`]; never current if unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalMainThread;

impl MainContext for GlobalMainThread {
    fn is_current(&self) -> bool {
        MAIN_THREAD
            .get()
            .map_or(false, |id| *id == thread::current().id())
    }
}
