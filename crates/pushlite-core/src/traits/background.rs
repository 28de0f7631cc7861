// # Background Execution
//
// The OS-level "finish in background" token. On mobile platforms the host
// maps this to its platform API; a server-side or desktop host can leave the
// default no-op in place and rely on `PushLite::wait_for_grace_release()`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier of a granted background-execution token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub u64);

/// Host hook for extending process lifetime while a close event is in flight
///
/// The coordinator calls `begin` when a close event is created on
/// background/terminate and `end` exactly once per id, either when the send
/// completes or when the grace period expires.
pub trait BackgroundExecution: Send + Sync {
    /// Ask the host to keep the process alive
    fn begin(&self, name: &str) -> BackgroundTaskId;

    /// Release a previously granted token
    fn end(&self, id: BackgroundTaskId);
}

/// Background execution that grants tokens without doing anything
#[derive(Debug, Default)]
pub struct NoopBackgroundExecution {
    next_id: AtomicU64,
}

impl NoopBackgroundExecution {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackgroundExecution for NoopBackgroundExecution {
    fn begin(&self, name: &str) -> BackgroundTaskId {
        let id = BackgroundTaskId(self.next_id.fetch_add(1, Ordering::SeqCst));
        tracing::trace!("Background task {} started ({:?})", name, id);
        id
    }

    fn end(&self, id: BackgroundTaskId) {
        tracing::trace!("Background task ended ({:?})", id);
    }
}
