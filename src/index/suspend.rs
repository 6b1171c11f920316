//! Suspended updates: a bounded scope during which index writes are queued
//! per definition instead of sent, then flushed as one batch per index on
//! scope exit.
//!
//! The pending queue is thread-local, so concurrent units of work never see
//! or flush each other's operations. Scope exit via unwind still flushes
//! whatever was queued before the failure (partial batch survives).

use crate::error::Result;
use crate::index::definition::IndexDefinition;
use crate::types::{BulkResponse, WriteOperation};
use std::cell::RefCell;
use std::sync::Arc;

/// Per-definition pending operations, in append order. Definitions are keyed
/// by pointer identity, not structure: two distinct definitions with the same
/// shape keep separate queues.
#[derive(Default)]
struct PendingQueue {
    entries: Vec<(Arc<IndexDefinition>, Vec<WriteOperation>)>,
}

impl PendingQueue {
    fn push(&mut self, definition: &Arc<IndexDefinition>, ops: Vec<WriteOperation>) {
        for (existing, queued) in &mut self.entries {
            if Arc::ptr_eq(existing, definition) {
                queued.extend(ops);
                return;
            }
        }
        self.entries.push((Arc::clone(definition), ops));
    }
}

thread_local! {
    static BULK_QUEUE: RefCell<Option<PendingQueue>> = const { RefCell::new(None) };
}

/// Begin a suspension scope on the current thread.
///
/// While the returned guard lives, `update`/`save`/`delete` calls queue their
/// operations instead of submitting them. Dropping the guard flushes each
/// definition's queued operations as a single batched call. Call
/// [`SuspendGuard::flush`] instead to observe the bulk results or a failure.
///
/// Entering a scope while one is already active flattens: the inner guard is
/// inert and the outer one performs the single flush.
pub fn suspended_updates() -> SuspendGuard {
    let owner = BULK_QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        if q.is_none() {
            *q = Some(PendingQueue::default());
            true
        } else {
            false
        }
    });
    SuspendGuard {
        owner,
        flushed: false,
    }
}

/// Hand operations to the active scope's queue, if any. Returns the
/// operations back when no scope is active on this thread.
pub(crate) fn enqueue(
    definition: &Arc<IndexDefinition>,
    ops: Vec<WriteOperation>,
) -> Option<Vec<WriteOperation>> {
    BULK_QUEUE.with(|q| {
        let mut q = q.borrow_mut();
        match q.as_mut() {
            Some(queue) => {
                queue.push(definition, ops);
                None
            }
            None => Some(ops),
        }
    })
}

/// True while a suspension scope is active on the current thread.
pub fn updates_suspended() -> bool {
    BULK_QUEUE.with(|q| q.borrow().is_some())
}

/// Scope handle returned by [`suspended_updates`].
#[must_use = "dropping the guard immediately flushes nothing useful"]
pub struct SuspendGuard {
    owner: bool,
    flushed: bool,
}

impl SuspendGuard {
    /// Flush the scope now, returning one bulk result per definition that
    /// had queued operations. On a non-owning (nested) guard this is a no-op.
    pub fn flush(mut self) -> Result<Vec<BulkResponse>> {
        self.flushed = true;
        if self.owner {
            take_and_flush()
        } else {
            Ok(Vec::new())
        }
    }
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        if self.owner && !self.flushed {
            // flushing in the finalizer keeps the partial batch on unwind;
            // errors here can only be reported, not propagated
            if let Err(e) = take_and_flush() {
                tracing::error!(error = %e, "failed to flush suspended updates");
            }
        }
    }
}

/// Tear the queue down first, then flush: the bulk submissions themselves
/// must not re-queue into the scope being closed.
fn take_and_flush() -> Result<Vec<BulkResponse>> {
    let queue = BULK_QUEUE.with(|q| q.borrow_mut().take());
    let Some(queue) = queue else {
        return Ok(Vec::new());
    };
    let mut responses = Vec::new();
    for (definition, ops) in queue.entries {
        if ops.is_empty() {
            continue;
        }
        tracing::debug!(
            doc_type = %definition.document_type(),
            ops = ops.len(),
            "flushing suspended updates"
        );
        responses.push(definition.bulk(ops, true)?);
    }
    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_is_active_only_while_guard_lives() {
        assert!(!updates_suspended());
        {
            let _guard = suspended_updates();
            assert!(updates_suspended());
        }
        assert!(!updates_suspended());
    }

    #[test]
    fn nested_scopes_flatten_to_the_outer_guard() {
        let outer = suspended_updates();
        {
            let inner = suspended_updates();
            assert!(!inner.owner);
            drop(inner);
            // inner guard dropping must not tear down the outer scope
            assert!(updates_suspended());
        }
        assert!(outer.owner);
        drop(outer);
        assert!(!updates_suspended());
    }

    #[test]
    fn scopes_are_not_shared_across_threads() {
        let _guard = suspended_updates();
        assert!(updates_suspended());
        std::thread::spawn(|| {
            assert!(!updates_suspended());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn explicit_flush_on_empty_scope_returns_nothing() {
        let guard = suspended_updates();
        assert_eq!(guard.flush().unwrap().len(), 0);
        assert!(!updates_suspended());
    }
}
