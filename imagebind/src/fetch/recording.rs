//! In-process fetch service that records every call.
//!
//! `RecordingFetchService` performs no I/O. It models the bookkeeping side of
//! an image pipeline: which operations exist, which prefetch handles are still
//! open and which element holds which primary attachment. Tests and the CLI
//! replayer use it to check that a controller releases everything it acquires.
//!
//! # Dedup Behaviour
//!
//! - A primary fetch for an element already attached to an equal descriptor is
//!   merged: no new operation is created and a pending delayed release is
//!   cancelled.
//! - A primary fetch with a different descriptor releases the old attachment
//!   and starts a new operation.
//! - [`ReleaseMode::Delayed`] marks the attachment; the release only happens
//!   on [`RecordingFetchService::flush_delayed_releases`].
//! - Every prefetch is a new operation with its own handle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{
    ContextTag, ElementId, FetchRequest, FetchService, PrefetchTarget, PrimaryFetch, Release,
    ReleaseMode, ResourceHandle, Viewport,
};
use crate::descriptor::ResourceDescriptor;

/// Identity of one underlying operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub u64);

/// One recorded call or effect.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchEvent {
    /// A prefetch operation was started.
    Prefetch {
        op: OperationId,
        uri: Option<String>,
        target: PrefetchTarget,
        tag: ContextTag,
    },

    /// A prefetch handle was released.
    PrefetchReleased { op: OperationId },

    /// A primary fetch was requested; `merged` if no new operation started.
    PrimaryFetch {
        element: ElementId,
        uri: Option<String>,
        op: OperationId,
        merged: bool,
        viewport: Option<Viewport>,
        mutate_drawables: bool,
    },

    /// The controller asked for the primary resource to be released.
    PrimaryReleaseRequested { element: ElementId, mode: ReleaseMode },

    /// A primary attachment was actually released.
    PrimaryReleased { element: ElementId, op: OperationId },

    /// A distance-to-viewport hint.
    Priority { uri: Option<String>, distance: i32 },
}

#[derive(Debug)]
struct Attachment {
    descriptor: ResourceDescriptor,
    op: OperationId,
    release_pending: bool,
}

#[derive(Debug, Default)]
struct Inner {
    next_op: u64,
    events: Vec<FetchEvent>,
    attachments: HashMap<ElementId, Attachment>,
    open_prefetches: HashSet<OperationId>,
    tokens: HashMap<OperationId, CancellationToken>,
}

impl Inner {
    fn next_op(&mut self) -> OperationId {
        self.next_op += 1;
        OperationId(self.next_op)
    }

    fn detach(&mut self, element: ElementId) {
        if let Some(attachment) = self.attachments.remove(&element) {
            self.events.push(FetchEvent::PrimaryReleased {
                element,
                op: attachment.op,
            });
        }
    }
}

/// Cancel side of a recorded prefetch.
struct RecordedRelease {
    op: OperationId,
    token: CancellationToken,
    inner: Arc<Mutex<Inner>>,
}

impl Release for RecordedRelease {
    fn release(&self) {
        self.token.cancel();
        let mut inner = self.inner.lock();
        if inner.open_prefetches.remove(&self.op) {
            inner
                .events
                .push(FetchEvent::PrefetchReleased { op: self.op });
        } else {
            // A second release would mean the handle itself is broken.
            debug_assert!(false, "prefetch {:?} released twice", self.op);
        }
    }
}

/// Bookkeeping-only fetch service.
///
/// Cheap to share: clone the `Arc` it lives in.
#[derive(Debug, Default)]
pub struct RecordingFetchService {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingFetchService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every recorded event, oldest first.
    pub fn events(&self) -> Vec<FetchEvent> {
        self.inner.lock().events.clone()
    }

    /// Number of fetch calls received, merged primary fetches included.
    pub fn fetch_calls(&self) -> usize {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| matches!(e, FetchEvent::Prefetch { .. } | FetchEvent::PrimaryFetch { .. }))
            .count()
    }

    /// Cancellation token a pipeline worker would watch for prefetch `op`.
    ///
    /// The token is cancelled when the prefetch handle is released and stays
    /// available afterwards.
    pub fn prefetch_token(&self, op: OperationId) -> Option<CancellationToken> {
        self.inner.lock().tokens.get(&op).cloned()
    }

    /// Number of distinct underlying operations started.
    pub fn operations(&self) -> u64 {
        self.inner.lock().next_op
    }

    /// Number of prefetch operations started.
    pub fn prefetches(&self) -> usize {
        self.count(|e| matches!(e, FetchEvent::Prefetch { .. }))
    }

    /// Number of primary operations started (merges excluded).
    pub fn primary_operations(&self) -> usize {
        self.count(|e| matches!(e, FetchEvent::PrimaryFetch { merged: false, .. }))
    }

    /// Number of effective releases, prefetch and primary.
    pub fn releases(&self) -> usize {
        self.count(|e| {
            matches!(
                e,
                FetchEvent::PrefetchReleased { .. } | FetchEvent::PrimaryReleased { .. }
            )
        })
    }

    /// Prefetch handles not yet released.
    pub fn open_handles(&self) -> usize {
        self.inner.lock().open_prefetches.len()
    }

    /// Whether the element currently holds a primary attachment.
    pub fn is_attached(&self, element: ElementId) -> bool {
        self.inner.lock().attachments.contains_key(&element)
    }

    /// Number of elements holding a primary attachment.
    pub fn attached_count(&self) -> usize {
        self.inner.lock().attachments.len()
    }

    /// Whether the element's attachment is waiting for a delayed release.
    pub fn has_pending_release(&self, element: ElementId) -> bool {
        self.inner
            .lock()
            .attachments
            .get(&element)
            .is_some_and(|a| a.release_pending)
    }

    /// Release modes requested for an element, in order.
    pub fn release_requests(&self, element: ElementId) -> Vec<ReleaseMode> {
        self.inner
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                FetchEvent::PrimaryReleaseRequested { element: el, mode } if *el == element => {
                    Some(*mode)
                }
                _ => None,
            })
            .collect()
    }

    /// Distance hints received, in order.
    pub fn priority_hints(&self) -> Vec<(Option<String>, i32)> {
        self.inner
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                FetchEvent::Priority { uri, distance } => Some((uri.clone(), *distance)),
                _ => None,
            })
            .collect()
    }

    /// Perform all pending delayed releases.
    ///
    /// Returns the number of attachments released.
    pub fn flush_delayed_releases(&self) -> usize {
        let mut inner = self.inner.lock();
        let mut pending: Vec<ElementId> = inner
            .attachments
            .iter()
            .filter(|(_, a)| a.release_pending)
            .map(|(element, _)| *element)
            .collect();
        pending.sort();

        for element in &pending {
            inner.detach(*element);
        }

        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "Flushed delayed releases");
        }
        pending.len()
    }

    fn count(&self, predicate: impl Fn(&FetchEvent) -> bool) -> usize {
        self.inner.lock().events.iter().filter(|&e| predicate(e)).count()
    }
}

impl FetchService for RecordingFetchService {
    fn fetch(&self, request: FetchRequest<'_>) -> ResourceHandle {
        let token = CancellationToken::new();
        let op = {
            let mut inner = self.inner.lock();
            let op = inner.next_op();
            inner.open_prefetches.insert(op);
            inner.tokens.insert(op, token.clone());
            inner.events.push(FetchEvent::Prefetch {
                op,
                uri: request.descriptor.uri().map(str::to_string),
                target: request.target,
                tag: request.tag,
            });
            op
        };

        tracing::trace!(
            op = op.0,
            uri = ?request.descriptor.uri(),
            target = %request.target,
            tag = %request.tag,
            "Prefetch started"
        );

        ResourceHandle::new(RecordedRelease {
            op,
            token,
            inner: Arc::clone(&self.inner),
        })
    }

    fn fetch_primary(&self, request: PrimaryFetch<'_>) {
        let mut inner = self.inner.lock();
        let uri = request.descriptor.uri().map(str::to_string);

        let merged_op = match inner.attachments.get_mut(&request.element) {
            Some(attachment) if attachment.descriptor == *request.descriptor => {
                attachment.release_pending = false;
                Some(attachment.op)
            }
            _ => None,
        };

        let (op, merged) = match merged_op {
            Some(op) => (op, true),
            None => {
                inner.detach(request.element);
                let op = inner.next_op();
                inner.attachments.insert(
                    request.element,
                    Attachment {
                        descriptor: request.descriptor.clone(),
                        op,
                        release_pending: false,
                    },
                );
                (op, false)
            }
        };

        inner.events.push(FetchEvent::PrimaryFetch {
            element: request.element,
            uri,
            op,
            merged,
            viewport: request.viewport,
            mutate_drawables: request.display.mutate_drawables,
        });
    }

    fn release_primary(&self, element: ElementId, mode: ReleaseMode) {
        let mut inner = self.inner.lock();
        inner
            .events
            .push(FetchEvent::PrimaryReleaseRequested { element, mode });

        match mode {
            ReleaseMode::Immediate | ReleaseMode::Full => inner.detach(element),
            ReleaseMode::Delayed => {
                if let Some(attachment) = inner.attachments.get_mut(&element) {
                    attachment.release_pending = true;
                }
            }
        }
    }

    fn set_priority(
        &self,
        descriptor: &ResourceDescriptor,
        distance: i32,
        _caller_context: Option<&str>,
    ) {
        self.inner.lock().events.push(FetchEvent::Priority {
            uri: descriptor.uri().map(str::to_string),
            distance,
        });
    }
}
