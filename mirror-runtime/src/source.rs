//! The `EventSource` contract: the abstract streaming change-feed the
//! [`crate::controller::MirrorController`] consumes.
//!
//! This is deliberately thin. The real upstream client -- the thing that
//! actually opens a watch against an API server and decodes deltas -- is
//! out of scope: any conforming adapter plugs in here. A production
//! adapter wraps its own watch/reflect loop and drives the
//! `{added, updated, deleted, error, synced}` callback surface below.

use async_trait::async_trait;
use mirror_core::{MirrorError, Object, ResourceKey};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// The three mutation callbacks and the error sink an [`EventSource`]
/// drives, bound by the controller to backend mutation + bus fan-out
/// before the source is ever started.
///
/// Plain `Fn` closures rather than an async trait: backend mutation is a
/// synchronous, lock-guarded operation, so there's no need to make the
/// call sites async and no benefit to it -- it would only add a
/// suspension point on a path that's deliberately kept synchronous.
pub struct EventCallbacks<K: Object> {
    pub(crate) on_added: Box<dyn Fn(K) + Send + Sync>,
    pub(crate) on_updated: Box<dyn Fn(K, K) + Send + Sync>,
    pub(crate) on_deleted: Box<dyn Fn(K) + Send + Sync>,
    pub(crate) on_error: Box<dyn Fn(MirrorError) + Send + Sync>,
}

impl<K: Object> EventCallbacks<K> {
    /// An object appeared.
    pub fn added(&self, object: K) {
        (self.on_added)(object);
    }

    /// An object was replaced. An `updated` whose `before` is unknown to
    /// the caller should go through [`Self::added`] instead -- the source
    /// adapter, not this type, is responsible for that distinction.
    pub fn updated(&self, before: K, after: K) {
        (self.on_updated)(before, after);
    }

    /// An object was removed.
    pub fn deleted(&self, object: K) {
        (self.on_deleted)(object);
    }

    /// A transient, non-fatal error occurred. The source continues.
    pub fn error(&self, err: MirrorError) {
        (self.on_error)(err);
    }
}

/// A one-shot latch an [`EventSource`] flips exactly once, when its initial
/// snapshot has been fully drained (`HasSynced` transitions true). Further
/// calls are no-ops; [`MirrorController::new`](crate::controller::MirrorController::new)
/// races this against a timeout.
pub struct SyncSignal {
    tx: Option<oneshot::Sender<()>>,
}

impl SyncSignal {
    pub(crate) fn new(tx: oneshot::Sender<()>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Mark the initial cache-sync complete. Idempotent.
    pub fn mark_synced(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// One running subscription to a resource kind's change-feed.
///
/// An implementation drains its initial snapshot (calling
/// [`EventCallbacks::added`] for each object and then
/// [`SyncSignal::mark_synced`]), then streams deltas until `cancel` fires.
#[async_trait]
pub trait EventSource<K: Object>: Send {
    /// Run the subscription to completion (cancellation). Must never
    /// panic -- transient failures go through
    /// [`EventCallbacks::error`](EventCallbacks::error).
    ///
    /// # Errors
    ///
    /// Only returned for conditions the controller should treat as fatal
    /// to *this* source, such as [`MirrorError::SyncTimeout`] bubbling up
    /// from an inner wait the adapter itself performs. Transient errors
    /// must go through `callbacks.error(..)` instead.
    async fn run(
        self: Box<Self>,
        callbacks: EventCallbacks<K>,
        synced: SyncSignal,
        cancel: CancellationToken,
    ) -> Result<(), MirrorError>;
}

/// Produces one [`EventSource`] per resource kind.
///
/// Abstracts the upstream streaming client and is shared across sources
/// so that one connection can multiplex many kinds: a real implementation
/// holds one underlying client/connection and hands out lightweight
/// per-kind sources backed by it.
#[async_trait]
pub trait EventSourceFactory<K: Object>: Send + Sync {
    /// Build the source for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::UnknownKind`] if `kind` isn't one this
    /// factory knows how to watch.
    async fn create(&self, kind: ResourceKey) -> Result<Box<dyn EventSource<K>>, MirrorError>;
}
