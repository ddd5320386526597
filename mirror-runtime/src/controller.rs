//! Wires [`EventSource`]s into the backend and the subscriber bus.
//!
//! One source per configured resource kind, each under its own per-kind
//! `tracing` span, with a `CancellationToken` hierarchy so `close`/`shutdown`
//! can tear every source down together.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use mirror_core::{MirrorError, MirrorEvent, Object, ResourceKey};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::backend::{MirrorBackend, Scope};
use crate::bus::SubscriberBus;
use crate::metrics::MirrorMetrics;
use crate::source::{EventCallbacks, EventSourceFactory, SyncSignal};

fn scope_for<K: Object>(kind: &ResourceKey, object: &K) -> Scope {
    Scope {
        namespace: object.namespace().map(str::to_string),
        kind: Some(kind.resource().to_string()),
        version: None,
        within: None,
    }
}

fn build_callbacks<K: Object>(
    kind: ResourceKey,
    backend: Arc<dyn MirrorBackend<K>>,
    bus: Arc<SubscriberBus<K>>,
    metrics: Arc<dyn MirrorMetrics>,
) -> EventCallbacks<K> {
    let on_added = {
        let kind = kind.clone();
        let backend = backend.clone();
        let bus = bus.clone();
        let metrics = metrics.clone();
        move |object: K| {
            let scope = scope_for(&kind, &object);
            let name = object.name().to_string();
            let version = object.resource_version().to_string();
            if let Err(err) = backend.set(&scope, &name, object.clone()) {
                tracing::warn!(kind = %kind, name = %name, error = %err, "failed to apply Added mutation");
                metrics.record("controller.added", kind.resource(), false, Duration::ZERO);
                return;
            }
            metrics.record("controller.added", kind.resource(), true, Duration::ZERO);
            bus.dispatch(&MirrorEvent::added(kind.clone(), version, object));
        }
    };

    let on_updated = {
        let kind = kind.clone();
        let backend = backend.clone();
        let bus = bus.clone();
        let metrics = metrics.clone();
        move |before: K, after: K| {
            let old_scope = scope_for(&kind, &before);
            let new_scope = scope_for(&kind, &after);
            let old_name = before.name().to_string();
            let new_name = after.name().to_string();
            if old_scope.namespace != new_scope.namespace || old_name != new_name {
                if let Err(err) = backend.delete(&old_scope, &old_name) {
                    tracing::warn!(kind = %kind, name = %old_name, error = %err, "failed to clean up stale key during rename");
                    metrics.record("controller.updated.rename_cleanup", kind.resource(), false, Duration::ZERO);
                }
            }
            let version = after.resource_version().to_string();
            if let Err(err) = backend.set(&new_scope, &new_name, after.clone()) {
                tracing::warn!(kind = %kind, name = %new_name, error = %err, "failed to apply Updated mutation");
                metrics.record("controller.updated", kind.resource(), false, Duration::ZERO);
                return;
            }
            metrics.record("controller.updated", kind.resource(), true, Duration::ZERO);
            bus.dispatch(&MirrorEvent::updated(kind.clone(), version, before, after));
        }
    };

    let on_deleted = {
        let kind = kind.clone();
        let backend = backend.clone();
        let bus = bus.clone();
        let metrics = metrics.clone();
        move |object: K| {
            let scope = scope_for(&kind, &object);
            let name = object.name().to_string();
            let version = object.resource_version().to_string();
            if let Err(err) = backend.delete(&scope, &name) {
                tracing::warn!(kind = %kind, name = %name, error = %err, "failed to apply Deleted mutation");
                metrics.record("controller.deleted", kind.resource(), false, Duration::ZERO);
                return;
            }
            metrics.record("controller.deleted", kind.resource(), true, Duration::ZERO);
            bus.dispatch(&MirrorEvent::deleted(kind.clone(), version, object));
        }
    };

    let on_error = {
        let kind = kind.clone();
        move |err: MirrorError| {
            tracing::warn!(kind = %kind, error = %err, "event source reported a transient error");
        }
    };

    EventCallbacks {
        on_added: Box::new(on_added),
        on_updated: Box::new(on_updated),
        on_deleted: Box::new(on_deleted),
        on_error: Box::new(on_error),
    }
}

/// Owns one [`EventSource`](crate::source::EventSource) per configured
/// resource kind and the cancellation handles needed to tear them all down
/// together.
pub struct MirrorController {
    root_cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl MirrorController {
    /// Start one source per (deduplicated) kind in `kinds`.
    ///
    /// All sources are created before this returns; if any kind is
    /// unrecognized or any source's initial cache-sync doesn't complete
    /// within `sync_timeout`, every already-started source is cancelled
    /// and the first failure is returned.
    ///
    /// # Errors
    ///
    /// [`MirrorError::UnknownKind`] for a kind missing from the registry;
    /// [`MirrorError::SyncTimeout`] if a source's sync doesn't complete in
    /// time.
    pub async fn new<K: Object>(
        kinds: impl IntoIterator<Item = ResourceKey>,
        backend: Arc<dyn MirrorBackend<K>>,
        bus: Arc<SubscriberBus<K>>,
        factory: Arc<dyn EventSourceFactory<K>>,
        sync_timeout: Duration,
        metrics: Arc<dyn MirrorMetrics>,
    ) -> Result<Self, MirrorError> {
        let root_cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        let mut seen = HashSet::new();

        for kind in kinds {
            if !seen.insert(kind.clone()) {
                continue;
            }
            mirror_core::registry::lookup(&kind.to_string())?;

            let source = factory.create(kind.clone()).await?;
            let child_cancel = root_cancel.child_token();
            let (synced_tx, synced_rx) = oneshot::channel();
            let callbacks = build_callbacks(kind.clone(), backend.clone(), bus.clone(), metrics.clone());
            let span = tracing::info_span!("mirror_source", kind = %kind);

            let run_cancel = child_cancel.clone();
            let task = tokio::spawn(
                async move {
                    if let Err(err) = source.run(callbacks, SyncSignal::new(synced_tx), run_cancel).await {
                        tracing::error!(error = %err, "event source exited with a fatal error");
                    }
                }
                .instrument(span),
            );
            tasks.push(task);

            match tokio::time::timeout(sync_timeout, synced_rx).await {
                Ok(Ok(())) => {}
                _ => {
                    root_cancel.cancel();
                    for task in tasks {
                        let _ = task.await;
                    }
                    return Err(MirrorError::SyncTimeout(sync_timeout));
                }
            }
        }

        Ok(Self { root_cancel, tasks })
    }

    /// Cancel every source. Safe to call more than once.
    pub fn close(&self) {
        self.root_cancel.cancel();
    }

    /// Cancel every source and wait for their tasks to finish.
    pub async fn shutdown(mut self) {
        self.root_cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}
