//! In-memory resource mirror.
//!
//! A long-lived, continuously synchronized cache of selected cluster
//! resources, built from three interchangeable pieces:
//!
//! - a [`backend::MirrorBackend`] (either [`backend::PathIndexBackend`] or
//!   [`backend::FieldIndexBackend`]) holding the actual objects,
//! - a [`query::QueryBuilder`] giving callers a fluent, scoped read/write
//!   API over whichever backend they're holding,
//! - a [`bus::SubscriberBus`] fanning mutations out to registered listeners,
//!
//! wired together by a [`controller::MirrorController`], which consumes one
//! [`source::EventSource`] per resource kind and drives both the backend and
//! the bus from its callbacks.
//!
//! [`mirror_core`] defines the types this crate's backends, bus, and
//! controller are generic over ([`mirror_core::Object`],
//! [`mirror_core::ResourceKey`], [`mirror_core::MirrorEvent`]).

pub mod backend;
pub mod bus;
pub mod config;
pub mod controller;
pub mod metrics;
pub mod query;
pub mod source;

pub use backend::{FieldIndexBackend, MirrorBackend, PathIndexBackend, Scope};
pub use bus::{ListenerId, ListenerSpec, SubscriberBus};
pub use config::{BackendKind, MirrorConfig};
pub use controller::MirrorController;
pub use metrics::{DefaultMetrics, MirrorMetrics, NoopMetrics};
pub use query::QueryBuilder;
pub use source::{EventCallbacks, EventSource, EventSourceFactory, SyncSignal};
