//! Core types shared by the resource mirror.
//!
//! This crate has no opinions about concurrency or storage: it defines the
//! identifiers ([`ResourceKey`]), the object contract ([`Object`]), the
//! event shape the mirror emits ([`MirrorEvent`], [`EventType`]), the error
//! taxonomy ([`MirrorError`]), and the fixed registry of resource kinds the
//! mirror knows how to watch ([`registry`]). [`mirror-runtime`][runtime]
//! builds the actual backends and controller on top of these types.
//!
//! [runtime]: https://docs.rs/mirror-runtime

mod error;
mod event;
mod key;
mod object;
pub mod registry;

pub use error::MirrorError;
pub use event::{EventType, MirrorEvent};
pub use key::ResourceKey;
pub use object::Object;
#[cfg(any(test, feature = "testing"))]
pub use object::testing;
