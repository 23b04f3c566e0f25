//! # trellis-core
//!
//! Core types shared across all Trellis crates.
//!
//! This crate provides the foundational data model of the log view:
//! - [`entities::LogRecord`] and its identity/ordering contract
//! - [`entities::LogState`], the value owned by a bounded log cache
//! - [`entities::LogDiff`] and the incremental [`entities::DiffQuery`] cursor
//! - [`entities::PushEvent`], the typed envelope delivered on the push channel
//! - Level, kind, scope and event-name enums
//! - A synchronous [`observers::ObserverRegistry`] for fan-out to callbacks
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod observers;
