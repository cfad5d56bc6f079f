//! Concurrency layer for Keystone
//!
//! This crate provides the [`ResourceLock`] that gates every command's access
//! to the shared database resource:
//! - Shared read access, exclusive write access
//! - Writers start only when no reader or writer is active
//! - Blocking (condition variable) or polling waits, optional timeout
//! - RAII [`LockGuard`]s, so a lock is released on every exit path

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod lock;

pub use lock::{LockGuard, LockIntent, LockState, ResourceLock, WaitPolicy};
