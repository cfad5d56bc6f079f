//! Core types for Keystone
//!
//! This crate defines the types shared by every layer of the command core:
//! - Error: the execution error enum and its [`ErrorKind`] classification
//! - Capabilities: the flags a command declares at construction
//! - Diagnostics: per-invocation text buffer and timer
//! - NodeId / NodeKind / NodeSet: query results over the database resource
//! - ResultValue: the value a producing command hands to the output phase
//! - SessionConfig: `keystone.toml` session configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capabilities;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod node;
pub mod value;

pub use capabilities::Capabilities;
pub use config::{LockSettings, LockWait, SessionConfig, StorageMode, CONFIG_FILE_NAME};
pub use diagnostics::{max_length, Diagnostics, Timer};
pub use error::{Error, ErrorKind, Result};
pub use node::{NodeId, NodeKind, NodeSet};
pub use value::ResultValue;
