//! # Keystone Executor
//!
//! The command execution layer every front end (CLI, server, GUI) passes
//! through before it may read or update the database. It provides:
//! - [`Command`] - an operation plus capability flags, run by the execution core
//! - [`Context`] - the session: open database, configuration, collaborators
//! - [`Executor`] - run commands and write their output
//! - [`stream_frames`] - output phase for message-based transports
//!
//! ## Quick Start
//!
//! ```text
//! use keystone_executor::{Capabilities, Command, Context, Executor};
//!
//! let ctx = Arc::new(Context::default());
//! ctx.open(Arc::new(my_database));
//!
//! let mut cmd = Command::from_fn(
//!     "list",
//!     Capabilities::NEEDS_RESOURCE | Capabilities::PRODUCES_OUTPUT,
//!     |cx| {
//!         let nodes = cx.query("//item", Some(NodeKind::Element))?;
//!         cx.set_result(nodes);
//!         Ok(true)
//!     },
//! );
//! Executor::new(ctx).run(&mut cmd, &mut std::io::stdout())?;
//! ```
//!
//! ## Locking
//!
//! | Capabilities | Lock | Released |
//! |--------------|------|----------|
//! | (none) | read, if a database is open | after the operation |
//! | `PRODUCES_OUTPUT` | read | after the output phase |
//! | `MUTATES_RESOURCE` | write | after the operation |
//! | `MUTATES_RESOURCE \| PRODUCES_OUTPUT` | write | after the output phase |

#![warn(missing_docs)]

mod command;
mod context;
mod executor;
mod frames;
mod operation;
mod output;
mod query;
mod resource;

// Test modules
#[cfg(test)]
mod tests;

// =============================================================================
// Public API - Everything front ends need is re-exported here
// =============================================================================

pub use command::{Command, Invocation};
pub use context::Context;
pub use executor::Executor;
pub use frames::{stream_frames, Frame, FrameSink};
pub use operation::Operation;
pub use output::{Chunk, OutputFormat, OutputMethod, Serializer, StandardSerializer};
pub use query::{QueryError, QueryEvaluator};
pub use resource::{Database, Resource};

// Re-export core types so front ends don't need keystone-core directly
pub use keystone_core::{
    max_length, Capabilities, Diagnostics, Error, ErrorKind, NodeId, NodeKind, NodeSet, Result,
    ResultValue, SessionConfig, StorageMode,
};

// Re-export lock and security types
pub use keystone_concurrency::{LockIntent, LockState};
pub use keystone_security::{Principal, Privilege, SessionOptions};
