//! Keystone - command execution and resource locking for an embedded database
//!
//! Every front end (command line, network server, GUI) reaches the database
//! through the same execution core: a [`Command`] declares what it needs and
//! does, and [`Command::execute`] checks preconditions, takes the shared
//! read/write lock, runs the operation inside a failure boundary and releases
//! the lock again once the result has been written.
//!
//! # Quick Start
//!
//! ```ignore
//! use keystone::{Capabilities, Command, Context, Executor, NodeKind};
//!
//! let ctx = Arc::new(Context::default().with_evaluator(evaluator));
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
//! # Architecture
//!
//! Only the executor API is public here. Lock internals live in
//! `keystone-concurrency`, shared types in `keystone-core`.

// Re-export the public API from keystone-executor
pub use keystone_executor::*;
