//! The Executor - entry point for front ends.
//!
//! CLI, server and GUI front ends build [`Command`]s and hand them to an
//! [`Executor`], which runs them against the session context, writes their
//! output and turns failures into [`Error`] values.

use std::io::Write;
use std::sync::Arc;

use keystone_core::{Error, Result};

use crate::command::Command;
use crate::context::Context;

/// Runs commands against one session context.
///
/// The Executor holds no state of its own beyond the shared context.
///
/// # Thread Safety
///
/// Executor is `Send + Sync` and can be shared across threads; concurrent
/// commands are serialized by the database lock.
///
/// # Example
///
/// ```ignore
/// let executor = Executor::new(Arc::new(ctx));
/// let mut cmd = Command::from_fn("count", Capabilities::NEEDS_RESOURCE, |cx| { .. });
/// executor.run(&mut cmd, &mut std::io::stdout())?;
/// ```
#[derive(Debug, Clone)]
pub struct Executor {
    context: Arc<Context>,
}

impl Executor {
    /// Create an executor for `context`.
    pub fn new(context: Arc<Context>) -> Self {
        Self { context }
    }

    /// The session context.
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Execute `command` without writing output.
    ///
    /// A producing command keeps the lock until the caller invokes
    /// [`Command::write_output`] (or drops the command).
    pub fn execute(&self, command: &mut Command) -> Result<()> {
        if command.execute(&self.context) {
            Ok(())
        } else {
            Err(failure(command))
        }
    }

    /// Execute `command`, serialize its result to `out` and, if the session
    /// reports info, append its diagnostics.
    ///
    /// On failure nothing is written and the error carries the diagnostics
    /// message.
    pub fn run(&self, command: &mut Command, out: &mut dyn Write) -> Result<()> {
        self.execute(command)?;
        command.write_output(out)?;
        if self.context.config().info && !command.diagnostics().is_empty() {
            out.write_all(command.diagnostics_text().as_bytes())?;
            out.flush()?;
        }
        Ok(())
    }

    /// Run several commands in order, one result per command.
    ///
    /// A failing command does not stop the ones after it.
    pub fn run_many(&self, commands: &mut [Command], out: &mut dyn Write) -> Vec<Result<()>> {
        commands
            .iter_mut()
            .map(|command| self.run(command, out))
            .collect()
    }
}

fn failure(command: &Command) -> Error {
    command.error().cloned().unwrap_or_else(|| Error::Rejected {
        command: command.name().to_string(),
        message: command.diagnostics_text().trim_end().to_string(),
    })
}
