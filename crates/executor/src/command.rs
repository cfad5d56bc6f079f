//! Commands and the execution core.
//!
//! A [`Command`] bundles an [`Operation`] with its arguments and
//! [`Capabilities`]. [`Command::execute`] is the single entry point through
//! which every operation reaches the shared database:
//!
//! ```text
//! 1. check privilege; no open database + NEEDS_RESOURCE -> fail, lock untouched
//! 2. MUTATES_RESOURCE in a main memory mode             -> fail, lock untouched
//! 3. acquire the lock (write if mutating, read otherwise)
//! 4. run the operation inside the failure boundary
//! 5. release, unless the result still has to be serialized
//! ```
//!
//! Producing commands keep the lock until [`Command::write_output`] has
//! serialized the result, so no writer can change the database between
//! computing and writing a result. Failed commands never produce output and
//! release at step 5. The lock is held through a guard, so dropping a command
//! releases it as well.

use std::any::Any;
use std::fmt::{self, Display};
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use keystone_concurrency::{LockGuard, LockIntent};
use keystone_core::{
    Capabilities, Diagnostics, Error, NodeKind, NodeSet, Result, ResultValue, SessionConfig, Timer,
};
use keystone_security::Privilege;
use tracing::{debug, error, warn};

use crate::context::Context;
use crate::operation::Operation;
use crate::output::{Chunk, OutputFormat, Serializer};
use crate::query::check_kinds;
use crate::resource::{Database, Resource};

struct OutputBinding {
    serializer: Arc<dyn Serializer>,
    format: OutputFormat,
}

/// One invocation of an operation against the session's database.
///
/// Created per invocation, executed once, then dropped after the caller has
/// consumed its result and diagnostics.
pub struct Command {
    name: String,
    args: Vec<String>,
    capabilities: Capabilities,
    privilege: Privilege,
    lifecycle_signal: bool,
    operation: Box<dyn Operation>,
    diagnostics: Diagnostics,
    timer: Timer,
    result: Option<ResultValue>,
    error: Option<Error>,
    output: Option<OutputBinding>,
    guard: Option<LockGuard>,
}

impl Command {
    /// Create a command. The name is shown upper-case in diagnostics.
    pub fn new(
        name: impl Into<String>,
        capabilities: Capabilities,
        operation: impl Operation + 'static,
    ) -> Self {
        Self {
            name: name.into().to_uppercase(),
            args: Vec::new(),
            capabilities,
            privilege: Privilege::None,
            lifecycle_signal: false,
            operation: Box::new(operation),
            diagnostics: Diagnostics::new(),
            timer: Timer::start(),
            result: None,
            error: None,
            output: None,
            guard: None,
        }
    }

    /// Create a command from a closure.
    pub fn from_fn<F>(name: impl Into<String>, capabilities: Capabilities, f: F) -> Self
    where
        F: FnMut(&mut Invocation<'_>) -> Result<bool> + Send + 'static,
    {
        Self::new(name, capabilities, f)
    }

    /// Set the command arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Require `privilege` from the session principal.
    pub fn requires(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }

    /// Mark the command as a lifecycle signal: it runs, but streaming
    /// transports emit nothing for it.
    pub fn as_lifecycle_signal(mut self) -> Self {
        self.lifecycle_signal = true;
        self
    }

    // =========================================================================
    // Execution core
    // =========================================================================

    /// Execute the command against `ctx` and return the success flag.
    ///
    /// Never panics and never leaves the lock held on failure. On `false`,
    /// [`Command::error`] holds the typed error and
    /// [`Command::diagnostics_text`] the message for the caller.
    pub fn execute(&mut self, ctx: &Context) -> bool {
        self.run(ctx, None)
    }

    /// `inherited` is the database and lock intent of the enclosing command,
    /// if this one is nested.
    fn run(&mut self, ctx: &Context, inherited: Option<(&Arc<Database>, LockIntent)>) -> bool {
        self.reset(ctx);
        let database = ctx.database();
        debug!(command = %self, "executing command");

        let intent = LockIntent::for_update(self.capabilities.mutates_resource());
        let held = match self.admit(ctx, database.as_ref(), intent, inherited) {
            Ok(held) => held,
            Err(e) => return self.fail(e),
        };

        let outcome = {
            let Command {
                name,
                args,
                operation,
                diagnostics,
                timer,
                result,
                ..
            } = self;
            let mut cx = Invocation {
                ctx,
                database: database.as_ref(),
                name: name.as_str(),
                args: args.as_slice(),
                diagnostics,
                result,
                timer: &*timer,
                held,
            };
            panic::catch_unwind(AssertUnwindSafe(|| operation.perform(&mut cx)))
        };

        let ok = match outcome {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => self.rejected(),
            Ok(Err(Error::OutOfMemory)) => {
                // No output can be produced: release before reclaiming
                self.release();
                if let Some(db) = &database {
                    db.resource().reclaim();
                }
                warn!(command = %self, "command ran out of memory");
                self.fail(Error::OutOfMemory)
            }
            Ok(Err(e)) => self.fail(e),
            Err(payload) => {
                self.release();
                let reason = panic_message(payload.as_ref());
                error!(command = %self, %reason, "command failed unexpectedly");
                let command = self.to_string();
                self.fail(Error::Internal { command, reason })
            }
        };

        if !ok {
            self.result = None;
            self.release();
        } else if !self.capabilities.produces_output() {
            self.release();
        }

        debug!(
            command = %self,
            ok,
            elapsed_us = self.timer.elapsed().as_micros() as u64,
            "command finished"
        );
        ok
    }

    fn reset(&mut self, ctx: &Context) {
        self.release();
        self.diagnostics.clear();
        self.diagnostics.set_verbose(ctx.config().info);
        self.result = None;
        self.error = None;
        self.output = Some(OutputBinding {
            serializer: Arc::clone(ctx.serializer()),
            format: ctx.format().clone(),
        });
    }

    /// Precondition checks and lock acquisition. Returns the intent of the
    /// lock covering the operation, if a database is bound.
    fn admit(
        &mut self,
        ctx: &Context,
        database: Option<&Arc<Database>>,
        intent: LockIntent,
        inherited: Option<(&Arc<Database>, LockIntent)>,
    ) -> Result<Option<LockIntent>> {
        if !ctx.principal().has(self.privilege) {
            return Err(Error::PermissionDenied {
                command: self.name.clone(),
                required: self.privilege.to_string(),
            });
        }

        let database = match database {
            Some(database) => database,
            None if self.capabilities.needs_resource() => return Err(Error::NoResource),
            None => return Ok(None),
        };

        let mode = ctx.config().mode;
        if intent == LockIntent::Write && !mode.allows_updates() {
            return Err(Error::ModeConflict {
                mode: mode.to_string(),
            });
        }

        // Nested commands run under their parent's lock, as long as the
        // parent locked this same database
        if let Some((parent, held)) = inherited {
            if Arc::ptr_eq(parent, database) {
                if held.covers(intent) {
                    return Ok(Some(held));
                }
                return Err(Error::NestedConflict {
                    command: self.name.clone(),
                });
            }
        }

        let guard = database.lock().acquire(intent, &ctx.wait_policy())?;
        self.guard = Some(guard);
        Ok(Some(intent))
    }

    fn fail(&mut self, err: Error) -> bool {
        self.diagnostics.error(&err);
        self.error = Some(err);
        false
    }

    /// The operation returned `false` after reporting through the buffer.
    fn rejected(&mut self) -> bool {
        let message = self.diagnostics.text().trim_end().to_string();
        let command = self.name.clone();
        if message.is_empty() {
            let message = format!("{} failed", command);
            return self.fail(Error::Rejected { command, message });
        }
        self.error = Some(Error::Rejected { command, message });
        false
    }

    fn release(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.release();
        }
    }

    // =========================================================================
    // Output phase
    // =========================================================================

    /// Serialize the result to `out` and release the lock.
    ///
    /// Does nothing but release for commands without
    /// [`Capabilities::PRODUCES_OUTPUT`]. A serializer failure, including a
    /// panicking serializer, is written to `out` as text instead of the
    /// result and recorded in the diagnostics. I/O failures of `out` itself
    /// are returned. The lock is released on every path.
    pub fn write_output(&mut self, out: &mut dyn Write) -> Result<()> {
        self.output_phase(|cmd| cmd.emit(out))
    }

    /// Run `phase` with the lock guard moved out of the command, so it is
    /// released when the phase returns or unwinds.
    pub(crate) fn output_phase<R>(&mut self, phase: impl FnOnce(&mut Self) -> R) -> R {
        let guard = self.guard.take();
        let result = phase(self);
        drop(guard);
        result
    }

    fn emit(&mut self, out: &mut dyn Write) -> Result<()> {
        if !self.capabilities.produces_output() {
            return Ok(());
        }
        let chunks = match self.serialize_result() {
            Ok(Some(chunks)) => chunks,
            Ok(None) => return Ok(()),
            Err(e) => {
                out.write_all(e.to_string().as_bytes())?;
                return Ok(());
            }
        };

        let separator = self
            .output
            .as_ref()
            .map(|o| o.format.separator.as_str())
            .unwrap_or_default();
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                out.write_all(separator.as_bytes())?;
            }
            out.write_all(chunk.as_bytes())?;
        }
        out.flush()?;
        Ok(())
    }

    /// Serialize the stored result. `Ok(None)` if there is nothing to write.
    pub(crate) fn serialize_result(&mut self) -> Result<Option<Vec<Chunk>>> {
        let (value, binding) = match (self.result.as_ref(), self.output.as_ref()) {
            (Some(value), Some(binding)) => (value, binding),
            _ => return Ok(None),
        };
        let serialized = panic::catch_unwind(AssertUnwindSafe(|| {
            binding.serializer.serialize(value, &binding.format)
        }))
        .unwrap_or_else(|payload| {
            let reason = panic_message(payload.as_ref());
            error!(command = %self, %reason, "serializer failed unexpectedly");
            Err(Error::Internal {
                command: self.to_string(),
                reason,
            })
        });
        match serialized {
            Ok(chunks) => Ok(Some(chunks)),
            Err(e) => {
                warn!(command = %self, error = %e, "result serialization failed");
                self.diagnostics.error(&e);
                self.error = Some(e.clone());
                Err(e)
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Upper-case command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Command arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Non-empty arguments, each preceded by a space.
    pub fn args_text(&self) -> String {
        self.args
            .iter()
            .filter(|a| !a.is_empty())
            .map(|a| format!(" {}", a))
            .collect()
    }

    /// Declared capabilities.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Privilege required from the session principal.
    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// Returns `true` if streaming transports skip this command's output.
    pub fn is_lifecycle_signal(&self) -> bool {
        self.lifecycle_signal
    }

    /// Diagnostics recorded by the last execution.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Diagnostics text recorded by the last execution.
    pub fn diagnostics_text(&self) -> &str {
        self.diagnostics.text()
    }

    /// Typed error of the last execution, if it failed.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Result of the last successful execution.
    pub fn result(&self) -> Option<&ResultValue> {
        self.result.as_ref()
    }

    /// Take the result out of the command.
    pub fn take_result(&mut self) -> Option<ResultValue> {
        self.result.take()
    }

    /// Time since the command was created.
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    /// Returns `true` while the command holds the database lock.
    pub fn holds_lock(&self) -> bool {
        self.guard.is_some()
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.args_text())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("capabilities", &self.capabilities)
            .field("holds_lock", &self.holds_lock())
            .field("error", &self.error)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "(non-string panic)".to_string()
    }
}

// =============================================================================
// Invocation
// =============================================================================

/// What an [`Operation`] sees while it runs: context, arguments,
/// diagnostics, result slot, and the helpers built on them.
pub struct Invocation<'a> {
    ctx: &'a Context,
    database: Option<&'a Arc<Database>>,
    name: &'a str,
    args: &'a [String],
    diagnostics: &'a mut Diagnostics,
    result: &'a mut Option<ResultValue>,
    timer: &'a Timer,
    held: Option<LockIntent>,
}

impl Invocation<'_> {
    /// Session context.
    pub fn context(&self) -> &Context {
        self.ctx
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        self.ctx.config()
    }

    /// Database bound when the command started.
    pub fn database(&self) -> Option<&Database> {
        self.database.map(|db| &**db)
    }

    /// Resource of the bound database.
    pub fn resource(&self) -> Result<&dyn Resource> {
        self.database()
            .map(Database::resource)
            .ok_or(Error::NoResource)
    }

    /// Name of the running command.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Command arguments.
    pub fn args(&self) -> &[String] {
        self.args
    }

    /// Argument at `index`.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Argument at `index`, or an [`Error::InvalidArgument`] naming `what`.
    pub fn require_arg(&self, index: usize, what: &str) -> Result<&str> {
        self.arg(index)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::invalid_argument(format!("{} expects {}", self.name, what)))
    }

    /// Intent of the lock covering this invocation, if a database is bound.
    pub fn lock_intent(&self) -> Option<LockIntent> {
        self.held
    }

    /// Time since the command was created.
    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed()
    }

    /// Replace the diagnostics with `message`. Returns `false`.
    pub fn report_error(&mut self, message: impl Display) -> bool {
        self.diagnostics.error(message)
    }

    /// Append `message` if the session reports info. Returns `true`.
    pub fn report_info(&mut self, message: impl Display) -> bool {
        self.diagnostics.info(message)
    }

    /// Diagnostics recorded so far.
    pub fn diagnostics_text(&self) -> &str {
        self.diagnostics.text()
    }

    /// Store the value the output phase will serialize.
    pub fn set_result(&mut self, value: impl Into<ResultValue>) {
        *self.result = Some(value.into());
    }

    /// Evaluate `query` and optionally require every node to be of `required`
    /// kind.
    ///
    /// Failures are recorded in the diagnostics and returned as typed errors:
    /// [`Error::Query`] from the evaluator, [`Error::WrongNodeKind`] naming
    /// the first offending position.
    pub fn query(&mut self, query: &str, required: Option<NodeKind>) -> Result<NodeSet> {
        let evaluated = self.evaluate(query, required);
        if let Err(e) = &evaluated {
            debug!(command = self.name, %query, error = %e, "query failed");
            self.diagnostics.error(e);
        }
        evaluated
    }

    fn evaluate(&self, query: &str, required: Option<NodeKind>) -> Result<NodeSet> {
        let evaluator = self
            .ctx
            .evaluator()
            .ok_or_else(|| Error::query("no query evaluator configured"))?;
        let nodes = evaluator.evaluate(query, self.database())?;
        if let Some(kind) = required {
            check_kinds(&nodes, kind, self.database())?;
        }
        Ok(nodes)
    }

    /// Execute `child` against the same context and adopt its diagnostics.
    ///
    /// The child runs under this command's lock if it binds the same
    /// database; a mutating child inside a read-only command then fails with
    /// [`Error::NestedConflict`]. A child that finds a different database
    /// (e.g. one opened by this operation) acquires that database's lock
    /// itself.
    pub fn run_nested(&mut self, child: &mut Command) -> bool {
        let ok = child.run(self.ctx, self.database.zip(self.held));
        self.diagnostics.adopt(child.diagnostics.clone());
        ok
    }
}
