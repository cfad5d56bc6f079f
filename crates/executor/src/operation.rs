//! The work a command performs once the execution core has admitted it.

use keystone_core::Result;

use crate::command::Invocation;

/// Operation run by a [`Command`](crate::Command) while it holds the lock.
///
/// Return `Ok(true)` on success. Report an expected failure with
/// `Ok(cx.report_error(..))`, which records the message and yields `false`,
/// or return `Err(..)` and let the execution core record it. Panics are
/// contained by the core and reported as internal errors.
///
/// Closures implement this trait; [`Command::from_fn`](crate::Command::from_fn)
/// takes one directly:
///
/// ```ignore
/// let cmd = Command::from_fn("items", caps, |cx| {
///     let nodes = cx.query("//item", Some(NodeKind::Element))?;
///     cx.set_result(nodes);
///     Ok(true)
/// });
/// ```
pub trait Operation: Send {
    /// Perform the work.
    fn perform(&mut self, cx: &mut Invocation<'_>) -> Result<bool>;
}

impl<F> Operation for F
where
    F: FnMut(&mut Invocation<'_>) -> Result<bool> + Send,
{
    fn perform(&mut self, cx: &mut Invocation<'_>) -> Result<bool> {
        self(cx)
    }
}
