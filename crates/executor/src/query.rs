//! Boundary to the query evaluator.
//!
//! The evaluator (parser, optimizer, runtime) is an external collaborator.
//! Commands reach it through [`Invocation::query`](crate::Invocation::query),
//! which converts evaluator failures into [`Error::Query`] and optionally
//! checks the kind of every result node.

use keystone_core::{Error, NodeKind, NodeSet, Result};

use crate::resource::Database;

/// Failure reported by the query evaluator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    /// Evaluator message text.
    pub message: String,
}

impl QueryError {
    /// Create a query error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query {
            message: err.message,
        }
    }
}

/// Evaluates query text to an ordered node sequence.
pub trait QueryEvaluator: Send + Sync {
    /// Evaluate `query` against `database` (absent if nothing is open).
    fn evaluate(
        &self,
        query: &str,
        database: Option<&Database>,
    ) -> std::result::Result<NodeSet, QueryError>;
}

impl<F> QueryEvaluator for F
where
    F: Fn(&str, Option<&Database>) -> std::result::Result<NodeSet, QueryError> + Send + Sync,
{
    fn evaluate(
        &self,
        query: &str,
        database: Option<&Database>,
    ) -> std::result::Result<NodeSet, QueryError> {
        self(query, database)
    }
}

/// Check that every node of `nodes` has kind `required`.
///
/// Fails on the first offending position. Kinds are looked up in the open
/// database, so a missing database is a [`Error::NoResource`] failure.
pub(crate) fn check_kinds(
    nodes: &NodeSet,
    required: NodeKind,
    database: Option<&Database>,
) -> Result<()> {
    let database = database.ok_or(Error::NoResource)?;
    let resource = database.resource();
    for (position, node) in nodes.iter().enumerate() {
        match resource.kind(node) {
            Some(kind) if kind == required => {}
            Some(actual) => {
                return Err(Error::WrongNodeKind {
                    position,
                    expected: required,
                    actual,
                })
            }
            None => {
                return Err(Error::invalid_argument(format!(
                    "result node {} at position {} does not exist",
                    node, position
                )))
            }
        }
    }
    Ok(())
}
