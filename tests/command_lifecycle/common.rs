//! Shared fixtures for the command lifecycle suite.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use keystone::{
    Capabilities, Command, Context, Database, NodeId, NodeKind, NodeSet, QueryError, Resource,
    SessionConfig,
};

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// In-memory document: node `i` has kind `kinds[i]`.
pub struct Document {
    kinds: Vec<NodeKind>,
    reclaimed: AtomicUsize,
}

impl Document {
    pub fn new(kinds: Vec<NodeKind>) -> Self {
        Self {
            kinds,
            reclaimed: AtomicUsize::new(0),
        }
    }

    /// document, element, text, element
    pub fn sample() -> Self {
        Self::new(vec![
            NodeKind::Document,
            NodeKind::Element,
            NodeKind::Text,
            NodeKind::Element,
        ])
    }

    pub fn reclaimed(&self) -> usize {
        self.reclaimed.load(Ordering::SeqCst)
    }
}

impl Resource for Document {
    fn name(&self) -> &str {
        "sample"
    }

    fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.kinds.get(node.0 as usize).copied()
    }

    fn size(&self) -> u64 {
        self.kinds.len() as u64
    }

    fn reclaim(&self) {
        self.reclaimed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Queries are comma-separated node ids.
pub fn id_list(query: &str, _: Option<&Database>) -> Result<NodeSet, QueryError> {
    query
        .split(',')
        .map(|id| {
            id.trim()
                .parse::<u64>()
                .map(NodeId)
                .map_err(|_| QueryError::new(format!("unexpected token '{}'", id.trim())))
        })
        .collect()
}

pub struct Session {
    pub ctx: Arc<Context>,
    pub document: Arc<Document>,
    pub db: Arc<Database>,
}

pub fn session(config: SessionConfig) -> Session {
    init_tracing();
    let ctx = Context::new(config).with_evaluator(Arc::new(id_list));
    let document = Arc::new(Document::sample());
    let db = ctx.open(document.clone());
    Session {
        ctx: Arc::new(ctx),
        document,
        db,
    }
}

pub fn default_session() -> Session {
    session(SessionConfig::default())
}

pub fn reading() -> Capabilities {
    Capabilities::NEEDS_RESOURCE | Capabilities::PRODUCES_OUTPUT
}

pub fn updating() -> Capabilities {
    Capabilities::NEEDS_RESOURCE | Capabilities::MUTATES_RESOURCE
}

/// Command that lists the nodes its query selects, all of kind `required`.
pub fn select(query: &'static str, required: Option<NodeKind>) -> Command {
    Command::from_fn("select", reading(), move |cx| {
        let nodes = cx.query(query, required)?;
        cx.set_result(nodes);
        Ok(true)
    })
    .with_args([query])
}
