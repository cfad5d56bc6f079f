//! The shared database resource and the lock attached to it.

use std::fmt;
use std::sync::Arc;

use keystone_concurrency::ResourceLock;
use keystone_core::{NodeId, NodeKind};

/// Storage-layer view of an open database, as far as the command core needs it.
///
/// The storage engine itself lives outside this crate; commands reach it
/// through their operation code and only use this trait for result checks
/// and memory pressure handling.
pub trait Resource: Send + Sync {
    /// Database name.
    fn name(&self) -> &str;

    /// Kind of the node at `node`, or `None` if it does not exist.
    fn kind(&self, node: NodeId) -> Option<NodeKind>;

    /// Number of stored nodes.
    fn size(&self) -> u64;

    /// Drop caches and other reclaimable memory. Called after an operation
    /// ran out of memory.
    fn reclaim(&self) {}
}

/// An open database: the resource plus its lock.
pub struct Database {
    resource: Arc<dyn Resource>,
    lock: ResourceLock,
}

impl Database {
    /// Wrap a resource with a fresh, free lock.
    pub fn new(resource: Arc<dyn Resource>) -> Self {
        Self {
            resource,
            lock: ResourceLock::new(),
        }
    }

    /// Database name.
    pub fn name(&self) -> &str {
        self.resource.name()
    }

    /// The underlying resource.
    pub fn resource(&self) -> &dyn Resource {
        self.resource.as_ref()
    }

    /// The lock gating access to this database.
    pub fn lock(&self) -> &ResourceLock {
        &self.lock
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name())
            .field("lock", &self.lock.state())
            .finish()
    }
}
