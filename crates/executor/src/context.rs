//! Session context shared by every command of one session.
//!
//! The [`Context`] holds the currently open database (if any), the session
//! configuration, the principal the session acts for, and the collaborators
//! commands talk to: query evaluator and serializer.
//!
//! # Usage
//!
//! ```ignore
//! use keystone_executor::{Context, StandardSerializer};
//!
//! let ctx = Context::open_dir(path, SessionOptions::new().info(true))?;
//! ctx.open(Arc::new(my_resource));
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use keystone_concurrency::WaitPolicy;
use keystone_core::{Result, SessionConfig};
use keystone_security::{Principal, SessionOptions};
use parking_lot::RwLock;
use tracing::debug;

use crate::output::{OutputFormat, Serializer, StandardSerializer};
use crate::query::QueryEvaluator;
use crate::resource::{Database, Resource};

/// Resource context of one session.
///
/// `Send + Sync`: commands on several threads execute against the same
/// context by reference.
pub struct Context {
    database: RwLock<Option<Arc<Database>>>,
    config: SessionConfig,
    principal: Principal,
    evaluator: Option<Arc<dyn QueryEvaluator>>,
    serializer: Arc<dyn Serializer>,
    format: OutputFormat,
}

impl Context {
    /// Create a context with nothing open.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            database: RwLock::new(None),
            config,
            principal: Principal::admin(),
            evaluator: None,
            serializer: Arc::new(StandardSerializer),
            format: OutputFormat::default(),
        }
    }

    /// Create a context from a config file with option overrides applied.
    pub fn with_options(config: SessionConfig, options: &SessionOptions) -> Self {
        let mut ctx = Self::new(options.apply(config));
        if let Some(principal) = &options.principal {
            ctx.principal = principal.clone();
        }
        ctx
    }

    /// Load (or create) `keystone.toml` in `dir` and build a context from it.
    pub fn open_dir(dir: &Path, options: SessionOptions) -> Result<Self> {
        let config = SessionConfig::load_or_create(dir)?;
        Ok(Self::with_options(config, &options))
    }

    /// Use `evaluator` for query helper calls.
    pub fn with_evaluator(mut self, evaluator: Arc<dyn QueryEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Use `serializer` in the output phase.
    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Serialize results with `format`.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Act for `principal`.
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = principal;
        self
    }

    /// Bind `resource` as the open database, replacing any previous one.
    ///
    /// Commands already running keep the database they bound.
    pub fn open(&self, resource: Arc<dyn Resource>) -> Arc<Database> {
        let database = Arc::new(Database::new(resource));
        debug!(database = database.name(), "database opened");
        *self.database.write() = Some(Arc::clone(&database));
        database
    }

    /// Unbind the open database.
    pub fn close(&self) -> Option<Arc<Database>> {
        let closed = self.database.write().take();
        if let Some(db) = &closed {
            debug!(database = db.name(), "database closed");
        }
        closed
    }

    /// The open database, if any.
    pub fn database(&self) -> Option<Arc<Database>> {
        self.database.read().clone()
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Principal the session acts for.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Query evaluator, if one is configured.
    pub fn evaluator(&self) -> Option<&Arc<dyn QueryEvaluator>> {
        self.evaluator.as_ref()
    }

    /// Serializer used in the output phase.
    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    /// Serialization options.
    pub fn format(&self) -> &OutputFormat {
        &self.format
    }

    /// How commands wait for the resource lock.
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::from(&self.config.lock)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("database", &self.database.read().as_ref().map(|d| d.name().to_string()))
            .field("config", &self.config)
            .field("principal", &self.principal.name)
            .finish()
    }
}
