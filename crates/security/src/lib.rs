//! Privileges and session options for Keystone.
//!
//! This crate provides the [`Principal`] and [`Privilege`] types used by the
//! privilege gate in front of administrative commands, and [`SessionOptions`],
//! which overrides the values read from `keystone.toml`.

#![warn(missing_docs)]

use std::fmt;
use std::time::Duration;

use keystone_core::{LockWait, SessionConfig, StorageMode};
use serde::{Deserialize, Serialize};

/// Privilege a command may require before it is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Privilege {
    /// Any caller (default).
    #[default]
    None,
    /// Administrators only: user management, job services.
    Admin,
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Privilege::None => f.write_str("none"),
            Privilege::Admin => f.write_str("admin"),
        }
    }
}

/// The caller a session acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// User name.
    pub name: String,
    /// Highest privilege the user holds.
    pub privilege: Privilege,
}

/// Name of the built-in administrator.
pub const ADMIN: &str = "admin";

impl Principal {
    /// A user without special privileges.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            privilege: Privilege::None,
        }
    }

    /// The built-in administrator.
    pub fn admin() -> Self {
        Self {
            name: ADMIN.to_string(),
            privilege: Privilege::Admin,
        }
    }

    /// Returns `true` if this principal holds `required`.
    pub fn has(&self, required: Privilege) -> bool {
        self.privilege >= required
    }
}

impl Default for Principal {
    fn default() -> Self {
        Self::admin()
    }
}

/// Options for opening a session.
///
/// Any field set to `Some` overrides the corresponding value in
/// `keystone.toml`.
///
/// ```ignore
/// use keystone_security::SessionOptions;
/// use keystone_core::StorageMode;
///
/// let opts = SessionOptions::new()
///     .mode(StorageMode::MainMemory)
///     .info(true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Override the storage mode.
    pub mode: Option<StorageMode>,
    /// Override the info flag.
    pub info: Option<bool>,
    /// Override the lock wait strategy.
    pub lock_wait: Option<LockWait>,
    /// Override the polling interval in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Override the lock timeout in milliseconds.
    pub lock_timeout_ms: Option<u64>,
    /// Principal the session acts for. `None` means the administrator.
    pub principal: Option<Principal>,
}

impl SessionOptions {
    /// Create options that override nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage mode.
    pub fn mode(mut self, mode: StorageMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Enable or disable info reports.
    pub fn info(mut self, enabled: bool) -> Self {
        self.info = Some(enabled);
        self
    }

    /// Wait for the lock by polling at `interval`.
    pub fn polling(mut self, interval: Duration) -> Self {
        self.lock_wait = Some(LockWait::Polling);
        self.poll_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    /// Give up waiting for the lock after `timeout`.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Act for `principal`.
    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Apply these overrides to a config loaded from file.
    pub fn apply(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(info) = self.info {
            config.info = info;
        }
        if let Some(wait) = self.lock_wait {
            config.lock.wait = wait;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.lock.poll_interval_ms = ms;
        }
        if let Some(ms) = self.lock_timeout_ms {
            config.lock.timeout_ms = Some(ms);
        }
        config
    }
}
