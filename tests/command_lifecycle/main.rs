//! Command Lifecycle Tests
//!
//! End-to-end tests through the public `keystone` API:
//! - scenarios - read, update rejection, memory exhaustion, node kind checks
//! - concurrency - many sessions sharing one database lock
//! - config - sessions built from `keystone.toml` plus option overrides
//! - model - random command sequences always leave the lock free

mod common;

mod concurrency;
mod config;
mod model;
mod scenarios;
