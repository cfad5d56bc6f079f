//! Sessions configured from `keystone.toml`.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use keystone::{
    Command, Context, Error, LockIntent, Principal, Privilege, SessionOptions, StorageMode,
};
use tempfile::TempDir;

use crate::common::*;

#[test]
fn open_dir_creates_default_config() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::open_dir(dir.path(), SessionOptions::new()).unwrap();

    assert!(dir.path().join("keystone.toml").exists());
    assert_eq!(ctx.config().mode, StorageMode::Persistent);
    assert!(!ctx.config().info);
    assert!(ctx.principal().has(Privilege::Admin));
}

#[test]
fn config_file_mode_applies_to_commands() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("keystone.toml"),
        "mode = \"main-memory\"\ninfo = true\n",
    )
    .unwrap();
    let ctx = Context::open_dir(dir.path(), SessionOptions::new()).unwrap();
    ctx.open(Arc::new(Document::sample()));

    let mut cmd = Command::from_fn("add", updating(), |_| Ok(true));
    assert!(!cmd.execute(&ctx));
    assert_eq!(
        cmd.diagnostics_text(),
        "updates are not allowed in main-memory mode\n"
    );

    let mut cmd = Command::from_fn("info", reading(), |cx| Ok(cx.report_info("4 nodes")));
    assert!(cmd.execute(&ctx));
    assert_eq!(cmd.diagnostics_text(), "4 nodes\n");
}

#[test]
fn options_override_config_file() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("keystone.toml"), "mode = \"table-memory\"\n").unwrap();
    let options = SessionOptions::new()
        .mode(StorageMode::Persistent)
        .lock_timeout(Duration::from_millis(20));
    let ctx = Context::open_dir(dir.path(), options).unwrap();
    let db = ctx.open(Arc::new(Document::sample()));

    let mut cmd = Command::from_fn("add", updating(), |_| Ok(true));
    assert!(cmd.execute(&ctx));

    let held = db.lock().try_acquire(LockIntent::Read).unwrap();
    assert!(!cmd.execute(&ctx));
    assert!(matches!(cmd.error(), Some(Error::LockTimeout { .. })));
    drop(held);
}

#[test]
fn invalid_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("keystone.toml"),
        "[lock]\nwait = \"polling\"\npoll_interval_ms = 0\n",
    )
    .unwrap();

    let err = Context::open_dir(dir.path(), SessionOptions::new()).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
    assert!(err.to_string().contains("poll_interval_ms"));
}

#[test]
fn guest_principal_from_options() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let options = SessionOptions::new().principal(Principal::user("guest"));
    let ctx = Context::open_dir(dir.path(), options).unwrap();
    ctx.open(Arc::new(Document::sample()));

    let mut cmd = Command::from_fn("drop", updating(), |_| Ok(true)).requires(Privilege::Admin);
    assert!(!cmd.execute(&ctx));
    assert!(matches!(cmd.error(), Some(Error::PermissionDenied { .. })));
}
