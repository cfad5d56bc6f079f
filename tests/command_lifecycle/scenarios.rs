//! The reference scenarios, driven through the public API.

use std::sync::Arc;

use keystone::{
    Command, Error, ErrorKind, Executor, LockState, NodeKind, SessionConfig, StorageMode,
};

use crate::common::*;

#[test]
fn read_only_command_on_persistent_database() {
    let s = default_session();
    let db = Arc::clone(&s.db);
    let mut cmd = Command::from_fn("count", reading(), move |cx| {
        assert_eq!(db.lock().state(), LockState::Read);
        let size = cx.resource()?.size();
        cx.set_result(size.to_string());
        Ok(true)
    });

    assert!(cmd.execute(&s.ctx));
    assert!(cmd.diagnostics().is_empty());

    let mut out = Vec::new();
    cmd.write_output(&mut out).unwrap();
    assert_eq!(out, b"4");
    assert!(s.db.lock().is_free());
}

#[test]
fn update_rejected_in_table_memory_mode() {
    let s = session(SessionConfig {
        mode: StorageMode::TableMemory,
        ..SessionConfig::default()
    });
    let mut cmd = Command::from_fn("rename", updating(), |_| -> keystone::Result<bool> {
        panic!("operation must not run")
    });

    assert!(!cmd.execute(&s.ctx));
    assert_eq!(
        cmd.diagnostics_text(),
        "updates are not allowed in table-memory mode\n"
    );
    assert_eq!(cmd.error().map(Error::kind), Some(ErrorKind::Precondition));
    assert!(s.db.lock().is_free());
}

#[test]
fn exhaustion_after_partial_result() {
    let s = default_session();
    let mut cmd = Command::from_fn("export", reading(), |cx| {
        cx.set_result("partial");
        let mut pages: Vec<u64> = Vec::new();
        pages.try_reserve(usize::MAX)?;
        Ok(true)
    });

    assert!(!cmd.execute(&s.ctx));
    assert!(s.db.lock().is_free());
    assert_eq!(s.document.reclaimed(), 1);
    assert_eq!(cmd.diagnostics_text(), "out of main memory\n");
    assert_eq!(cmd.error().map(Error::kind), Some(ErrorKind::Exhaustion));

    let mut out = Vec::new();
    cmd.write_output(&mut out).unwrap();
    assert!(out.is_empty());
}

#[test]
fn node_kind_check_names_first_offender() {
    let s = default_session();
    let mut cmd = select("1, 2, 3", Some(NodeKind::Element));

    assert!(!cmd.execute(&s.ctx));
    assert!(s.db.lock().is_free());
    assert!(matches!(
        cmd.error(),
        Some(Error::WrongNodeKind {
            position: 1,
            expected: NodeKind::Element,
            actual: NodeKind::Text,
        })
    ));
    assert_eq!(
        cmd.diagnostics_text(),
        "result node at position 1 is text, expected element\n"
    );
}

#[test]
fn executor_reports_failures_as_errors() {
    let s = default_session();
    let executor = Executor::new(Arc::clone(&s.ctx));
    let mut out = Vec::new();

    executor.run(&mut select("1,3", Some(NodeKind::Element)), &mut out).unwrap();
    assert_eq!(out, b"1\n3");

    let err = executor.run(&mut select("x", None), &mut out).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.to_string(), "unexpected token 'x'");
    assert_eq!(out, b"1\n3");
    assert!(s.db.lock().is_free());
}

#[test]
fn closing_the_database_fails_later_commands() {
    let s = default_session();
    let mut cmd = select("0", None);
    assert!(cmd.execute(&s.ctx));
    cmd.write_output(&mut std::io::sink()).unwrap();

    s.ctx.close();
    assert!(!cmd.execute(&s.ctx));
    assert!(matches!(cmd.error(), Some(Error::NoResource)));
}
