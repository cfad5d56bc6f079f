//! Several sessions on several threads sharing one database lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use keystone::{Command, Executor, LockState};
use parking_lot::Mutex;

use crate::common::*;

/// Ordered record of what ran while holding which lock.
#[derive(Default)]
struct Journal {
    entries: Mutex<Vec<String>>,
}

impl Journal {
    fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

#[test]
fn writer_is_excluded_until_output_is_written() {
    let s = default_session();
    let journal = Arc::new(Journal::default());

    let log = Arc::clone(&journal);
    let mut reader = Command::from_fn("snapshot", reading(), move |cx| {
        log.record("read");
        cx.set_result("v1");
        Ok(true)
    });
    assert!(reader.execute(&s.ctx));

    let ctx = Arc::clone(&s.ctx);
    let log = Arc::clone(&journal);
    let writer = thread::spawn(move || {
        let mut cmd = Command::from_fn("update", updating(), move |_| {
            log.record("write");
            Ok(true)
        });
        cmd.execute(&ctx)
    });

    thread::sleep(Duration::from_millis(40));
    journal.record("output");
    reader.write_output(&mut std::io::sink()).unwrap();

    assert!(writer.join().unwrap());
    assert_eq!(journal.entries(), vec!["read", "output", "write"]);
    assert!(s.db.lock().is_free());
}

#[test]
fn writers_are_serialized() {
    let s = default_session();
    let inside = Arc::new(AtomicBool::new(false));
    let executor = Executor::new(Arc::clone(&s.ctx));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let executor = executor.clone();
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                for _ in 0..20 {
                    let flag = Arc::clone(&inside);
                    let mut cmd = Command::from_fn("bump", updating(), move |_| {
                        assert!(!flag.swap(true, Ordering::SeqCst), "two writers inside");
                        thread::yield_now();
                        flag.store(false, Ordering::SeqCst);
                        Ok(true)
                    });
                    executor.execute(&mut cmd).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(s.db.lock().state(), LockState::Free);
}

#[test]
fn failures_on_one_thread_do_not_block_others() {
    let s = default_session();
    let ctx = Arc::clone(&s.ctx);

    let failing = thread::spawn(move || {
        for i in 0..10 {
            let mut cmd = Command::from_fn("fail", updating(), move |cx| {
                if i % 2 == 0 {
                    panic!("crashed on {}", i);
                }
                Ok(cx.report_error("rejected"))
            });
            assert!(!cmd.execute(&ctx));
        }
    });
    failing.join().unwrap();

    let mut cmd = select("0", None);
    assert!(cmd.execute(&s.ctx));
    cmd.write_output(&mut std::io::sink()).unwrap();
    assert!(s.db.lock().is_free());
}
