//! Random command sequences: whatever the outcome, the lock ends up free.

use keystone::{Capabilities, Command, Error, LockState};
use proptest::prelude::*;

use crate::common::*;

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Succeed,
    Report,
    Invalid,
    Exhausted,
    Panic,
}

fn outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Succeed),
        Just(Outcome::Report),
        Just(Outcome::Invalid),
        Just(Outcome::Exhausted),
        Just(Outcome::Panic),
    ]
}

fn build(mutates: bool, produces: bool, outcome: Outcome) -> Command {
    let mut caps = Capabilities::NEEDS_RESOURCE;
    caps.set(Capabilities::MUTATES_RESOURCE, mutates);
    caps.set(Capabilities::PRODUCES_OUTPUT, produces);
    Command::from_fn("step", caps, move |cx| {
        cx.set_result("item");
        match outcome {
            Outcome::Succeed => Ok(true),
            Outcome::Report => Ok(cx.report_error("refused")),
            Outcome::Invalid => Err(Error::invalid_argument("bad step")),
            Outcome::Exhausted => Err(Error::OutOfMemory),
            Outcome::Panic => panic!("step panicked"),
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn lock_is_free_after_every_command(
        steps in prop::collection::vec((any::<bool>(), any::<bool>(), outcome()), 1..20)
    ) {
        let s = default_session();
        for (mutates, produces, outcome) in steps {
            let mut cmd = build(mutates, produces, outcome);
            let ok = cmd.execute(&s.ctx);
            prop_assert_eq!(ok, matches!(outcome, Outcome::Succeed));

            let held = ok && produces;
            prop_assert_eq!(cmd.holds_lock(), held);
            if held {
                let expected = if mutates { LockState::Write } else { LockState::Read };
                prop_assert_eq!(s.db.lock().state(), expected);
            }

            let mut out = Vec::new();
            cmd.write_output(&mut out).unwrap();
            prop_assert_eq!(out.is_empty(), !held);
            prop_assert_eq!(s.db.lock().state(), LockState::Free);
        }
        prop_assert!(s.ctx.database().is_some());
    }
}
