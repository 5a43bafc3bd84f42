//! Reusable oracles.

use cloakline_core::{Phase, SessionAction};

use crate::scenario::{OracleFn, World};

/// Session ended in `phase`.
pub fn phase_is(phase: Phase) -> OracleFn {
    Box::new(move |world: &World| {
        if world.phase() == phase {
            Ok(())
        } else {
            Err(format!("expected phase {phase:?}, got {:?}", world.phase()))
        }
    })
}

/// The server never sent anything the session rejected.
pub fn no_violations() -> OracleFn {
    Box::new(|world: &World| match world.violations() {
        [] => Ok(()),
        violations => Err(format!("session rejected server events: {violations:?}")),
    })
}

/// No error was shown to the user.
pub fn no_errors() -> OracleFn {
    Box::new(|world: &World| match world.errors().as_slice() {
        [] => Ok(()),
        errors => Err(format!("errors shown: {errors:?}")),
    })
}

/// `username` is in the presence list.
pub fn online(username: &'static str) -> OracleFn {
    Box::new(move |world: &World| {
        if world.session().presence().find(username).is_some() {
            Ok(())
        } else {
            Err(format!("{username} should be online"))
        }
    })
}

/// `username` is not in the presence list.
pub fn offline(username: &'static str) -> OracleFn {
    Box::new(move |world: &World| match world.session().presence().find(username) {
        None => Ok(()),
        Some(_) => Err(format!("{username} should be offline")),
    })
}

/// Messages delivered to the live view, as plaintext, equal `expected`.
pub fn live_bodies(expected: &'static [&'static str]) -> OracleFn {
    Box::new(move |world: &World| {
        let delivered: Vec<&str> = world
            .actions()
            .iter()
            .filter_map(|a| match a {
                SessionAction::DeliverMessage(m) => Some(m.body.as_str()),
                _ => None,
            })
            .collect();
        if delivered == expected {
            Ok(())
        } else {
            Err(format!("expected live messages {expected:?}, got {delivered:?}"))
        }
    })
}

/// Every oracle must pass; the first failure is reported.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world: &World| oracles.iter().try_for_each(|oracle| oracle(world)))
}
