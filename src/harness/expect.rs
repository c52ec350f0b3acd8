//! Expected invocation records derived from a fixture.

use std::path::Path;

use simple_test_core::protocol::Slot;

use crate::channel::InvocationRecord;
use crate::fixtures::{Fixture, FixtureError};

/// What the wrapper should have sent the compiler in each slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedCalls {
    argument: InvocationRecord,
    stdin: InvocationRecord,
}

/// Result of comparing a captured record with its slot's expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallCheck {
    Matches,
    /// The record is what the *other* slot should hold: the wrapper called
    /// the modes in the wrong order.
    OutOfOrder,
    Differs,
}

impl ExpectedCalls {
    /// Argument-mode: `sc_args + [relative sim path]` with empty stdin.
    /// Stdin-mode: `sc_args` with the sim file's contents on stdin.
    pub fn derive(fixture: &Fixture, sc_args: &[String], working_dir: &Path) -> Result<Self, FixtureError> {
        let sim_path = fixture.relative_sim_path(working_dir)?;

        let mut argument_args = sc_args.to_vec();
        argument_args.push(sim_path.to_string_lossy().into_owned());

        Ok(Self {
            argument: InvocationRecord::new(argument_args, ""),
            stdin: InvocationRecord::new(sc_args.to_vec(), fixture.read_sim()?),
        })
    }

    pub fn for_slot(&self, slot: Slot) -> &InvocationRecord {
        match slot {
            Slot::Argument => &self.argument,
            Slot::Stdin => &self.stdin,
        }
    }

    pub fn check(&self, slot: Slot, actual: &InvocationRecord) -> CallCheck {
        if actual == self.for_slot(slot) {
            CallCheck::Matches
        } else if actual == self.for_slot(slot.other()) {
            CallCheck::OutOfOrder
        } else {
            CallCheck::Differs
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::fixtures::PhaseFile;

    fn sim_fixture(dir: &Path, contents: &str) -> Fixture {
        let sim = dir.join("add.sim");
        fs::write(&sim, contents).unwrap();
        Fixture {
            name: "add".into(),
            phase_name: "parse".into(),
            sim_file_path: sim,
            phase_file: PhaseFile {
                stdout: "3".into(),
                has_error: false,
            },
        }
    }

    fn base_args() -> Vec<String> {
        vec!["--phase".into(), "parse".into()]
    }

    #[test]
    fn derives_both_modes() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = sim_fixture(dir.path(), "1 + 2");

        let expected = ExpectedCalls::derive(&fixture, &base_args(), dir.path()).unwrap();

        assert_eq!(
            expected.for_slot(Slot::Argument),
            &InvocationRecord::new(vec!["--phase".into(), "parse".into(), "add.sim".into()], "")
        );
        assert_eq!(expected.for_slot(Slot::Stdin), &InvocationRecord::new(base_args(), "1 + 2"));
    }

    #[test]
    fn swapped_records_are_out_of_order() {
        let dir = tempfile::tempdir().unwrap();
        let fixture = sim_fixture(dir.path(), "1 + 2");
        let expected = ExpectedCalls::derive(&fixture, &base_args(), dir.path()).unwrap();

        let stdin_call = expected.for_slot(Slot::Stdin).clone();
        assert_eq!(expected.check(Slot::Stdin, &stdin_call), CallCheck::Matches);
        assert_eq!(expected.check(Slot::Argument, &stdin_call), CallCheck::OutOfOrder);
        assert_eq!(
            expected.check(Slot::Argument, &InvocationRecord::new(base_args(), "")),
            CallCheck::Differs
        );
    }

    #[test]
    fn sim_outside_working_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let fixture = sim_fixture(dir.path(), "1");

        assert!(matches!(
            ExpectedCalls::derive(&fixture, &[], other.path()),
            Err(FixtureError::OutsideWorkingDir { .. })
        ));
    }
}
