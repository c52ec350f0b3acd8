//! The five scenarios run per fixture and the output corruption they use.

use std::fmt;

use simple_test_core::protocol::{Slot, expected_stderr};

use crate::channel::ProgrammedOutput;
use crate::fixtures::PhaseFile;

/// One sub-test of a fixture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Both modes get the fixture's true output; the wrapper must pass.
    Good,
    /// Only `mode` gets a corrupted stdout; the wrapper must fail.
    BadStdout(Slot),
    /// Only `mode` gets the opposite stderr marker; the wrapper must fail.
    BadStderr(Slot),
}

impl Scenario {
    /// Scenarios in the order they run for each fixture.
    pub const SEQUENCE: [Scenario; 5] = [
        Scenario::Good,
        Scenario::BadStdout(Slot::Argument),
        Scenario::BadStderr(Slot::Argument),
        Scenario::BadStdout(Slot::Stdin),
        Scenario::BadStderr(Slot::Stdin),
    ];

    /// Whether the wrapper is expected to pass.
    pub fn expects_pass(self) -> bool {
        matches!(self, Scenario::Good)
    }

    /// Slots whose invocation records must exist and match afterwards.
    ///
    /// A wrapper that fails on a corrupted mode may stop before reaching the
    /// other one, so only the corrupted mode's record is required.
    pub fn checked_slots(self) -> &'static [Slot] {
        match self {
            Scenario::Good => &Slot::ALL,
            Scenario::BadStdout(Slot::Argument) | Scenario::BadStderr(Slot::Argument) => &[Slot::Argument],
            Scenario::BadStdout(Slot::Stdin) | Scenario::BadStderr(Slot::Stdin) => &[Slot::Stdin],
        }
    }

    /// The mode whose output this scenario corrupts.
    pub fn corrupted_slot(self) -> Option<Slot> {
        match self {
            Scenario::Good => None,
            Scenario::BadStdout(slot) | Scenario::BadStderr(slot) => Some(slot),
        }
    }

    /// Responses to program for (argument-mode, stdin-mode).
    pub fn outputs(self, phase: &PhaseFile) -> (ProgrammedOutput, ProgrammedOutput) {
        let good = ProgrammedOutput::new(phase.stdout.clone(), expected_stderr(phase.has_error));

        let (corrupted_slot, bad) = match self {
            Scenario::Good => return (good.clone(), good),
            Scenario::BadStdout(slot) => {
                let stdout = corrupt_first_char(&phase.stdout);
                (slot, ProgrammedOutput::new(stdout, good.stderr.clone()))
            }
            Scenario::BadStderr(slot) => {
                let stderr = expected_stderr(!phase.has_error);
                (slot, ProgrammedOutput::new(phase.stdout.clone(), stderr))
            }
        };

        match corrupted_slot {
            Slot::Argument => (bad, good),
            Slot::Stdin => (good, bad),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::Good => write!(f, "good-output"),
            Scenario::BadStdout(slot) => write!(f, "bad-stdout[{}]", slot.as_str()),
            Scenario::BadStderr(slot) => write!(f, "bad-stderr[{}]", slot.as_str()),
        }
    }
}

/// Advance the first character one code point, modulo 128; the rest is kept.
///
/// The result always differs from the input. An empty string is treated as a
/// leading NUL and becomes `"\u{1}"`.
pub fn corrupt_first_char(stdout: &str) -> String {
    let mut chars = stdout.chars();
    let first = chars.next().map_or(0, u32::from);
    let advanced = char::from(((first + 1) % 128) as u8);

    let mut corrupted = String::with_capacity(stdout.len());
    corrupted.push(advanced);
    corrupted.push_str(chars.as_str());
    corrupted
}
