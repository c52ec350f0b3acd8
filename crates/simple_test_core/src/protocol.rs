//! File-system protocol between the harness (controller) and the fake compiler (agent).
//!
//! ## Layout
//!
//! A channel directory holds the fake compiler executable plus four files per
//! invocation slot:
//!
//! | kind        | slot 0 (argument-mode) | slot 1 (stdin-mode) |
//! |-------------|------------------------|---------------------|
//! | arguments   | `arguments`            | `arguments.2`       |
//! | stdin       | `stdin`                | `stdin.2`           |
//! | stdout      | `stdout`               | `stdout.2`          |
//! | stderr      | `stderr`               | `stderr.2`          |
//!
//! `arguments`/`stdin` are written by the agent, `stdout`/`stderr` by the controller.

use std::fmt;

/// Environment variable naming the compiler executable.
pub const COMPILER_ENV_VAR: &str = "SC";

/// Environment variable pointing at the `sc-fake` executable to install.
pub const FAKE_COMPILER_ENV_VAR: &str = "SIMPLE_TEST_FAKE_SC";

/// Compiler name used when neither an override nor [`COMPILER_ENV_VAR`] is set.
pub const DEFAULT_COMPILER: &str = "sc";

/// Name of the built fake compiler binary.
pub const FAKE_COMPILER_BIN: &str = "sc-fake";

/// Stderr text a compiler emits for an erroneous input.
pub const ERROR_MARKER: &str = "error: \n";

/// Prefix that classifies compiler stderr as an error report.
pub const ERROR_PREFIX: &str = "error:";

/// Prefix of test case names; `test_<fixture name>`.
pub const CASE_PREFIX: &str = "test_";

/// One of the two invocation positions within a single fixture run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    /// First invocation: the simulation file is passed as a path argument.
    Argument,
    /// Second invocation: the simulation file is piped through stdin.
    Stdin,
}

impl Slot {
    /// Both slots, in invocation order.
    pub const ALL: [Slot; 2] = [Slot::Argument, Slot::Stdin];

    pub fn index(self) -> usize {
        match self {
            Slot::Argument => 0,
            Slot::Stdin => 1,
        }
    }

    /// The other slot.
    pub fn other(self) -> Slot {
        match self {
            Slot::Argument => Slot::Stdin,
            Slot::Stdin => Slot::Argument,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Argument => "argument",
            Slot::Stdin => "stdin",
        }
    }

    /// File name for `kind` in this slot.
    pub fn file_name(self, kind: ChannelFile) -> &'static str {
        match (kind, self) {
            (ChannelFile::Arguments, Slot::Argument) => "arguments",
            (ChannelFile::Arguments, Slot::Stdin) => "arguments.2",
            (ChannelFile::Stdin, Slot::Argument) => "stdin",
            (ChannelFile::Stdin, Slot::Stdin) => "stdin.2",
            (ChannelFile::Stdout, Slot::Argument) => "stdout",
            (ChannelFile::Stdout, Slot::Stdin) => "stdout.2",
            (ChannelFile::Stderr, Slot::Argument) => "stderr",
            (ChannelFile::Stderr, Slot::Stdin) => "stderr.2",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.as_str())
    }
}

/// The four per-slot files of a channel directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelFile {
    /// JSON array of the arguments the agent received. Agent-written.
    Arguments,
    /// Raw stdin the agent received. Agent-written.
    Stdin,
    /// Programmed stdout. Controller-written.
    Stdout,
    /// Programmed stderr. Controller-written.
    Stderr,
}

impl ChannelFile {
    pub const ALL: [ChannelFile; 4] = [
        ChannelFile::Arguments,
        ChannelFile::Stdin,
        ChannelFile::Stdout,
        ChannelFile::Stderr,
    ];

    /// Files that make up an invocation record.
    pub const RECORD: [ChannelFile; 2] = [ChannelFile::Arguments, ChannelFile::Stdin];
}

/// File name the fake compiler is installed under inside a channel directory.
pub fn installed_compiler_name() -> String {
    format!("{}{}", DEFAULT_COMPILER, std::env::consts::EXE_SUFFIX)
}

/// Stderr a compiler is expected to produce for a fixture.
pub fn expected_stderr(has_error: bool) -> &'static str {
    if has_error { ERROR_MARKER } else { "" }
}

/// Whether compiler stderr reports an error.
pub fn reports_error(stderr: &str) -> bool {
    stderr.starts_with(ERROR_PREFIX)
}

/// Test case name for a fixture.
pub fn case_name(fixture_name: &str) -> String {
    format!("{}{}", CASE_PREFIX, fixture_name)
}
