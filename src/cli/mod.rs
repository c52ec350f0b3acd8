//! CLI module for the phase test harness
//!
//! ## Commands
//!
//! - `list` - List discovered fixtures
//! - `check --phase <P>` - Check a phase's compiler cases against the fake compiler
//! - `run --phase <P>` - Run a phase's fixtures against the real compiler
//!
//! Arguments after `--` are passed to the compiler before the input.
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use crate::version::SIMPLE_TEST_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// At least one scenario or case failed.
    pub const FAILURE: ExitCode = ExitCode(1);
    /// The run could not be carried out (channel, fixture or order errors).
    pub const ERROR: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }

    /// Create an error for a run that could not complete (exit code 2).
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::ERROR)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Phase test harness for the simulation compiler
#[derive(Parser, Debug)]
#[command(name = "simple-test")]
#[command(version = SIMPLE_TEST_VERSION)]
#[command(about = "Phase test harness for the simulation compiler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by `check` and `run`.
#[derive(Args, Debug, Clone)]
pub struct PhaseArgs {
    /// Phase whose fixtures are run
    #[arg(long, value_name = "PHASE")]
    pub phase: String,
    /// Fixture directory
    #[arg(long, value_name = "DIR", default_value = "fixtures")]
    pub fixtures: PathBuf,
    /// Directory the compiler runs in; fixtures must live under it
    #[arg(long = "working-dir", value_name = "DIR", default_value = ".")]
    pub working_dir: PathBuf,
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
    /// Stop on first failure
    #[arg(short = 'x', long = "exitfirst")]
    pub stop_on_fail: bool,
    /// Arguments passed to the compiler before the input
    #[arg(last = true, value_name = "SC_ARGS")]
    pub sc_args: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List discovered fixtures
    List {
        /// Fixture directory
        #[arg(long, value_name = "DIR", default_value = "fixtures")]
        fixtures: PathBuf,
        /// Only list fixtures of this phase
        #[arg(long, value_name = "PHASE")]
        phase: Option<String>,
    },

    /// Check the phase's compiler cases against the fake compiler
    Check {
        #[command(flatten)]
        phase: PhaseArgs,
        /// Fake compiler executable (default: located next to this binary)
        #[arg(long = "fake-compiler", value_name = "PATH")]
        fake_compiler: Option<PathBuf>,
    },

    /// Run the phase's fixtures against the real compiler
    Run {
        #[command(flatten)]
        phase: PhaseArgs,
        /// Compiler executable (default: $SC, then `sc` on PATH)
        #[arg(long, value_name = "PATH")]
        compiler: Option<PathBuf>,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::List { fixtures, phase } => commands::list_fixtures(&fixtures, phase.as_deref()),
        Command::Check { phase, fake_compiler } => commands::check_phase(&phase, fake_compiler),
        Command::Run { phase, compiler } => commands::run_phase(&phase, compiler),
    }
}

// ============================================================================
// Tests
// ============================================================================
