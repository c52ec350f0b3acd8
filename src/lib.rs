#![forbid(unsafe_code)]
//! Phase test harness for the simulation compiler
//!
//! Checks that a phase's compiler wrapper calls the compiler correctly and
//! notices when its output is wrong. The real compiler is replaced by a fake
//! (`sc-fake`) that is driven through files in a private temporary directory:
//! the harness programs what the fake prints, the wrapper runs it, and the
//! harness reads back the arguments and stdin each call received.
//!
//! ## Modules
//!
//! - [`channel`] - Fake compiler control channel and the agent behind `sc-fake`
//! - [`harness`] - Scenario driver, expectations and reporting
//! - [`cases`] - Test cases under test and the phase registry
//! - [`fixtures`] - Fixture discovery and phase files
//! - [`compiler`] - Compiler path indirection
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cases;
pub mod channel;
pub mod cli;
pub mod compiler;
pub mod fixtures;
pub mod harness;
pub mod version;

pub use cases::{CaseRegistry, CompilerCases, TestCases};
pub use channel::{FakeCompilerChannel, InvocationRecord, ProgrammedOutput};
pub use compiler::CompilerPath;
pub use fixtures::{Fixture, PhaseFile, discover_fixtures};
pub use harness::{HarnessConfig, HarnessError, HarnessReport, PhaseHarness};
