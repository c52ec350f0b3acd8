//! Test cases under test and the registry that resolves them by phase.
//!
//! The harness never names a concrete wrapper. Each phase registers a factory
//! in a [`CaseRegistry`]; the harness builds a fresh [`TestCases`] from it for
//! every scenario and runs the case named `test_<fixture name>`.

pub mod compiler_cases;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use simple_test_core::protocol::Slot;
use thiserror::Error;

use crate::compiler::CompilerPath;
use crate::fixtures::{Fixture, FixtureError};

pub use compiler_cases::CompilerCases;

/// Which output stream an assertion looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// A compiler output that did not match the fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    pub case: String,
    pub mode: Slot,
    pub stream: Stream,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} mismatch in {}-mode\n  expected: {:?}\n  actual:   {:?}",
            self.case,
            self.stream,
            self.mode.as_str(),
            self.expected,
            self.actual
        )
    }
}

/// Why a test case did not pass.
///
/// Only [`CaseFailure::Assertion`] is an assertion-class failure; the other
/// variants mean the case could not be carried out at all.
#[derive(Debug, Error)]
pub enum CaseFailure {
    #[error("assertion failed: {0}")]
    Assertion(AssertionFailure),

    #[error("no test case named '{0}'")]
    UnknownCase(String),

    #[error("failed to run compiler '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Fixture(#[from] FixtureError),
}

impl CaseFailure {
    pub fn is_assertion(&self) -> bool {
        matches!(self, CaseFailure::Assertion(_))
    }
}

/// A set of named test cases, one per fixture.
pub trait TestCases {
    /// Names of all cases, `test_<fixture name>`.
    fn case_names(&self) -> Vec<String>;

    /// Run one case.
    fn run_case(&self, name: &str) -> Result<(), CaseFailure>;
}

/// Everything a factory needs to build the cases for one phase.
#[derive(Debug, Clone)]
pub struct CaseContext {
    /// Compiler handle the cases must spawn through.
    pub compiler: CompilerPath,
    /// Arguments passed to the compiler before the input.
    pub sc_args: Vec<String>,
    /// Directory the compiler runs in; simulation paths are relative to it.
    pub working_dir: PathBuf,
    /// Fixtures of the phase.
    pub fixtures: Vec<Fixture>,
}

pub type CaseFactory = dyn Fn(CaseContext) -> Box<dyn TestCases> + Send + Sync;

/// Phase name → test case factory.
#[derive(Default, Clone)]
pub struct CaseRegistry {
    factories: HashMap<String, Arc<CaseFactory>>,
}

impl CaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with [`CompilerCases`] registered for each of `phases`.
    pub fn with_compiler_cases<I, S>(phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for phase in phases {
            registry.register(phase, |ctx| Box::new(CompilerCases::new(ctx)));
        }
        registry
    }

    /// Register (or replace) the factory for `phase`.
    pub fn register<F>(&mut self, phase: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(CaseContext) -> Box<dyn TestCases> + Send + Sync + 'static,
    {
        self.factories.insert(phase.into(), Arc::new(factory));
        self
    }

    /// Factory registered for `phase`.
    pub fn factory(&self, phase: &str) -> Option<Arc<CaseFactory>> {
        self.factories.get(phase).cloned()
    }

    /// Registered phase names, sorted.
    pub fn phases(&self) -> Vec<&str> {
        let mut phases: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        phases.sort_unstable();
        phases
    }
}

impl fmt::Debug for CaseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaseRegistry").field("phases", &self.phases()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always(Result<(), ()>);

    impl TestCases for Always {
        fn case_names(&self) -> Vec<String> {
            vec!["test_x".to_string()]
        }

        fn run_case(&self, name: &str) -> Result<(), CaseFailure> {
            self.0.map_err(|()| CaseFailure::UnknownCase(name.to_string()))
        }
    }

    fn ctx() -> CaseContext {
        CaseContext {
            compiler: CompilerPath::new(),
            sc_args: Vec::new(),
            working_dir: PathBuf::from("."),
            fixtures: Vec::new(),
        }
    }

    #[test]
    fn resolves_registered_phase_only() {
        let mut registry = CaseRegistry::new();
        registry.register("parse", |_| Box::new(Always(Ok(()))));

        let cases = registry.factory("parse").unwrap()(ctx());
        assert_eq!(cases.case_names(), vec!["test_x"]);
        assert!(cases.run_case("test_x").is_ok());
        assert!(registry.factory("lower").is_none());
    }

    #[test]
    fn register_replaces_factory() {
        let mut registry = CaseRegistry::new();
        registry
            .register("parse", |_| Box::new(Always(Ok(()))))
            .register("parse", |_| Box::new(Always(Err(()))));

        let cases = registry.factory("parse").unwrap()(ctx());
        assert!(cases.run_case("test_x").is_err());
        assert_eq!(registry.phases(), vec!["parse"]);
    }

    #[test]
    fn only_assertions_are_assertion_class() {
        let failure = CaseFailure::Assertion(AssertionFailure {
            case: "test_add".into(),
            mode: Slot::Argument,
            stream: Stream::Stdout,
            expected: "3".into(),
            actual: "4".into(),
        });
        assert!(failure.is_assertion());
        assert!(!CaseFailure::UnknownCase("test_add".into()).is_assertion());
    }

    #[test]
    fn assertion_failure_display() {
        let failure = AssertionFailure {
            case: "test_add".into(),
            mode: Slot::Stdin,
            stream: Stream::Stderr,
            expected: "".into(),
            actual: "error: \n".into(),
        };
        insta::assert_snapshot!(failure.to_string(), @r#"
        test_add: stderr mismatch in stdin-mode
          expected: ""
          actual:   "error: \n"
        "#);
    }
}
