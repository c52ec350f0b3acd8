//! Harness results and reporting.
//!
//! ## HarnessReporter Trait
//!
//! The harness reports progress through [`HarnessReporter`] so the CLI can
//! print pytest-style output while tests stay silent.

use std::fmt;
use std::time::Duration;

use simple_test_core::protocol::Slot;

use super::scenario::Scenario;
use crate::cases::AssertionFailure;
use crate::channel::InvocationRecord;
use crate::fixtures::Fixture;

/// Why a scenario failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioFailure {
    /// The wrapper failed an assertion where it should have passed.
    UnexpectedFailure(AssertionFailure),
    /// The wrapper passed despite corrupted compiler output.
    UnexpectedSuccess,
    /// The compiler was called with the wrong arguments or stdin.
    CallMismatch {
        slot: Slot,
        expected: InvocationRecord,
        actual: InvocationRecord,
    },
}

impl fmt::Display for ScenarioFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioFailure::UnexpectedFailure(failure) => write!(f, "wrapper failed unexpectedly: {}", failure),
            ScenarioFailure::UnexpectedSuccess => {
                write!(f, "wrapper passed although the compiler output was corrupted")
            }
            ScenarioFailure::CallMismatch { slot, expected, actual } => write!(
                f,
                "compiler call in slot {} differs\n  expected: {}\n  actual:   {}",
                slot, expected, actual
            ),
        }
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Passed,
    Failed(ScenarioFailure),
}

impl ScenarioOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, ScenarioOutcome::Passed)
    }
}

/// One scenario of one fixture.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub fixture: String,
    pub scenario: Scenario,
    pub outcome: ScenarioOutcome,
    pub duration: Duration,
}

/// Everything a harness run produced.
#[derive(Debug, Clone, Default)]
pub struct HarnessReport {
    pub phase_name: Option<String>,
    pub fixtures: usize,
    pub results: Vec<ScenarioResult>,
    pub duration: Duration,
}

impl HarnessReport {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.outcome.is_passed())
    }

    /// Outcome of `scenario` for `fixture`, if it ran.
    pub fn outcome(&self, fixture: &str, scenario: Scenario) -> Option<&ScenarioOutcome> {
        self.results
            .iter()
            .find(|r| r.fixture == fixture && r.scenario == scenario)
            .map(|r| &r.outcome)
    }

    /// One-line summary, e.g. `5 passed, 1 failed`.
    pub fn summary_line(&self) -> String {
        let mut parts = Vec::new();
        if self.passed() > 0 {
            parts.push(format!("{} passed", self.passed()));
        }
        if self.failed() > 0 {
            parts.push(format!("{} failed", self.failed()));
        }
        if parts.is_empty() {
            parts.push("no scenarios ran".to_string());
        }
        parts.join(", ")
    }
}

/// Progress callbacks from a harness run.
pub trait HarnessReporter {
    /// Called once fixtures for the phase are known
    fn on_run_start(&mut self, _phase_name: &str, _fixture_count: usize) {}

    /// Called before the first scenario of a fixture
    fn on_fixture_start(&mut self, _fixture: &Fixture) {}

    /// Called after each scenario
    fn on_scenario_complete(&mut self, result: &ScenarioResult);

    /// Called when the run is finished
    fn on_run_complete(&mut self, report: &HarnessReport);
}

/// Reporter that prints nothing.
#[derive(Debug, Default)]
pub struct SilentReporter;

impl HarnessReporter for SilentReporter {
    fn on_scenario_complete(&mut self, _result: &ScenarioResult) {}

    fn on_run_complete(&mut self, _report: &HarnessReport) {}
}

/// Default console reporter (pytest-style)
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    pub verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl HarnessReporter for ConsoleReporter {
    fn on_run_start(&mut self, phase_name: &str, fixture_count: usize) {
        println!("\x1b[1m=================== phase '{}' ===================\x1b[0m", phase_name);
        println!("collected {} fixture(s)", fixture_count);
        println!();
    }

    fn on_fixture_start(&mut self, fixture: &Fixture) {
        if self.verbose {
            println!("{}", fixture.case_name());
        }
    }

    fn on_scenario_complete(&mut self, result: &ScenarioResult) {
        let status = match &result.outcome {
            ScenarioOutcome::Passed => "\x1b[32mPASSED\x1b[0m",
            ScenarioOutcome::Failed(_) => "\x1b[31mFAILED\x1b[0m",
        };

        if self.verbose {
            println!("  {} {} ({:.0}ms)", result.scenario, status, result.duration.as_millis());
        } else if !result.outcome.is_passed() {
            println!("{}::{} {}", result.fixture, result.scenario, status);
        }
    }

    fn on_run_complete(&mut self, report: &HarnessReport) {
        let failures: Vec<_> = report.failures().collect();
        if !failures.is_empty() {
            println!();
            println!("\x1b[1;31m=================== FAILURES ===================\x1b[0m");
            for result in failures {
                println!();
                println!("\x1b[1m___________ {}::{} ___________\x1b[0m", result.fixture, result.scenario);
                if let ScenarioOutcome::Failed(failure) = &result.outcome {
                    println!();
                    println!("    {}", failure);
                }
            }
        }

        println!();
        let color = if report.is_success() { "\x1b[1;32m" } else { "\x1b[1;31m" };
        println!(
            "{}=================== {} in {:.2}s ===================\x1b[0m",
            color,
            report.summary_line(),
            report.duration.as_secs_f64()
        );
    }
}
