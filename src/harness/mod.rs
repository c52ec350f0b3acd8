//! Phase test harness
//!
//! Checks a phase's wrapper (the [`TestCases`] registered for it) against the
//! fake compiler. For every fixture of the phase it runs five scenarios in
//! order (see [`Scenario::SEQUENCE`]):
//!
//! - **good-output**: true output on both modes; the wrapper must pass and both
//!   compiler calls must match the fixture.
//! - **bad-stdout** (argument, then stdin): one mode's stdout corrupted; the
//!   wrapper must fail an assertion.
//! - **bad-stderr** (argument, then stdin): one mode's error marker flipped; the
//!   wrapper must fail an assertion.
//!
//! After a bad scenario the corrupted mode's call must match the fixture, and
//! so must the other mode's call if the wrapper made it.
//!
//! ## Failures vs. errors
//!
//! Scenario mismatches are collected in the [`HarnessReport`]. Anything that
//! means the scenario could not be judged at all (a missing invocation record,
//! compiler calls in the wrong order, a wrapper that could not spawn the
//! compiler) aborts the run with a [`HarnessError`].

pub mod expect;
pub mod report;
pub mod scenario;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use simple_test_core::protocol::Slot;
use thiserror::Error;

use crate::cases::{CaseContext, CaseFactory, CaseFailure, CaseRegistry, TestCases};
use crate::channel::{self, ChannelError, FakeCompilerChannel, InvocationRecord};
use crate::compiler::CompilerPath;
use crate::fixtures::{self, Fixture, FixtureError};

pub use expect::{CallCheck, ExpectedCalls};
pub use report::{
    ConsoleReporter, HarnessReport, HarnessReporter, ScenarioFailure, ScenarioOutcome, ScenarioResult, SilentReporter,
};
pub use scenario::{Scenario, corrupt_first_char};

/// Errors that stop a harness run.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error("no test cases registered for phase '{0}'")]
    UnknownPhase(String),

    #[error("{case} [{scenario}]: wrapper could not run: {source}")]
    Case {
        case: String,
        scenario: Scenario,
        #[source]
        source: CaseFailure,
    },

    #[error(
        "{fixture}: slot {slot} holds the {}-mode call; the wrapper invoked the compiler out of order",
        slot.other().as_str()
    )]
    InvocationOrder { fixture: String, slot: Slot },

    #[error("working directory '{}' is not accessible: {source}", path.display())]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Arguments the wrapper passes to the compiler before the input
    pub sc_args: Vec<String>,
    /// Directory the wrapper runs the compiler in
    pub working_dir: PathBuf,
    /// Fake compiler executable; located automatically when unset
    pub fake_compiler: Option<PathBuf>,
    /// Stop after the first failed scenario
    pub stop_on_fail: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            sc_args: Vec::new(),
            working_dir: PathBuf::from("."),
            fake_compiler: None,
            stop_on_fail: false,
        }
    }
}

impl HarnessConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sc_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sc_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_fake_compiler(mut self, path: impl Into<PathBuf>) -> Self {
        self.fake_compiler = Some(path.into());
        self
    }

    pub fn with_stop_on_fail(mut self, stop: bool) -> Self {
        self.stop_on_fail = stop;
        self
    }

    /// Canonical working directory, so fixture paths can be made relative to it.
    pub fn resolved_working_dir(&self) -> Result<PathBuf, HarnessError> {
        fs::canonicalize(&self.working_dir).map_err(|source| HarnessError::WorkingDir {
            path: self.working_dir.clone(),
            source,
        })
    }
}

struct PhaseBinding {
    phase_name: String,
    factory: Arc<CaseFactory>,
}

/// Runs the scenarios for one phase.
pub struct PhaseHarness {
    binding: Option<PhaseBinding>,
    config: HarnessConfig,
}

impl PhaseHarness {
    /// A harness with no phase bound. Running it does nothing.
    pub fn unbound(config: HarnessConfig) -> Self {
        Self { binding: None, config }
    }

    /// A harness for `phase_name`, using the cases registered for it.
    pub fn bind(phase_name: &str, registry: &CaseRegistry, config: HarnessConfig) -> Result<Self, HarnessError> {
        let factory = registry
            .factory(phase_name)
            .ok_or_else(|| HarnessError::UnknownPhase(phase_name.to_string()))?;
        Ok(Self {
            binding: Some(PhaseBinding {
                phase_name: phase_name.to_string(),
                factory,
            }),
            config,
        })
    }

    pub fn phase_name(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.phase_name.as_str())
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Discover fixtures under `root` and run them.
    pub fn run_discovered(
        &self,
        root: &Path,
        reporter: &mut dyn HarnessReporter,
    ) -> Result<HarnessReport, HarnessError> {
        if self.binding.is_none() {
            return Ok(HarnessReport::default());
        }
        let fixtures = fixtures::discover_fixtures(root)?;
        self.run(&fixtures, reporter)
    }

    /// Run every scenario for the fixtures of this harness's phase.
    ///
    /// Fixtures of other phases are ignored.
    #[tracing::instrument(skip_all, fields(phase = self.phase_name().unwrap_or("<unbound>")))]
    pub fn run(&self, fixtures: &[Fixture], reporter: &mut dyn HarnessReporter) -> Result<HarnessReport, HarnessError> {
        let Some(binding) = &self.binding else {
            tracing::debug!("no phase bound; nothing to run");
            return Ok(HarnessReport::default());
        };

        let start = Instant::now();
        let working_dir = self.config.resolved_working_dir()?;
        let phase_fixtures: Vec<Fixture> = fixtures::fixtures_for_phase(fixtures, &binding.phase_name)
            .cloned()
            .collect();

        let fake_compiler = match &self.config.fake_compiler {
            Some(path) => path.clone(),
            None => channel::locate_fake_compiler()?,
        };
        let compiler = CompilerPath::new();
        let channel = FakeCompilerChannel::acquire(&fake_compiler, &compiler)?;
        reporter.on_run_start(&binding.phase_name, phase_fixtures.len());

        let ctx = CaseContext {
            compiler,
            sc_args: self.config.sc_args.clone(),
            working_dir: working_dir.clone(),
            fixtures: phase_fixtures.clone(),
        };

        let mut report = HarnessReport {
            phase_name: Some(binding.phase_name.clone()),
            fixtures: phase_fixtures.len(),
            ..HarnessReport::default()
        };

        'fixtures: for fixture in &phase_fixtures {
            reporter.on_fixture_start(fixture);
            let expected = ExpectedCalls::derive(fixture, &self.config.sc_args, &working_dir)?;

            for scenario in Scenario::SEQUENCE {
                let result = run_scenario(&channel, &*binding.factory, &ctx, fixture, &expected, scenario)?;
                reporter.on_scenario_complete(&result);

                let failed = !result.outcome.is_passed();
                report.results.push(result);
                if failed && self.config.stop_on_fail {
                    break 'fixtures;
                }
            }
        }

        channel.release()?;
        report.duration = start.elapsed();

        tracing::info!(
            passed = report.passed(),
            failed = report.failed(),
            fixtures = report.fixtures,
            "harness run complete"
        );
        reporter.on_run_complete(&report);
        Ok(report)
    }
}

/// Program the channel, run the wrapper case and judge the result.
fn run_scenario(
    channel: &FakeCompilerChannel,
    factory: &CaseFactory,
    ctx: &CaseContext,
    fixture: &Fixture,
    expected: &ExpectedCalls,
    scenario: Scenario,
) -> Result<ScenarioResult, HarnessError> {
    let start = Instant::now();

    let (arg_output, stdin_output) = scenario.outputs(&fixture.phase_file);
    channel.program(&arg_output, Some(&stdin_output))?;

    let cases: Box<dyn TestCases> = factory(ctx.clone());
    let case = fixture.case_name();
    tracing::debug!(case = %case, %scenario, "running wrapper case");

    let wrapper_failure = match (cases.run_case(&case), scenario.expects_pass()) {
        (Ok(()), true) | (Err(CaseFailure::Assertion(_)), false) => None,
        (Ok(()), false) => Some(ScenarioFailure::UnexpectedSuccess),
        (Err(CaseFailure::Assertion(failure)), true) => Some(ScenarioFailure::UnexpectedFailure(failure)),
        (Err(source), _) => {
            return Err(HarnessError::Case {
                case,
                scenario,
                source,
            });
        }
    };

    let outcome = match wrapper_failure {
        Some(failure) => ScenarioOutcome::Failed(failure),
        None => check_calls(channel, fixture, expected, scenario)?,
    };

    Ok(ScenarioResult {
        fixture: fixture.name.clone(),
        scenario,
        outcome,
        duration: start.elapsed(),
    })
}

/// Compare the captured invocation records with the fixture's expectations.
///
/// The scenario's checked slots must hold a record. After a corruption the
/// uncorrupted mode is checked too when it was recorded; a wrapper that stopped
/// at the failing mode never makes that call.
fn check_calls(
    channel: &FakeCompilerChannel,
    fixture: &Fixture,
    expected: &ExpectedCalls,
    scenario: Scenario,
) -> Result<ScenarioOutcome, HarnessError> {
    for &slot in scenario.checked_slots() {
        let actual = channel.read_invocation(slot)?;
        if let Some(failure) = compare_call(fixture, expected, slot, actual)? {
            return Ok(ScenarioOutcome::Failed(failure));
        }
    }

    if let Some(corrupted) = scenario.corrupted_slot() {
        let slot = corrupted.other();
        match channel.read_invocation(slot) {
            Ok(actual) => {
                if let Some(failure) = compare_call(fixture, expected, slot, actual)? {
                    return Ok(ScenarioOutcome::Failed(failure));
                }
            }
            Err(ChannelError::MissingRecord { .. }) => {
                tracing::debug!(fixture = %fixture.name, %slot, "wrapper stopped before the uncorrupted call");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(ScenarioOutcome::Passed)
}

fn compare_call(
    fixture: &Fixture,
    expected: &ExpectedCalls,
    slot: Slot,
    actual: InvocationRecord,
) -> Result<Option<ScenarioFailure>, HarnessError> {
    match expected.check(slot, &actual) {
        CallCheck::Matches => Ok(None),
        CallCheck::OutOfOrder => Err(HarnessError::InvocationOrder {
            fixture: fixture.name.clone(),
            slot,
        }),
        CallCheck::Differs => Ok(Some(ScenarioFailure::CallMismatch {
            slot,
            expected: expected.for_slot(slot).clone(),
            actual,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_harness_is_a_noop() {
        // Neither a fake compiler nor a working directory is needed.
        let config = HarnessConfig::new().with_working_dir("/does/not/exist");
        let harness = PhaseHarness::unbound(config);

        let report = harness.run(&[], &mut SilentReporter).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.phase_name, None);
        assert_eq!(harness.phase_name(), None);
    }

    #[test]
    fn bind_rejects_unregistered_phase() {
        let registry = CaseRegistry::with_compiler_cases(["parse"]);
        let err = PhaseHarness::bind("lower", &registry, HarnessConfig::new()).err().unwrap();
        assert!(matches!(err, HarnessError::UnknownPhase(ref p) if p == "lower"));

        let harness = PhaseHarness::bind("parse", &registry, HarnessConfig::new()).unwrap();
        assert_eq!(harness.phase_name(), Some("parse"));
    }

    #[test]
    fn config_builder() {
        let config = HarnessConfig::new()
            .with_sc_args(["--phase", "parse"])
            .with_fake_compiler("/bin/sc-fake")
            .with_stop_on_fail(true);
        assert_eq!(config.sc_args, vec!["--phase", "parse"]);
        assert_eq!(config.fake_compiler.as_deref(), Some(Path::new("/bin/sc-fake")));
        assert!(config.stop_on_fail);
        assert_eq!(config.working_dir, PathBuf::from("."));
    }

    #[derive(Default)]
    struct Events(Vec<&'static str>);

    impl HarnessReporter for Events {
        fn on_run_start(&mut self, _phase_name: &str, _fixture_count: usize) {
            self.0.push("start");
        }

        fn on_scenario_complete(&mut self, _result: &ScenarioResult) {
            self.0.push("scenario");
        }

        fn on_run_complete(&mut self, _report: &HarnessReport) {
            self.0.push("complete");
        }
    }

    #[test]
    fn reporter_not_started_when_channel_cannot_be_acquired() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::new()
            .with_working_dir(dir.path())
            .with_fake_compiler(dir.path().join("no-such-sc-fake"));
        let registry = CaseRegistry::with_compiler_cases(["parse"]);
        let harness = PhaseHarness::bind("parse", &registry, config).unwrap();

        let mut events = Events::default();
        let err = harness.run(&[], &mut events).unwrap_err();
        assert!(matches!(err, HarnessError::Channel(ChannelError::Install { .. })), "unexpected: {err}");
        assert!(events.0.is_empty());
    }

    #[test]
    fn missing_working_dir_is_reported() {
        let config = HarnessConfig::new().with_working_dir("/does/not/exist");
        assert!(matches!(config.resolved_working_dir(), Err(HarnessError::WorkingDir { .. })));
    }
}
