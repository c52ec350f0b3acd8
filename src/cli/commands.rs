//! Command implementations for the CLI

use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{CliError, CliResult, ExitCode, PhaseArgs};
use crate::cases::{CaseContext, CaseFailure, CaseRegistry, CompilerCases, TestCases};
use crate::compiler::CompilerPath;
use crate::fixtures::{self, Fixture};
use crate::harness::{ConsoleReporter, HarnessConfig, HarnessError, PhaseHarness};

fn discover(root: &Path) -> CliResult<Vec<Fixture>> {
    fixtures::discover_fixtures(root).map_err(|e| CliError::error(format!("Error: {}", e)))
}

fn harness_error(e: HarnessError) -> CliError {
    CliError::error(format!("Error: {}", e))
}

fn no_fixtures(phase: &str, root: &Path) -> CliError {
    CliError::failure(format!(
        "No fixtures found for phase '{}' under '{}'",
        phase,
        root.display()
    ))
}

/// Harness configuration from the shared phase options.
fn phase_config(args: &PhaseArgs) -> HarnessConfig {
    HarnessConfig::new()
        .with_sc_args(args.sc_args.iter().cloned())
        .with_working_dir(args.working_dir.clone())
        .with_stop_on_fail(args.stop_on_fail)
}

/// List discovered fixtures, optionally only those of one phase.
pub fn list_fixtures(root: &Path, phase: Option<&str>) -> CliResult<ExitCode> {
    let all = discover(root)?;
    let selected: Vec<&Fixture> = all
        .iter()
        .filter(|f| phase.is_none_or(|p| f.phase_name == p))
        .collect();

    if selected.is_empty() {
        return Err(match phase {
            Some(p) => no_fixtures(p, root),
            None => CliError::failure(format!("No fixtures found under '{}'", root.display())),
        });
    }

    for fixture in &selected {
        println!(
            "{}::{}  {}",
            fixture.phase_name,
            fixture.case_name(),
            fixture.sim_file_path.display()
        );
    }
    println!("\n{} fixture(s)", selected.len());
    Ok(ExitCode::SUCCESS)
}

/// Check the phase's compiler cases against the fake compiler.
pub fn check_phase(args: &PhaseArgs, fake_compiler: Option<PathBuf>) -> CliResult<ExitCode> {
    let mut config = phase_config(args);
    if let Some(path) = fake_compiler {
        config = config.with_fake_compiler(path);
    }

    let registry = CaseRegistry::with_compiler_cases([args.phase.as_str()]);
    let harness = PhaseHarness::bind(&args.phase, &registry, config).map_err(harness_error)?;

    let fixtures = discover(&args.fixtures)?;
    if fixtures::fixtures_for_phase(&fixtures, &args.phase).next().is_none() {
        return Err(no_fixtures(&args.phase, &args.fixtures));
    }

    let mut reporter = ConsoleReporter::new(args.verbose);
    let report = harness.run(&fixtures, &mut reporter).map_err(harness_error)?;

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        // Failures were already printed by the reporter
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

/// Run the phase's fixtures against the real compiler.
pub fn run_phase(args: &PhaseArgs, compiler: Option<PathBuf>) -> CliResult<ExitCode> {
    let working_dir = phase_config(args).resolved_working_dir().map_err(harness_error)?;
    let phase_fixtures: Vec<Fixture> = discover(&args.fixtures)?
        .into_iter()
        .filter(|f| f.phase_name == args.phase)
        .collect();
    if phase_fixtures.is_empty() {
        return Err(no_fixtures(&args.phase, &args.fixtures));
    }

    let compiler = compiler.map(CompilerPath::fixed).unwrap_or_default();
    tracing::debug!(compiler = %compiler.resolve().display(), "running fixtures against compiler");

    let fixture_count = phase_fixtures.len();
    let cases = CompilerCases::new(CaseContext {
        compiler,
        sc_args: args.sc_args.clone(),
        working_dir,
        fixtures: phase_fixtures,
    });

    println!("\x1b[1m=================== phase '{}' ===================\x1b[0m", args.phase);
    println!("collected {} fixture(s)", fixture_count);
    println!();

    let start = Instant::now();
    let mut passed = 0usize;
    let mut failures: Vec<(String, CaseFailure)> = Vec::new();

    for name in cases.case_names() {
        match cases.run_case(&name) {
            Ok(()) => {
                passed += 1;
                if args.verbose {
                    println!("{} \x1b[32mPASSED\x1b[0m", name);
                }
            }
            Err(failure) => {
                let status = if failure.is_assertion() {
                    "\x1b[31mFAILED\x1b[0m"
                } else {
                    "\x1b[31mERROR\x1b[0m"
                };
                println!("{} {}", name, status);
                failures.push((name, failure));
                if args.stop_on_fail {
                    break;
                }
            }
        }
    }

    if !failures.is_empty() {
        println!();
        println!("\x1b[1;31m=================== FAILURES ===================\x1b[0m");
        for (name, failure) in &failures {
            println!();
            println!("\x1b[1m___________ {} ___________\x1b[0m", name);
            println!();
            println!("    {}", failure);
        }
    }

    let errors = failures.iter().filter(|(_, f)| !f.is_assertion()).count();
    let failed = failures.len() - errors;
    let mut parts = Vec::new();
    if passed > 0 {
        parts.push(format!("{} passed", passed));
    }
    if failed > 0 {
        parts.push(format!("{} failed", failed));
    }
    if errors > 0 {
        parts.push(format!("{} error(s)", errors));
    }

    println!();
    let color = if failures.is_empty() { "\x1b[1;32m" } else { "\x1b[1;31m" };
    println!(
        "{}=================== {} in {:.2}s ===================\x1b[0m",
        color,
        parts.join(", "),
        start.elapsed().as_secs_f64()
    );

    if errors > 0 {
        Err(CliError::new("", ExitCode::ERROR))
    } else if failed > 0 {
        Err(CliError::new("", ExitCode::FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
