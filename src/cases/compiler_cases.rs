//! Fixture cases that shell out to the compiler.
//!
//! For every fixture the compiler runs twice: first with the simulation file
//! as a path argument, then with its contents piped through stdin. Both runs
//! finish before either output is checked, argument-mode first.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use simple_test_core::protocol::{Slot, reports_error};

use super::{AssertionFailure, CaseContext, CaseFailure, Stream, TestCases};
use crate::compiler::CompilerPath;
use crate::fixtures::Fixture;

/// Captured output of one compiler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Test cases running each fixture of a phase through the compiler.
#[derive(Debug, Clone)]
pub struct CompilerCases {
    compiler: CompilerPath,
    sc_args: Vec<String>,
    working_dir: PathBuf,
    /// Keyed by case name.
    cases: BTreeMap<String, Fixture>,
}

impl CompilerCases {
    pub fn new(ctx: CaseContext) -> Self {
        let cases = ctx.fixtures.into_iter().map(|f| (f.case_name(), f)).collect();
        Self {
            compiler: ctx.compiler,
            sc_args: ctx.sc_args,
            working_dir: ctx.working_dir,
            cases,
        }
    }

    /// Run the compiler once in `mode` for `fixture`.
    #[tracing::instrument(skip_all, fields(fixture = %fixture.name, mode = mode.as_str()))]
    pub fn invoke(&self, fixture: &Fixture, mode: Slot) -> Result<CompilerOutput, CaseFailure> {
        let program = self.compiler.resolve();
        let mut command = Command::new(&program);
        command
            .args(&self.sc_args)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let input = match mode {
            Slot::Argument => {
                command.arg(fixture.relative_sim_path(&self.working_dir)?);
                command.stdin(Stdio::null());
                None
            }
            Slot::Stdin => {
                command.stdin(Stdio::piped());
                Some(fixture.read_sim()?)
            }
        };

        let spawn_error = |source| CaseFailure::Spawn {
            program: program.clone(),
            source,
        };

        let mut child = command.spawn().map_err(spawn_error)?;
        if let Some(input) = input {
            if let Some(mut stdin) = child.stdin.take() {
                match stdin.write_all(input.as_bytes()) {
                    Ok(()) => {}
                    // Exited without reading its input; its output is still judged.
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        tracing::debug!("compiler closed stdin early");
                    }
                    Err(e) => return Err(spawn_error(e)),
                }
            }
        }
        let output = child.wait_with_output().map_err(spawn_error)?;

        tracing::debug!(status = %output.status, "compiler finished");
        Ok(CompilerOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn check(&self, case: &str, fixture: &Fixture, mode: Slot, output: &CompilerOutput) -> Result<(), CaseFailure> {
        let expected = &fixture.phase_file;

        if output.stdout != expected.stdout {
            return Err(CaseFailure::Assertion(AssertionFailure {
                case: case.to_string(),
                mode,
                stream: Stream::Stdout,
                expected: expected.stdout.clone(),
                actual: output.stdout.clone(),
            }));
        }

        if reports_error(&output.stderr) != expected.has_error {
            return Err(CaseFailure::Assertion(AssertionFailure {
                case: case.to_string(),
                mode,
                stream: Stream::Stderr,
                expected: expected.expected_stderr().to_string(),
                actual: output.stderr.clone(),
            }));
        }

        Ok(())
    }
}

impl TestCases for CompilerCases {
    fn case_names(&self) -> Vec<String> {
        self.cases.keys().cloned().collect()
    }

    fn run_case(&self, name: &str) -> Result<(), CaseFailure> {
        let fixture = self
            .cases
            .get(name)
            .ok_or_else(|| CaseFailure::UnknownCase(name.to_string()))?;

        let by_argument = self.invoke(fixture, Slot::Argument)?;
        let by_stdin = self.invoke(fixture, Slot::Stdin)?;

        self.check(name, fixture, Slot::Argument, &by_argument)?;
        self.check(name, fixture, Slot::Stdin, &by_stdin)
    }
}
