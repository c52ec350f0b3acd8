//! Fixture discovery and phase-file parsing.
//!
//! ## Layout
//!
//! ```text
//! fixtures/
//!   add.sim           simulation input
//!   add.parse.json    expected output of the `parse` phase
//!   add.lower.json    expected output of the `lower` phase
//! ```
//!
//! Every `<name>.<phase>.json` next to a `<name>.sim` yields one [`Fixture`].
//! Phase files look like `{"stdout": "3", "has_error": false}`.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Extension of simulation input files.
pub const SIM_EXTENSION: &str = "sim";

/// Extension of phase files.
pub const PHASE_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid phase file '{}': {source}", path.display())]
    PhaseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("duplicate fixture '{name}' for phase '{phase}' ('{}' and '{}')", first.display(), second.display())]
    DuplicateName {
        name: String,
        phase: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("'{}' is not under the working directory '{}'", path.display(), working_dir.display())]
    OutsideWorkingDir { path: PathBuf, working_dir: PathBuf },
}

/// Expected output of one phase for one fixture.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseFile {
    pub stdout: String,
    #[serde(default)]
    pub has_error: bool,
}

impl PhaseFile {
    pub fn parse(source: &str) -> serde_json::Result<Self> {
        serde_json::from_str(source)
    }

    /// Stderr the compiler should produce for this phase.
    pub fn expected_stderr(&self) -> &'static str {
        simple_test_core::protocol::expected_stderr(self.has_error)
    }
}

/// A named test case pairing a simulation input with a phase's expected output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub name: String,
    pub phase_name: String,
    /// Canonical path of the simulation input.
    pub sim_file_path: PathBuf,
    pub phase_file: PhaseFile,
}

impl Fixture {
    /// Name of the test case that exercises this fixture.
    pub fn case_name(&self) -> String {
        simple_test_core::protocol::case_name(&self.name)
    }

    /// Simulation path relative to `working_dir`.
    pub fn relative_sim_path(&self, working_dir: &Path) -> Result<PathBuf, FixtureError> {
        self.sim_file_path
            .strip_prefix(working_dir)
            .map(Path::to_path_buf)
            .map_err(|_| FixtureError::OutsideWorkingDir {
                path: self.sim_file_path.clone(),
                working_dir: working_dir.to_path_buf(),
            })
    }

    /// Contents of the simulation input.
    pub fn read_sim(&self) -> Result<String, FixtureError> {
        fs::read_to_string(&self.sim_file_path).map_err(|source| FixtureError::Io {
            path: self.sim_file_path.clone(),
            source,
        })
    }
}

/// Discover all fixtures under `root`, sorted by phase then name.
#[tracing::instrument(skip_all, fields(root = %root.display()))]
pub fn discover_fixtures(root: &Path) -> Result<Vec<Fixture>, FixtureError> {
    let root = fs::canonicalize(root).map_err(|source| FixtureError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut sim_files = Vec::new();
    collect_sim_files(&root, &mut sim_files)?;
    sim_files.sort();

    let mut fixtures = Vec::new();
    for sim in &sim_files {
        fixtures.extend(fixtures_for_sim(sim)?);
    }

    fixtures.sort_by(|a, b| (&a.phase_name, &a.name).cmp(&(&b.phase_name, &b.name)));

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for (i, fixture) in fixtures.iter().enumerate() {
        if !seen.insert((fixture.phase_name.as_str(), fixture.name.as_str())) {
            let first = fixtures[..i]
                .iter()
                .find(|f| f.phase_name == fixture.phase_name && f.name == fixture.name)
                .map(|f| f.sim_file_path.clone())
                .unwrap_or_default();
            return Err(FixtureError::DuplicateName {
                name: fixture.name.clone(),
                phase: fixture.phase_name.clone(),
                first,
                second: fixture.sim_file_path.clone(),
            });
        }
    }

    tracing::debug!(count = fixtures.len(), "discovered fixtures");
    Ok(fixtures)
}

/// Fixtures of a single phase.
pub fn fixtures_for_phase<'a>(fixtures: &'a [Fixture], phase_name: &'a str) -> impl Iterator<Item = &'a Fixture> + 'a {
    fixtures.iter().filter(move |f| f.phase_name == phase_name)
}

fn collect_sim_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), FixtureError> {
    let entries = fs::read_dir(dir).map_err(|source| FixtureError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| FixtureError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");

        if path.is_dir() {
            if !name.starts_with('.') && name != "target" {
                collect_sim_files(&path, out)?;
            }
        } else if path.extension().is_some_and(|e| e == SIM_EXTENSION) {
            out.push(path);
        }
    }

    Ok(())
}

fn fixtures_for_sim(sim: &Path) -> Result<Vec<Fixture>, FixtureError> {
    let Some(name) = sim.file_stem().and_then(|s| s.to_str()) else {
        return Ok(Vec::new());
    };
    let Some(dir) = sim.parent() else {
        return Ok(Vec::new());
    };

    let entries = fs::read_dir(dir).map_err(|source| FixtureError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let prefix = format!("{}.", name);
    let suffix = format!(".{}", PHASE_EXTENSION);
    let mut fixtures = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(phase_name) = file_name.strip_prefix(&prefix).and_then(|rest| rest.strip_suffix(&suffix)) else {
            continue;
        };
        if phase_name.is_empty() || phase_name.contains('.') || !path.is_file() {
            continue;
        }

        let source = fs::read_to_string(&path).map_err(|source| FixtureError::Io {
            path: path.clone(),
            source,
        })?;
        let phase_file = PhaseFile::parse(&source).map_err(|source| FixtureError::PhaseFile {
            path: path.clone(),
            source,
        })?;

        fixtures.push(Fixture {
            name: name.to_string(),
            phase_name: phase_name.to_string(),
            sim_file_path: sim.to_path_buf(),
            phase_file,
        });
    }

    Ok(fixtures)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn phase_file_defaults_has_error() {
        let phase = PhaseFile::parse(r#"{"stdout": "3"}"#).unwrap();
        assert_eq!(phase, PhaseFile { stdout: "3".into(), has_error: false });
        assert_eq!(phase.expected_stderr(), "");
    }

    #[test]
    fn phase_file_rejects_unknown_fields() {
        assert!(PhaseFile::parse(r#"{"stdout": "", "exit": 1}"#).is_err());
        assert!(PhaseFile::parse(r#"{"has_error": true}"#).is_err());
    }

    #[test]
    fn discovers_one_fixture_per_phase_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "add.sim", "1 + 2");
        write(dir.path(), "add.parse.json", r#"{"stdout": "3"}"#);
        write(dir.path(), "add.lower.json", r#"{"stdout": "", "has_error": true}"#);
        write(dir.path(), "nested/neg.sim", "-1");
        write(dir.path(), "nested/neg.parse.json", r#"{"stdout": "-1"}"#);
        write(dir.path(), "orphan.parse.json", r#"{"stdout": "x"}"#);
        write(dir.path(), ".hidden/skip.sim", "");
        write(dir.path(), ".hidden/skip.parse.json", r#"{"stdout": ""}"#);

        let fixtures = discover_fixtures(dir.path()).unwrap();
        let ids: Vec<(&str, &str)> = fixtures.iter().map(|f| (f.phase_name.as_str(), f.name.as_str())).collect();
        assert_eq!(ids, vec![("lower", "add"), ("parse", "add"), ("parse", "neg")]);

        assert!(fixtures[0].phase_file.has_error);
        assert!(fixtures[0].sim_file_path.is_absolute());
        assert_eq!(fixtures_for_phase(&fixtures, "parse").count(), 2);
    }

    #[test]
    fn duplicate_names_within_phase_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/add.sim", "1 + 2");
        write(dir.path(), "a/add.parse.json", r#"{"stdout": "3"}"#);
        write(dir.path(), "b/add.sim", "1 + 2");
        write(dir.path(), "b/add.parse.json", r#"{"stdout": "3"}"#);

        let err = discover_fixtures(dir.path()).unwrap_err();
        assert!(matches!(err, FixtureError::DuplicateName { ref name, .. } if name == "add"));
    }

    #[test]
    fn invalid_phase_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "add.sim", "1 + 2");
        write(dir.path(), "add.parse.json", "{");

        let err = discover_fixtures(dir.path()).unwrap_err();
        assert!(err.to_string().contains("add.parse.json"), "unexpected error: {err}");
    }

    #[test]
    fn relative_sim_path_requires_working_dir_prefix() {
        let fixture = Fixture {
            name: "add".into(),
            phase_name: "parse".into(),
            sim_file_path: PathBuf::from("/work/fixtures/add.sim"),
            phase_file: PhaseFile { stdout: "3".into(), has_error: false },
        };

        assert_eq!(
            fixture.relative_sim_path(Path::new("/work")).unwrap(),
            PathBuf::from("fixtures/add.sim")
        );
        assert!(matches!(
            fixture.relative_sim_path(Path::new("/elsewhere")),
            Err(FixtureError::OutsideWorkingDir { .. })
        ));
        assert_eq!(fixture.case_name(), "test_add");
    }
}
