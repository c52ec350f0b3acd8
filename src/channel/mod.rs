//! Fake compiler control channel
//!
//! A file-system RPC surface between test code (the controller) and an
//! out-of-process fake compiler (the agent, see [`agent`]). The wrapper under
//! test spawns the compiler as a separate process, so the only place both
//! sides can meet is a directory on disk.
//!
//! ## Lifecycle
//!
//! 1. [`FakeCompilerChannel::acquire`] creates a private temp dir, installs the
//!    fake compiler in it and points a [`CompilerPath`] at the copy.
//! 2. [`FakeCompilerChannel::program`] clears old invocation records and writes
//!    the two programmed responses. Run it before every wrapper invocation.
//! 3. [`FakeCompilerChannel::read_invocation`] reads back what each invocation
//!    received.
//! 4. [`FakeCompilerChannel::release`] (or drop) restores the compiler path and
//!    deletes the directory.
//!
//! Slot 0 is always the argument-mode invocation and slot 1 the stdin-mode one.

pub mod agent;
pub mod record;

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use simple_test_core::protocol::{ChannelFile, FAKE_COMPILER_BIN, FAKE_COMPILER_ENV_VAR, Slot, installed_compiler_name};
use tempfile::TempDir;
use thiserror::Error;

use crate::compiler::{CompilerOverride, CompilerPath};

pub use record::{InvocationRecord, ProgrammedOutput};

/// Errors raised by the controller side of the channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to create channel directory: {0}")]
    CreateDir(#[source] io::Error),

    #[error("failed to install fake compiler from '{}': {source}", from.display())]
    Install {
        from: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("channel I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The wrapper never invoked the compiler for this slot.
    #[error("no invocation recorded for slot {slot}: '{}' is missing", path.display())]
    MissingRecord { slot: Slot, path: PathBuf },

    #[error("invocation record for slot {slot} at '{}' is malformed: {source}", path.display())]
    MalformedRecord {
        slot: Slot,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to remove channel directory '{}': {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not locate the 'sc-fake' executable; set SIMPLE_TEST_FAKE_SC or pass it explicitly")]
    FakeCompilerNotFound,
}

/// An acquired channel. Restores the compiler path and deletes its directory
/// when released or dropped.
#[derive(Debug)]
pub struct FakeCompilerChannel {
    // Field order matters: the override is restored before the directory goes away.
    compiler_override: CompilerOverride,
    dir: TempDir,
    compiler_path: PathBuf,
}

impl FakeCompilerChannel {
    /// Create a private directory, install `fake_compiler` in it and redirect
    /// `compiler` to the installed copy.
    #[tracing::instrument(skip_all, fields(fake_compiler = %fake_compiler.display()))]
    pub fn acquire(fake_compiler: &Path, compiler: &CompilerPath) -> Result<Self, ChannelError> {
        let dir = tempfile::Builder::new()
            .prefix("simple-test-")
            .tempdir()
            .map_err(ChannelError::CreateDir)?;

        let compiler_path = dir.path().join(installed_compiler_name());
        fs::copy(fake_compiler, &compiler_path).map_err(|source| ChannelError::Install {
            from: fake_compiler.to_path_buf(),
            source,
        })?;
        make_executable(&compiler_path).map_err(|source| ChannelError::Install {
            from: fake_compiler.to_path_buf(),
            source,
        })?;

        let compiler_override = compiler.install(&compiler_path);
        tracing::debug!(dir = %dir.path().display(), "acquired fake compiler channel");

        Ok(Self {
            compiler_override,
            dir,
            compiler_path,
        })
    }

    /// Channel directory.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the installed fake compiler.
    pub fn compiler_path(&self) -> &Path {
        &self.compiler_path
    }

    /// Path of `kind` for `slot`.
    pub fn file(&self, slot: Slot, kind: ChannelFile) -> PathBuf {
        self.dir.path().join(slot.file_name(kind))
    }

    /// Program the responses for the argument-mode and stdin-mode invocations.
    ///
    /// `stdin_output` defaults to `arg_output`. Invocation records left by a
    /// previous run are removed first so they cannot leak into this one.
    pub fn program(
        &self,
        arg_output: &ProgrammedOutput,
        stdin_output: Option<&ProgrammedOutput>,
    ) -> Result<(), ChannelError> {
        let stdin_output = stdin_output.unwrap_or(arg_output);

        for slot in Slot::ALL {
            for kind in ChannelFile::RECORD {
                let path = self.file(slot, kind);
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => return Err(ChannelError::Io { path, source }),
                }
            }
        }

        for (slot, output) in [(Slot::Argument, arg_output), (Slot::Stdin, stdin_output)] {
            self.write(slot, ChannelFile::Stdout, &output.stdout)?;
            self.write(slot, ChannelFile::Stderr, &output.stderr)?;
        }

        tracing::debug!(?arg_output, ?stdin_output, "programmed fake compiler");
        Ok(())
    }

    /// Read what the fake compiler received in `slot`.
    pub fn read_invocation(&self, slot: Slot) -> Result<InvocationRecord, ChannelError> {
        let args_path = self.file(slot, ChannelFile::Arguments);
        let raw_args = self.read(slot, &args_path)?;
        let args = InvocationRecord::decode_args(&raw_args).map_err(|source| ChannelError::MalformedRecord {
            slot,
            path: args_path.clone(),
            source,
        })?;

        let stdin_path = self.file(slot, ChannelFile::Stdin);
        let stdin = self.read(slot, &stdin_path)?;

        Ok(InvocationRecord { args, stdin })
    }

    /// Record of the argument-mode invocation.
    pub fn first_invocation(&self) -> Result<InvocationRecord, ChannelError> {
        self.read_invocation(Slot::Argument)
    }

    /// Record of the stdin-mode invocation.
    pub fn second_invocation(&self) -> Result<InvocationRecord, ChannelError> {
        self.read_invocation(Slot::Stdin)
    }

    /// Restore the compiler path and delete the channel directory.
    pub fn release(self) -> Result<(), ChannelError> {
        let Self {
            compiler_override,
            dir,
            ..
        } = self;
        drop(compiler_override);

        let path = dir.path().to_path_buf();
        dir.close().map_err(|source| ChannelError::Cleanup { path: path.clone(), source })?;
        tracing::debug!(dir = %path.display(), "released fake compiler channel");
        Ok(())
    }

    fn write(&self, slot: Slot, kind: ChannelFile, contents: &str) -> Result<(), ChannelError> {
        let path = self.file(slot, kind);
        fs::write(&path, contents).map_err(|source| ChannelError::Io { path, source })
    }

    fn read(&self, slot: Slot, path: &Path) -> Result<String, ChannelError> {
        fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ChannelError::MissingRecord {
                    slot,
                    path: path.to_path_buf(),
                }
            } else {
                ChannelError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Find the `sc-fake` executable.
///
/// Looks at `SIMPLE_TEST_FAKE_SC` first, then next to the running executable
/// and up to two directories above it (covers `target/debug/deps`).
pub fn locate_fake_compiler() -> Result<PathBuf, ChannelError> {
    if let Some(path) = env::var_os(FAKE_COMPILER_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{FAKE_COMPILER_ENV_VAR} does not point at a file");
    }

    let file_name = format!("{}{}", FAKE_COMPILER_BIN, env::consts::EXE_SUFFIX);
    if let Ok(exe_path) = env::current_exe() {
        for dir in exe_path.ancestors().skip(1).take(3) {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }

    Err(ChannelError::FakeCompilerNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(compiler: &CompilerPath) -> (TempDir, FakeCompilerChannel) {
        let src = tempfile::tempdir().unwrap();
        let fake = src.path().join("fake");
        fs::write(&fake, "#!/bin/sh\n").unwrap();
        let channel = FakeCompilerChannel::acquire(&fake, compiler).unwrap();
        (src, channel)
    }

    #[test]
    fn acquire_installs_and_redirects() {
        let compiler = CompilerPath::new();
        let (_src, channel) = channel(&compiler);

        assert!(channel.compiler_path().is_file());
        assert_eq!(compiler.current_override().as_deref(), Some(channel.compiler_path()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(channel.compiler_path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn release_restores_previous_and_deletes_dir() {
        let compiler = CompilerPath::fixed("/opt/real/sc");
        let (_src, channel) = channel(&compiler);
        let dir = channel.dir().to_path_buf();

        channel.release().unwrap();

        assert_eq!(compiler.resolve(), PathBuf::from("/opt/real/sc"));
        assert!(!dir.exists());
    }

    #[test]
    fn drop_cleans_up_like_release() {
        let compiler = CompilerPath::new();
        let dir = {
            let (_src, channel) = channel(&compiler);
            channel.dir().to_path_buf()
        };
        assert!(!dir.exists());
        assert_eq!(compiler.current_override(), None);
    }

    #[test]
    fn program_defaults_stdin_output_to_arg_output() {
        let compiler = CompilerPath::new();
        let (_src, channel) = channel(&compiler);

        channel.program(&ProgrammedOutput::new("3", "error: \n"), None).unwrap();

        for slot in Slot::ALL {
            assert_eq!(fs::read_to_string(channel.file(slot, ChannelFile::Stdout)).unwrap(), "3");
            assert_eq!(fs::read_to_string(channel.file(slot, ChannelFile::Stderr)).unwrap(), "error: \n");
        }
    }

    #[test]
    fn program_writes_each_slot() {
        let compiler = CompilerPath::new();
        let (_src, channel) = channel(&compiler);

        channel
            .program(&ProgrammedOutput::new("4", ""), Some(&ProgrammedOutput::new("3", "")))
            .unwrap();

        assert_eq!(fs::read_to_string(channel.file(Slot::Argument, ChannelFile::Stdout)).unwrap(), "4");
        assert_eq!(fs::read_to_string(channel.file(Slot::Stdin, ChannelFile::Stdout)).unwrap(), "3");
    }

    #[test]
    fn program_clears_stale_records() {
        let compiler = CompilerPath::new();
        let (_src, channel) = channel(&compiler);
        let out = ProgrammedOutput::new("3", "");

        fs::write(channel.file(Slot::Argument, ChannelFile::Arguments), "[\"x\"]").unwrap();
        fs::write(channel.file(Slot::Argument, ChannelFile::Stdin), "").unwrap();
        assert!(channel.first_invocation().is_ok());

        channel.program(&out, None).unwrap();
        channel.program(&out, None).unwrap();

        for slot in Slot::ALL {
            assert!(matches!(
                channel.read_invocation(slot),
                Err(ChannelError::MissingRecord { slot: s, .. }) if s == slot
            ));
        }
    }

    #[test]
    fn read_invocation_parses_record() {
        let compiler = CompilerPath::new();
        let (_src, channel) = channel(&compiler);

        fs::write(channel.file(Slot::Stdin, ChannelFile::Arguments), "[\"--phase\",\"parse\"]").unwrap();
        fs::write(channel.file(Slot::Stdin, ChannelFile::Stdin), "1 + 2").unwrap();

        let record = channel.second_invocation().unwrap();
        assert_eq!(record, InvocationRecord::new(vec!["--phase".into(), "parse".into()], "1 + 2"));
    }

    #[test]
    fn read_invocation_rejects_malformed_arguments() {
        let compiler = CompilerPath::new();
        let (_src, channel) = channel(&compiler);

        fs::write(channel.file(Slot::Argument, ChannelFile::Arguments), "not json").unwrap();
        fs::write(channel.file(Slot::Argument, ChannelFile::Stdin), "").unwrap();

        assert!(matches!(
            channel.first_invocation(),
            Err(ChannelError::MalformedRecord { slot: Slot::Argument, .. })
        ));
    }

    #[test]
    fn missing_stdin_record_is_missing() {
        let compiler = CompilerPath::new();
        let (_src, channel) = channel(&compiler);

        fs::write(channel.file(Slot::Argument, ChannelFile::Arguments), "[]").unwrap();

        assert!(matches!(channel.first_invocation(), Err(ChannelError::MissingRecord { .. })));
    }

    #[test]
    fn acquire_reports_missing_source() {
        let compiler = CompilerPath::new();
        let err = FakeCompilerChannel::acquire(Path::new("/definitely/not/here/sc-fake"), &compiler).unwrap_err();
        assert!(matches!(err, ChannelError::Install { .. }));
        assert_eq!(compiler.current_override(), None);
    }
}
