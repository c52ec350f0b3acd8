//! Agent side of the channel: what the installed fake compiler does when run.
//!
//! The agent picks its slot from which invocation records already exist,
//! records what it received, then replays the programmed output for that slot.
//! Kept in the library so it can be exercised without spawning processes; the
//! `sc-fake` binary is a thin shell around [`serve`].

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use simple_test_core::protocol::{ChannelFile, Slot};
use thiserror::Error;

use super::record::InvocationRecord;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Both slots already hold a record for this programming cycle.
    #[error("invoked more than twice since the channel was last programmed")]
    TooManyInvocations,

    #[error("slot {slot} was never programmed: '{}' is missing", path.display())]
    NotProgrammed { slot: Slot, path: PathBuf },

    #[error("stdin is not valid UTF-8: {0}")]
    Stdin(#[source] io::Error),

    #[error("failed to encode arguments: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write programmed output: {0}")]
    Output(#[source] io::Error),
}

/// Which slot the next invocation in `dir` belongs to.
pub fn next_slot(dir: &Path) -> Result<Slot, AgentError> {
    for slot in Slot::ALL {
        if !dir.join(slot.file_name(ChannelFile::Arguments)).exists() {
            return Ok(slot);
        }
    }
    Err(AgentError::TooManyInvocations)
}

/// Handle one fake-compiler invocation against the channel directory `dir`.
///
/// The stdin record is written before the arguments record, because the
/// presence of the arguments file is what marks a slot as taken.
pub fn serve<R, O, E>(dir: &Path, args: &[String], stdin: &mut R, out: &mut O, err: &mut E) -> Result<Slot, AgentError>
where
    R: Read,
    O: Write,
    E: Write,
{
    let slot = next_slot(dir)?;

    let mut received = String::new();
    stdin.read_to_string(&mut received).map_err(AgentError::Stdin)?;

    write_file(&dir.join(slot.file_name(ChannelFile::Stdin)), &received)?;
    write_file(
        &dir.join(slot.file_name(ChannelFile::Arguments)),
        &InvocationRecord::encode_args(args)?,
    )?;

    let stdout = read_programmed(dir, slot, ChannelFile::Stdout)?;
    let stderr = read_programmed(dir, slot, ChannelFile::Stderr)?;

    out.write_all(stdout.as_bytes()).map_err(AgentError::Output)?;
    out.flush().map_err(AgentError::Output)?;
    err.write_all(stderr.as_bytes()).map_err(AgentError::Output)?;
    err.flush().map_err(AgentError::Output)?;

    Ok(slot)
}

fn write_file(path: &Path, contents: &str) -> Result<(), AgentError> {
    fs::write(path, contents).map_err(|source| AgentError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_programmed(dir: &Path, slot: Slot, kind: ChannelFile) -> Result<String, AgentError> {
    let path = dir.join(slot.file_name(kind));
    fs::read_to_string(&path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            AgentError::NotProgrammed { slot, path }
        } else {
            AgentError::Io { path, source }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(dir: &Path, slot: Slot, stdout: &str, stderr: &str) {
        fs::write(dir.join(slot.file_name(ChannelFile::Stdout)), stdout).unwrap();
        fs::write(dir.join(slot.file_name(ChannelFile::Stderr)), stderr).unwrap();
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_then_second_slot() {
        let dir = tempfile::tempdir().unwrap();
        program(dir.path(), Slot::Argument, "3", "");
        program(dir.path(), Slot::Stdin, "3", "error: \n");

        let (mut out, mut err) = (Vec::new(), Vec::new());
        let slot = serve(dir.path(), &args(&["-p", "add.sim"]), &mut io::empty(), &mut out, &mut err).unwrap();
        assert_eq!(slot, Slot::Argument);
        assert_eq!(out, b"3");
        assert!(err.is_empty());

        let (mut out, mut err) = (Vec::new(), Vec::new());
        let slot = serve(dir.path(), &args(&["-p"]), &mut "1 + 2".as_bytes(), &mut out, &mut err).unwrap();
        assert_eq!(slot, Slot::Stdin);
        assert_eq!(out, b"3");
        assert_eq!(err, b"error: \n");

        let args_0 = fs::read_to_string(dir.path().join("arguments")).unwrap();
        assert_eq!(InvocationRecord::decode_args(&args_0).unwrap(), vec!["-p", "add.sim"]);
        assert_eq!(fs::read_to_string(dir.path().join("stdin")).unwrap(), "");
        assert_eq!(fs::read_to_string(dir.path().join("stdin.2")).unwrap(), "1 + 2");
    }

    #[test]
    fn third_invocation_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        for slot in Slot::ALL {
            program(dir.path(), slot, "", "");
            fs::write(dir.path().join(slot.file_name(ChannelFile::Arguments)), "[]").unwrap();
        }

        let err = serve(dir.path(), &[], &mut io::empty(), &mut io::sink(), &mut io::sink()).unwrap_err();
        assert!(matches!(err, AgentError::TooManyInvocations));
    }

    #[test]
    fn unprogrammed_slot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = serve(dir.path(), &[], &mut io::empty(), &mut io::sink(), &mut io::sink()).unwrap_err();
        assert!(matches!(err, AgentError::NotProgrammed { slot: Slot::Argument, .. }));
    }

    #[test]
    fn invalid_utf8_stdin_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        program(dir.path(), Slot::Argument, "", "");
        let mut stdin: &[u8] = &[0xff, 0xfe];
        let err = serve(dir.path(), &[], &mut stdin, &mut io::sink(), &mut io::sink()).unwrap_err();
        assert!(matches!(err, AgentError::Stdin(_)));
        assert_eq!(next_slot(dir.path()).unwrap(), Slot::Argument);
    }
}
