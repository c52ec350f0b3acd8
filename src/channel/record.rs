//! Data carried over the channel.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What one fake-compiler process received.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvocationRecord {
    /// Arguments after the program name, in order.
    pub args: Vec<String>,
    /// Everything read from stdin.
    pub stdin: String,
}

impl InvocationRecord {
    pub fn new(args: Vec<String>, stdin: impl Into<String>) -> Self {
        Self {
            args,
            stdin: stdin.into(),
        }
    }

    /// Encode the argument list the way the agent stores it.
    pub fn encode_args(args: &[String]) -> serde_json::Result<String> {
        serde_json::to_string(args)
    }

    /// Decode an argument list written by [`InvocationRecord::encode_args`].
    pub fn decode_args(raw: &str) -> serde_json::Result<Vec<String>> {
        serde_json::from_str(raw)
    }
}

impl fmt::Display for InvocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "args={:?} stdin={:?}", self.args, self.stdin)
    }
}

/// A programmed (stdout, stderr) response for one invocation slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgrammedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ProgrammedOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

impl<S: Into<String>, E: Into<String>> From<(S, E)> for ProgrammedOutput {
    fn from((stdout, stderr): (S, E)) -> Self {
        Self::new(stdout, stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_keep_order_and_whitespace() {
        let args = vec!["--phase".to_string(), "parse".to_string(), "dir with space/add.sim".to_string()];
        let raw = InvocationRecord::encode_args(&args).unwrap();
        assert_eq!(InvocationRecord::decode_args(&raw).unwrap(), args);
    }

    #[test]
    fn decode_rejects_non_string_arrays() {
        assert!(InvocationRecord::decode_args("[1, 2]").is_err());
        assert!(InvocationRecord::decode_args("{\"args\": []}").is_err());
    }

    #[test]
    fn output_from_tuple() {
        let out: ProgrammedOutput = ("3", "").into();
        assert_eq!(out, ProgrammedOutput::new("3", ""));
    }
}
