//! CLI errors and their exit codes.

use gbs_assembler::AsmError;
use gbs_verifier::VerifyError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Parse(#[from] AsmError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Every problem the verifier found, one per line.
    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n"))]
    Verify(Vec<VerifyError>),

    /// The program failed while running. Carries the full report.
    #[error("{0}")]
    Runtime(String),
}

impl CliError {
    /// Process exit code: 1 for input problems, 2 for verification, 3 for
    /// runtime faults.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Read { .. } | CliError::Parse(_) | CliError::Config(_) => 1,
            CliError::Verify(_) => 2,
            CliError::Runtime(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(CliError::Config("x".into()).exit_code(), 1);
        assert_eq!(CliError::Verify(vec![VerifyError::MissingEntrypoint]).exit_code(), 2);
        assert_eq!(CliError::Runtime("boom".into()).exit_code(), 3);
    }

    #[test]
    fn verify_errors_one_per_line() {
        let err = CliError::Verify(vec![
            VerifyError::MissingEntrypoint,
            VerifyError::FallsOffEnd {
                routine: "P".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "program has no entrypoint\nP: control reaches the end of the routine without returning"
        );
    }
}
