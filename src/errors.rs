/*!
# Errors
The single job-level error type that every task, step, and tool wrapper returns.
Tasks never convert between kinds; whatever reaches the runner marks the job failed.
*/
use std::path::PathBuf;

/// Shorthand for results that can fail a job
pub type JobResult<T> = Result<T, JobError>;

#[derive(thiserror::Error, Debug)]
pub enum JobError {
    /// Bad or missing parameters, zero/multiple providers, unknown step names, etc.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An external tool ran but did not leave the output we expected
    #[error("{tool} did not produce the expected output: {}", expected.display())]
    ToolFailure { tool: String, expected: PathBuf },
    /// An external tool exited with a failure status
    #[error("{tool} exited with status {status}, see log: {log}")]
    ToolExit { tool: String, status: String, log: String },
    /// Inputs disagree with each other or lack required annotations
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),
    /// One or more split children failed; siblings still ran to completion
    #[error("{failed} of {total} split jobs failed: {detail}")]
    SplitFailure { failed: usize, total: usize, detail: String },
    /// A final output could not be registered
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl JobError {
    /// Convenience constructor for configuration errors
    pub fn config<S: Into<String>>(msg: S) -> Self {
        JobError::Configuration(msg.into())
    }

    /// Convenience constructor for data inconsistencies
    pub fn data<S: Into<String>>(msg: S) -> Self {
        JobError::DataInconsistency(msg.into())
    }
}

/// Reasons a final output is refused by the metadata store.
/// Kept separate from `JobError` so callers can decide how severe a rejection is.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("final output {path} ({label}) has no readset, analysis, or genome association")]
    MissingAssociation { path: String, label: String },
    #[error("artifact {path} is tagged {role}, only final outputs can be registered")]
    NotFinalOutput { path: String, role: String },
    #[error("final output {path} no longer exists on disk")]
    MissingFile { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = JobError::ToolFailure { tool: "bwa".to_string(), expected: PathBuf::from("/tmp/x.bam") };
        assert_eq!(e.to_string(), "bwa did not produce the expected output: /tmp/x.bam");

        let e = JobError::config("No reference library type was supplied");
        assert_eq!(e.to_string(), "configuration error: No reference library type was supplied");

        let r = RegistrationError::MissingAssociation { path: "a.vcf".to_string(), label: "VCF".to_string() };
        let e: JobError = r.clone().into();
        assert_eq!(e.to_string(), r.to_string());
    }
}
