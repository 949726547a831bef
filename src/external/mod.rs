/*!
# External tools
Every wrapped executable follows the same contract: build an argument vector, execute it synchronously,
then verify that the expected output files exist. Exit status and missing outputs are both fatal.
*/

/// Fake runner used by unit tests throughout the crate
#[cfg(test)]
pub mod fake_runner;

use log::{debug, info};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::errors::{JobError, JobResult};

/// A fully-built command line plus the outputs that prove it worked
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolInvocation {
    /// Short name used in messages, e.g. "bwa"
    tool: String,
    /// Executable name or path
    program: String,
    /// Arguments, not including the program
    args: Vec<String>,
    /// Optional working directory
    working_dir: Option<PathBuf>,
    /// Optional file that stdout/stderr are appended to
    log_file: Option<PathBuf>,
    /// If set, stdout is the tool's primary output and is written here instead of the log
    stdout_file: Option<PathBuf>,
    /// Files that must exist after a successful run
    expected_outputs: Vec<PathBuf>
}

impl ToolInvocation {
    pub fn new(tool: &str, program: &str) -> Self {
        Self {
            tool: tool.to_string(),
            program: program.to_string(),
            ..Default::default()
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        let s = path.to_string_lossy().to_string();
        self.arg(s)
    }

    pub fn args<I: IntoIterator<Item = String>>(mut self, args: I) -> Self {
        self.args.extend(args);
        self
    }

    pub fn working_dir(mut self, dir: &Path) -> Self {
        self.working_dir = Some(dir.to_path_buf());
        self
    }

    pub fn log_file(mut self, log_file: &Path) -> Self {
        self.log_file = Some(log_file.to_path_buf());
        self
    }

    /// Captures stdout into a file; the file is also an expected output
    pub fn stdout_to(mut self, path: &Path) -> Self {
        self.stdout_file = Some(path.to_path_buf());
        self.expected_outputs.push(path.to_path_buf());
        self
    }

    pub fn expect_output(mut self, path: &Path) -> Self {
        self.expected_outputs.push(path.to_path_buf());
        self
    }

    /// Human readable command line for logging
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    // getters
    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn get_log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    pub fn get_stdout_file(&self) -> Option<&Path> {
        self.stdout_file.as_deref()
    }

    pub fn expected_outputs(&self) -> &[PathBuf] {
        &self.expected_outputs
    }
}

/// Runs external tools. Implementations only need to perform the side effect;
/// `execute` layers the output verification on top.
pub trait ToolRunner: Send + Sync {
    /// Runs the process to completion, failing on a non-zero exit
    fn run_process(&self, invocation: &ToolInvocation) -> JobResult<()>;

    /// Runs the process and then checks every expected output exists
    fn execute(&self, invocation: &ToolInvocation) -> JobResult<()> {
        info!("Running {}: {}", invocation.tool(), invocation.command_line());
        self.run_process(invocation)?;
        verify_expected_outputs(invocation.tool(), invocation.expected_outputs())
    }
}

/// Checks that every expected output exists
/// # Errors
/// * `JobError::ToolFailure` naming the tool and the first missing path
pub fn verify_expected_outputs(tool: &str, expected: &[PathBuf]) -> JobResult<()> {
    for path in expected.iter() {
        if !path.exists() {
            return Err(JobError::ToolFailure { tool: tool.to_string(), expected: path.clone() });
        }
    }
    Ok(())
}

/// Runs tools as blocking child processes
#[derive(Clone, Debug, Default)]
pub struct SystemToolRunner {
    /// If set, bare program names are resolved inside this folder first
    tool_dir: Option<PathBuf>
}

impl SystemToolRunner {
    pub fn new(tool_dir: Option<PathBuf>) -> Self {
        Self { tool_dir }
    }

    fn resolve_program(&self, program: &str) -> PathBuf {
        if let Some(dir) = self.tool_dir.as_ref() {
            let candidate = dir.join(program);
            if candidate.exists() {
                return candidate;
            }
        }
        PathBuf::from(program)
    }
}

impl ToolRunner for SystemToolRunner {
    fn run_process(&self, invocation: &ToolInvocation) -> JobResult<()> {
        let program = self.resolve_program(invocation.program());
        let mut command = Command::new(&program);
        command.args(invocation.get_args());
        if let Some(wd) = invocation.get_working_dir() {
            command.current_dir(wd);
        }

        let output = command.output()
            .map_err(|e| JobError::ToolExit {
                tool: invocation.tool().to_string(),
                status: format!("failed to start ({e})"),
                log: program.display().to_string()
            })?;

        let stdout = match invocation.get_stdout_file() {
            Some(stdout_fn) => {
                std::fs::write(stdout_fn, &output.stdout)?;
                Default::default()
            },
            None => String::from_utf8_lossy(&output.stdout)
        };
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stdout.lines().chain(stderr.lines()) {
            debug!("\t{line}");
        }

        let log_label = match invocation.get_log_file() {
            Some(log_fn) => {
                let mut log_handle = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(log_fn)?;
                writeln!(log_handle, "$ {}", invocation.command_line())?;
                log_handle.write_all(stdout.as_bytes())?;
                log_handle.write_all(stderr.as_bytes())?;
                log_fn.display().to_string()
            },
            None => "<none>".to_string()
        };

        if !output.status.success() {
            return Err(JobError::ToolExit {
                tool: invocation.tool().to_string(),
                status: output.status.to_string(),
                log: log_label
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let inv = ToolInvocation::new("bwa", "bwa")
            .arg("index")
            .path_arg(Path::new("/ref/genome.fasta"))
            .expect_output(Path::new("/ref/genome.fasta.bwt"));
        assert_eq!(inv.command_line(), "bwa index /ref/genome.fasta");
        assert_eq!(inv.expected_outputs().len(), 1);
    }

    #[test]
    fn test_missing_output() {
        let tmp = tempfile::tempdir().unwrap();
        let present = tmp.path().join("present.txt");
        std::fs::write(&present, "x").unwrap();
        let missing = tmp.path().join("missing.txt");

        assert!(verify_expected_outputs("tool", &[present.clone()]).is_ok());
        match verify_expected_outputs("tool", &[present, missing.clone()]) {
            Err(JobError::ToolFailure { tool, expected }) => {
                assert_eq!(tool, "tool");
                assert_eq!(expected, missing);
            },
            other => panic!("unexpected result: {other:?}")
        }
    }

    #[test]
    fn test_nonexistent_program() {
        let runner = SystemToolRunner::default();
        let inv = ToolInvocation::new("nope", "seqflow-this-program-does-not-exist");
        assert!(matches!(runner.execute(&inv), Err(JobError::ToolExit { .. })));
    }
}
