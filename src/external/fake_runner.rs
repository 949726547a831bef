
use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::errors::{JobError, JobResult};
use crate::external::{ToolInvocation, ToolRunner};

/// Pretends to run tools by writing every expected output, recording each invocation
#[derive(Debug, Default)]
pub struct FakeToolRunner {
    invocations: Mutex<Vec<ToolInvocation>>,
    /// Tools that "succeed" without writing their outputs
    silent_tools: BTreeSet<String>
}

impl FakeToolRunner {
    /// A runner where the named tools exit cleanly but produce nothing
    pub fn with_silent_tools(tools: &[&str]) -> Self {
        Self {
            invocations: Default::default(),
            silent_tools: tools.iter().map(|t| t.to_string()).collect()
        }
    }

    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    /// Number of times a tool with this name was invoked
    pub fn count(&self, tool: &str) -> usize {
        self.invocations.lock().unwrap().iter()
            .filter(|i| i.tool() == tool)
            .count()
    }
}

impl ToolRunner for FakeToolRunner {
    fn run_process(&self, invocation: &ToolInvocation) -> JobResult<()> {
        self.invocations.lock().unwrap().push(invocation.clone());
        if self.silent_tools.contains(invocation.tool()) {
            return Ok(());
        }
        for output in invocation.expected_outputs() {
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(output, format!("{}\n", invocation.command_line()))
                .map_err(JobError::Io)?;
        }
        Ok(())
    }
}
