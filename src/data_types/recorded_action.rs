
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data_types::artifact::ArtifactRole;

/// Audit record of what a task consumed and produced
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct RecordedAction {
    /// Protocol action name, e.g. "Preparing Run"
    name: String,
    /// Labelled inputs
    inputs: Vec<(String, PathBuf)>,
    /// Labelled outputs with the role they were recorded under
    outputs: Vec<(String, PathBuf, ArtifactRole)>
}

impl RecordedAction {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Adds an input, ignoring exact duplicates
    pub fn add_input(&mut self, label: &str, path: &Path) {
        if !self.inputs.iter().any(|(l, p)| l == label && p == path) {
            self.inputs.push((label.to_string(), path.to_path_buf()));
        }
    }

    /// Adds an output, ignoring exact duplicates
    pub fn add_output(&mut self, label: &str, path: &Path, role: ArtifactRole) {
        if !self.outputs.iter().any(|(l, p, _r)| l == label && p == path) {
            self.outputs.push((label.to_string(), path.to_path_buf(), role));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[(String, PathBuf)] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[(String, PathBuf, ArtifactRole)] {
        &self.outputs
    }
}
