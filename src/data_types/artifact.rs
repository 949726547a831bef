
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumString};

/// The role a file plays in a job's lineage
#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ArtifactRole {
    /// Persisted and registered as a queryable record
    #[strum(serialize = "final-output")]
    #[serde(rename = "final-output")]
    FinalOutput,
    /// Produced solely for a later stage, removed after the job succeeds
    #[strum(serialize = "intermediate")]
    #[serde(rename = "intermediate")]
    Intermediate,
    /// Consumed by the job, never touched by cleanup
    #[strum(serialize = "input")]
    #[serde(rename = "input")]
    Input
}

/// Lifecycle of an artifact as the store sees it
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum ArtifactState {
    #[default]
    Present,
    Deleted
}

/// Database associations that make a final output queryable downstream
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Associations {
    pub readset_id: Option<u64>,
    pub analysis_id: Option<u64>,
    pub genome_id: Option<u64>
}

impl Associations {
    pub fn with_genome(genome_id: Option<u64>) -> Self {
        Self {
            genome_id,
            ..Default::default()
        }
    }

    /// True if at least one of readset, analysis, or genome is set
    pub fn is_queryable(&self) -> bool {
        self.readset_id.is_some() || self.analysis_id.is_some() || self.genome_id.is_some()
    }

    /// Fills any unset association from `other`, existing values win
    pub fn merge(&mut self, other: &Associations) {
        self.readset_id = self.readset_id.or(other.readset_id);
        self.analysis_id = self.analysis_id.or(other.analysis_id);
        self.genome_id = self.genome_id.or(other.genome_id);
    }
}

/// A single tracked file
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Artifact {
    /// Location on disk
    path: PathBuf,
    /// Human readable label, e.g. "Aligned BAM"
    label: String,
    /// What the file is for
    role: ArtifactRole,
    /// Optional database associations
    associations: Associations,
    /// Whether cleanup has already removed it
    #[serde(default)]
    state: ArtifactState
}

impl Artifact {
    pub fn new(path: PathBuf, label: String, role: ArtifactRole, associations: Associations) -> Self {
        Self {
            path,
            label,
            role,
            associations,
            state: ArtifactState::Present
        }
    }

    pub fn mark_deleted(&mut self) {
        self.state = ArtifactState::Deleted;
    }

    /// Promotes or demotes the artifact; used when a later step supersedes an output
    pub fn set_role(&mut self, role: ArtifactRole) {
        self.role = role;
    }

    pub fn associations_mut(&mut self) -> &mut Associations {
        &mut self.associations
    }

    // getters
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn role(&self) -> ArtifactRole {
        self.role
    }

    pub fn associations(&self) -> &Associations {
        &self.associations
    }

    pub fn state(&self) -> ArtifactState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_strings() {
        assert_eq!(ArtifactRole::FinalOutput.to_string(), "final-output");
        assert_eq!(ArtifactRole::from_str("intermediate").unwrap(), ArtifactRole::Intermediate);
        assert!(ArtifactRole::from_str("scratch").is_err());
    }

    #[test]
    fn test_associations() {
        let mut a = Associations::default();
        assert!(!a.is_queryable());
        a.merge(&Associations { readset_id: Some(4), analysis_id: None, genome_id: Some(2) });
        assert!(a.is_queryable());

        // existing values are kept
        a.merge(&Associations { readset_id: Some(9), analysis_id: Some(7), genome_id: None });
        assert_eq!(a, Associations { readset_id: Some(4), analysis_id: Some(7), genome_id: Some(2) });
    }
}
