
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;

use crate::artifacts::metadata::{MetadataStore, Table};
use crate::data_types::artifact::{Artifact, ArtifactRole, ArtifactState, Associations};
use crate::data_types::recorded_action::RecordedAction;
use crate::errors::{JobResult, RegistrationError};
use crate::steps::StepOutput;

/// Counts from a cleanup sweep
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Intermediates removed from disk
    pub deleted: usize,
    /// Intermediates already gone before the sweep
    pub missing: usize,
    /// Deletes that failed; logged and otherwise ignored
    pub failed: usize
}

/// Every file a job produced or consumed, keyed by path, in the order first seen
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ArtifactStore {
    artifacts: Vec<Artifact>
}

impl ArtifactStore {
    /// Records an output on the action and tracks it under the given role.
    /// If the path is already tracked, the role is updated and associations are merged.
    pub fn add_output(&mut self, action: &mut RecordedAction, label: &str, path: &Path, role: ArtifactRole, associations: Associations) {
        action.add_output(label, path, role);
        self.upsert(label, path, role, associations);
    }

    /// Tracks a file that only exists to feed a later stage
    pub fn add_intermediate(&mut self, path: &Path, label: &str) {
        self.upsert(label, path, ArtifactRole::Intermediate, Associations::default());
    }

    /// Records an input on the action. Inputs never demote a file this job already produced.
    pub fn add_input(&mut self, action: &mut RecordedAction, label: &str, path: &Path) {
        action.add_input(label, path);
        if self.get(path).is_none() {
            self.artifacts.push(Artifact::new(path.to_path_buf(), label.to_string(), ArtifactRole::Input, Associations::default()));
        }
    }

    /// Tracks every file from a step with the role the step assigned
    pub fn add_step_outputs(&mut self, action: &mut RecordedAction, output: &StepOutput, associations: Associations) {
        for (label, path, role) in output.files().iter() {
            if *role == ArtifactRole::Input {
                self.add_input(action, label, path);
            } else {
                self.add_output(action, label, path, *role, associations);
            }
        }
    }

    /// Demotes a tracked output to intermediate, e.g. a BAM superseded by post-processing
    pub fn demote_to_intermediate(&mut self, path: &Path) {
        if let Some(artifact) = self.get_mut(path) {
            if artifact.role() == ArtifactRole::FinalOutput {
                debug!("Demoting {path:?} to intermediate");
                artifact.set_role(ArtifactRole::Intermediate);
            }
        }
    }

    /// Fills unset associations for a tracked file; returns false if the path is unknown
    pub fn associate(&mut self, path: &Path, associations: Associations) -> bool {
        match self.get_mut(path) {
            Some(artifact) => {
                artifact.associations_mut().merge(&associations);
                true
            },
            None => false
        }
    }

    pub fn get(&self, path: &Path) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.path() == path)
    }

    fn get_mut(&mut self, path: &Path) -> Option<&mut Artifact> {
        self.artifacts.iter_mut().find(|a| a.path() == path)
    }

    fn upsert(&mut self, label: &str, path: &Path, role: ArtifactRole, associations: Associations) {
        match self.get_mut(path) {
            Some(existing) => {
                existing.set_role(role);
                existing.associations_mut().merge(&associations);
            },
            None => {
                self.artifacts.push(Artifact::new(path.to_path_buf(), label.to_string(), role, associations));
            }
        };
    }

    pub fn final_outputs(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| a.role() == ArtifactRole::FinalOutput)
    }

    pub fn intermediates(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter().filter(|a| a.role() == ArtifactRole::Intermediate)
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Folds a split child's store into this one on join
    pub fn merge_child(&mut self, child: ArtifactStore) {
        for artifact in child.artifacts.into_iter() {
            match self.get_mut(artifact.path()) {
                Some(existing) => {
                    // an output anywhere in the tree outranks an input record
                    if artifact.role() != ArtifactRole::Input {
                        existing.set_role(artifact.role());
                    }
                    existing.associations_mut().merge(artifact.associations());
                    if artifact.state() == ArtifactState::Deleted {
                        existing.mark_deleted();
                    }
                },
                None => self.artifacts.push(artifact)
            };
        }
    }

    /// Deletes every intermediate that still exists. Failures are logged and counted, never returned.
    pub fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for artifact in self.artifacts.iter_mut()
            .filter(|a| a.role() == ArtifactRole::Intermediate && a.state() == ArtifactState::Present) {
            let path = artifact.path().to_path_buf();
            if !path.exists() {
                debug!("Intermediate already removed: {path:?}");
                artifact.mark_deleted();
                report.missing += 1;
                continue;
            }

            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => {
                    info!("Deleting intermediate file: {path:?}");
                    artifact.mark_deleted();
                    report.deleted += 1;
                },
                Err(e) => {
                    error!("Unable to delete intermediate file {path:?}: {e}");
                    report.failed += 1;
                }
            };
        }
        report
    }

    /// Every reason a final output could not be registered; empty means all are registrable
    pub fn registration_problems(&self) -> Vec<RegistrationError> {
        self.final_outputs()
            .filter_map(|a| check_registrable(a).err())
            .collect()
    }

    /// Registers every final output in one transaction, returning the new row ids in store order.
    /// # Errors
    /// * `JobError::Registration` if any final output fails its precondition; nothing is written
    /// * metadata store failures
    pub fn register_final_outputs(&self, metadata: &MetadataStore) -> JobResult<Vec<u64>> {
        if let Some(problem) = self.registration_problems().into_iter().next() {
            warn!("Refusing to register outputs: {problem}");
            return Err(problem.into());
        }

        let mut txn = metadata.begin();
        let mut ids = vec![];
        for artifact in self.final_outputs() {
            let assoc = artifact.associations();
            let row = json!({
                "name": artifact.path().file_name().map(|f| f.to_string_lossy().to_string()),
                "category": artifact.label(),
                "dataFileUrl": artifact.path().to_string_lossy(),
                "readset": assoc.readset_id,
                "analysis_id": assoc.analysis_id,
                "library_id": assoc.genome_id
            });
            if let serde_json::Value::Object(map) = row {
                let id = txn.insert(Table::OutputFiles, map)?;
                debug!("Registered output {:?} as {id}", artifact.path());
                ids.push(id);
            }
        }
        txn.commit()?;
        Ok(ids)
    }
}

/// Precondition for registering an artifact as a queryable record
/// # Errors
/// * if the artifact is not a final output, is gone from disk, or has no association
pub fn check_registrable(artifact: &Artifact) -> Result<(), RegistrationError> {
    let path = artifact.path().display().to_string();
    if artifact.role() != ArtifactRole::FinalOutput {
        return Err(RegistrationError::NotFinalOutput { path, role: artifact.role().to_string() });
    }
    if artifact.state() == ArtifactState::Deleted || !artifact.path().exists() {
        return Err(RegistrationError::MissingFile { path });
    }
    if !artifact.associations().is_queryable() {
        return Err(RegistrationError::MissingAssociation { path, label: artifact.label().to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::JobError;

    #[test]
    fn test_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let sam = tmp.path().join("s1.sam");
        let bam = tmp.path().join("s1.bam");
        std::fs::write(&sam, "x").unwrap();
        std::fs::write(&bam, "x").unwrap();

        let mut store = ArtifactStore::default();
        let mut action = RecordedAction::new("Alignment");
        store.add_intermediate(&sam, "SAM");
        store.add_intermediate(&tmp.path().join("never_made.sam"), "SAM");
        store.add_output(&mut action, "Aligned BAM", &bam, ArtifactRole::FinalOutput, Associations { readset_id: Some(1), ..Default::default() });

        let report = store.cleanup();
        assert_eq!(report, CleanupReport { deleted: 1, missing: 1, failed: 0 });
        assert!(!sam.exists());
        assert!(bam.exists());
        assert!(store.intermediates().all(|a| a.state() == ArtifactState::Deleted));
        assert_eq!(action.outputs().len(), 1);

        // a second sweep is a no-op
        assert_eq!(store.cleanup(), CleanupReport::default());
    }

    #[test]
    fn test_input_does_not_demote() {
        let mut store = ArtifactStore::default();
        let mut action = RecordedAction::new("Analysis");
        let bam = Path::new("/work/s1.bam");
        store.add_output(&mut action, "Aligned BAM", bam, ArtifactRole::FinalOutput, Associations::default());
        store.add_input(&mut action, "Input BAM", bam);
        assert_eq!(store.get(bam).unwrap().role(), ArtifactRole::FinalOutput);
        assert_eq!(action.inputs().len(), 1);

        store.demote_to_intermediate(bam);
        assert_eq!(store.intermediates().count(), 1);
    }

    #[test]
    fn test_merge_child() {
        let mut parent = ArtifactStore::default();
        let mut action = RecordedAction::new("init");
        parent.add_input(&mut action, "Reference FASTA", Path::new("/w/Shared/Custom.fasta"));

        let mut child = ArtifactStore::default();
        let mut child_action = RecordedAction::new("align");
        child.add_output(&mut child_action, "Aligned BAM", Path::new("/w/splits/j.0/s1.bam"), ArtifactRole::FinalOutput, Associations::default());
        child.add_input(&mut child_action, "Reference FASTA", Path::new("/w/Shared/Custom.fasta"));

        parent.merge_child(child);
        assert_eq!(parent.len(), 2);
        assert_eq!(parent.final_outputs().count(), 1);
    }

    #[test]
    fn test_registration_precondition() {
        let tmp = tempfile::tempdir().unwrap();
        let vcf = tmp.path().join("s1.vcf.gz");
        std::fs::write(&vcf, "x").unwrap();

        let mut store = ArtifactStore::default();
        let mut action = RecordedAction::new("Analysis");
        store.add_output(&mut action, "VCF", &vcf, ArtifactRole::FinalOutput, Associations::default());

        let metadata = MetadataStore::in_memory();
        match store.register_final_outputs(&metadata) {
            Err(JobError::Registration(RegistrationError::MissingAssociation { label, .. })) => assert_eq!(label, "VCF"),
            other => panic!("unexpected result: {other:?}")
        }
        assert_eq!(metadata.count(Table::OutputFiles).unwrap(), 0);

        assert!(store.associate(&vcf, Associations::with_genome(Some(3))));
        let ids = store.register_final_outputs(&metadata).unwrap();
        assert_eq!(ids, vec![1]);
        let row = metadata.get(Table::OutputFiles, 1).unwrap().unwrap();
        assert_eq!(row["library_id"], json!(3));
        assert_eq!(row["category"], json!("VCF"));
    }
}
