
use log::{debug, info};
use serde_json::json;
use std::path::PathBuf;

use crate::artifacts::artifact_store::ArtifactStore;
use crate::artifacts::metadata::{Row, Table, ROW_ID_FIELD};
use crate::data_types::artifact::{ArtifactRole, Associations};
use crate::data_types::file_type::FileType;
use crate::data_types::job::Job;
use crate::data_types::recorded_action::RecordedAction;
use crate::errors::{JobError, JobResult};
use crate::parsing::fastq_pairing::alignment_basename;
use crate::pipeline::task::{PipelineTask, TaskContext, TaskId};

/// Creates readset and analysis records for the aligned readsets, all in one transaction
#[derive(Clone, Copy, Debug, Default)]
pub struct ImportTask;

fn to_row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Row::new()
    }
}

impl ImportTask {
    /// The final BAM produced from a readset's reads: named `<basename>.bam` or `<basename>.<suffix>.bam`
    fn final_bam(store: &ArtifactStore, file_name: &str) -> Option<PathBuf> {
        let basename = alignment_basename(std::path::Path::new(file_name));
        let bam = FileType::bam();
        store.final_outputs()
            .filter(|a| {
                let name = a.path().file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default();
                bam.is_type(&name) && (name == format!("{basename}.bam") || name.starts_with(&format!("{basename}.")))
            })
            .map(|a| a.path().to_path_buf())
            .next()
    }
}

impl PipelineTask for ImportTask {
    fn task_id(&self) -> TaskId {
        TaskId::Import
    }

    fn status_name(&self) -> &'static str {
        "Importing Results"
    }

    fn is_participant(&self, job: &Job) -> bool {
        job.is_alignment_used()
    }

    fn run(&self, job: &mut Job, store: &mut ArtifactStore, ctx: &TaskContext) -> JobResult<RecordedAction> {
        let action = RecordedAction::new(self.status_name());
        let genome_id = job.reference_genome().and_then(|g| g.genome_id());
        let mut txn = ctx.metadata.begin();
        let mut updates: Vec<(String, Associations)> = vec![];

        for readset in job.cached_readsets().iter() {
            let readset_id = if readset.has_existing_readset() {
                let id = readset.readset_id.unwrap_or_default();
                let existing = txn.select(Table::Readsets, ROW_ID_FIELD, &json!(id))?;
                if existing.is_empty() {
                    return Err(JobError::data(format!("Readset with RowId: {id} does not exist, aborting")));
                }
                id
            } else {
                let id = txn.insert(Table::Readsets, to_row(json!({
                    "name": readset.readset_name,
                    "platform": readset.platform,
                    "fileName": readset.file_name,
                    "fileName2": readset.file_name2,
                    "library_id": readset.library_id.or(genome_id)
                })))?;
                info!("Created readset: {id}");
                id
            };

            let bam = Self::final_bam(store, &readset.file_name)
                .ok_or_else(|| JobError::data(format!(
                    "Unable to find moved alignment file with name: {}", readset.file_name
                )))?;
            let analysis_id = txn.insert(Table::Analyses, to_row(json!({
                "readset": readset_id,
                "alignmentfile": bam.to_string_lossy(),
                "library_id": readset.library_id.or(genome_id),
                "description": format!("Analysis of readset {readset_id}")
            })))?;
            info!("Created analysis: {analysis_id}");

            let associations = Associations {
                readset_id: Some(readset_id),
                analysis_id: Some(analysis_id),
                genome_id
            };
            updates.push((alignment_basename(std::path::Path::new(&readset.file_name)), associations));
        }
        txn.commit()?;

        // every final output named after the readset's reads belongs to its analysis
        for (basename, associations) in updates.into_iter() {
            let paths: Vec<PathBuf> = store.artifacts().iter()
                .filter(|a| a.role() == ArtifactRole::FinalOutput)
                .filter(|a| a.path().file_name()
                    .map(|f| f.to_string_lossy().starts_with(&format!("{basename}.")))
                    .unwrap_or(false))
                .map(|a| a.path().to_path_buf())
                .collect();
            for path in paths.iter() {
                debug!("Associating {path:?} with {associations:?}");
                store.associate(path, associations);
            }
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tasks::tests::{custom_params, Fixture};

    fn store_with_bam(dir: &std::path::Path) -> ArtifactStore {
        let bam = dir.join("s1.cleaned.bam");
        std::fs::write(&bam, "bam").unwrap();
        let mut store = ArtifactStore::default();
        let mut action = RecordedAction::new("Performing Analysis");
        store.add_output(&mut action, "Cleaned BAM", &bam, ArtifactRole::FinalOutput, Associations::with_genome(Some(3)));
        store
    }

    #[test]
    fn test_import() {
        let fixture = Fixture::new();
        let mut job = fixture.job(custom_params(), &["s1_R1.fastq", "s1_R2.fastq"]);
        job.cache_readsets(job.parameters().sample_descriptors().unwrap());
        let mut store = store_with_bam(fixture.tmp.path());

        ImportTask.run(&mut job, &mut store, &fixture.ctx()).unwrap();
        assert_eq!(fixture.metadata.count(Table::Readsets).unwrap(), 1);
        assert_eq!(fixture.metadata.count(Table::Analyses).unwrap(), 1);
        let bam = store.get(&fixture.tmp.path().join("s1.cleaned.bam")).unwrap();
        assert_eq!(bam.associations().readset_id, Some(1));
        assert_eq!(bam.associations().analysis_id, Some(1));
    }

    #[test]
    fn test_missing_bam_rolls_back() {
        let fixture = Fixture::new();
        let mut job = fixture.job(custom_params(), &["s1_R1.fastq"]);
        job.cache_readsets(job.parameters().sample_descriptors().unwrap());
        let err = ImportTask.run(&mut job, &mut ArtifactStore::default(), &fixture.ctx()).unwrap_err();
        assert!(err.to_string().contains("Unable to find moved alignment file with name: s1_R1.fastq"));
        // the readset staged before the failure was never committed
        assert_eq!(fixture.metadata.count(Table::Readsets).unwrap(), 0);
    }

    #[test]
    fn test_unknown_existing_readset() {
        let fixture = Fixture::new();
        let mut params = custom_params();
        params.insert("sample_0", r#"{"readset": 42, "fileName": "s1_R1.fastq"}"#);
        let mut job = fixture.job(params, &["s1_R1.fastq"]);
        job.cache_readsets(job.parameters().sample_descriptors().unwrap());
        let mut store = store_with_bam(fixture.tmp.path());
        let err = ImportTask.run(&mut job, &mut store, &fixture.ctx()).unwrap_err();
        assert!(err.to_string().contains("Readset with RowId: 42 does not exist"));
    }
}
