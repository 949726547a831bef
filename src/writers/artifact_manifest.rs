
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::artifacts::artifact_store::ArtifactStore;
use crate::data_types::artifact::ArtifactState;

/// Default file name, written at the top of the output directory
pub const ARTIFACT_MANIFEST_NAME: &str = "artifact_manifest.tsv";

#[derive(Serialize)]
struct ManifestRow {
    role: String,
    label: String,
    path: String,
    readset_id: Option<u64>,
    analysis_id: Option<u64>,
    genome_id: Option<u64>
}

/// Writes one row per tracked artifact that is still on disk
/// # Arguments
/// * `filename` - output path, tab-delimited
/// * `store` - the artifacts to report
pub fn write_artifact_manifest(filename: &Path, store: &ArtifactStore) -> csv::Result<()> {
    let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(filename)?;

    for artifact in store.artifacts().iter() {
        if artifact.state() == ArtifactState::Deleted {
            continue;
        }
        let associations = artifact.associations();
        csv_writer.serialize(ManifestRow {
            role: artifact.role().to_string(),
            label: artifact.label().to_string(),
            path: artifact.path().display().to_string(),
            readset_id: associations.readset_id,
            analysis_id: associations.analysis_id,
            genome_id: associations.genome_id
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}
