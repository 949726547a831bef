
/// Role-tagged tracking of every file a job touches
pub mod artifact_store;
/// Transactional lineage records (readsets, analyses, output files)
pub mod metadata;
