
use log::debug;
use std::path::Path;

use crate::data_types::job_parameters::JobParameters;
use crate::errors::{JobError, JobResult};
use crate::util::json_io::load_json;

/// Loads a flat job parameter map from a JSON object (optionally gzipped)
/// # Errors
/// * if the file cannot be parsed or is not a JSON object
pub fn load_job_parameters(params_fn: &Path) -> JobResult<JobParameters> {
    let value: serde_json::Value = load_json(params_fn)?;
    match value {
        serde_json::Value::Object(object) => {
            let params = JobParameters::from_json_object(&object);
            debug!("Loaded {} job parameters from {params_fn:?}", params.values().len());
            Ok(params)
        },
        other => Err(JobError::config(format!(
            "Job parameters in {} must be a JSON object, found: {}", params_fn.display(), json_kind(&other)
        )))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_parameters() {
        let tmp = tempfile::tempdir().unwrap();
        let params_fn = tmp.path().join("params.json");
        std::fs::write(&params_fn, r#"{
            "alignment": "BWA-Mem",
            "minCoverage": 10,
            "sample_0": {"readset": 0, "readsetname": "s1", "fileName": "s1_R1.fastq", "fileName2": "s1_R2.fastq"}
        }"#).unwrap();

        let params = load_job_parameters(&params_fn).unwrap();
        assert_eq!(params.get("alignment"), Some("BWA-Mem"));
        assert_eq!(params.get_i64("minCoverage").unwrap(), Some(10));
        let samples = params.sample_descriptors().unwrap();
        assert_eq!(samples[0].readset_name.as_deref(), Some("s1"));
        assert!(!samples[0].has_existing_readset());

        std::fs::write(&params_fn, "[1, 2]").unwrap();
        assert!(matches!(load_job_parameters(&params_fn), Err(JobError::Configuration(_))));
    }
}
