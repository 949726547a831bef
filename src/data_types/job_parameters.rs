
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{JobError, JobResult};

/// Prefix used for per-sample readset descriptions
pub const SAMPLE_PREFIX: &str = "sample_";

/// Flat string-keyed job parameters.
/// Some values are JSON text describing nested objects (e.g. `sample_0`); those are decoded on request.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct JobParameters {
    values: BTreeMap<String, String>
}

/// One `sample_N` entry describing a readset to create or reuse
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SampleDescriptor {
    /// Existing readset row id; None or 0 means a new readset must be created
    #[serde(default, alias = "readset")]
    pub readset_id: Option<u64>,
    /// Display name of the readset
    #[serde(default, alias = "readsetname")]
    pub readset_name: Option<String>,
    /// Forward (or only) read file name
    #[serde(rename = "fileName")]
    pub file_name: String,
    /// Reverse read file name if paired
    #[serde(default, rename = "fileName2")]
    pub file_name2: Option<String>,
    /// Reference library (genome) id
    #[serde(default)]
    pub library_id: Option<u64>,
    /// Sequencing platform
    #[serde(default)]
    pub platform: Option<String>
}

impl SampleDescriptor {
    /// True when an existing readset should be reused
    pub fn has_existing_readset(&self) -> bool {
        matches!(self.readset_id, Some(id) if id != 0)
    }
}

impl JobParameters {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Builds parameters from a parsed JSON object; non-string values are stored as their JSON text
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        let values = object.iter()
            .map(|(k, v)| {
                let s = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string()
                };
                (k.clone(), s)
            })
            .collect();
        Self { values }
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Returns the value or a configuration error naming the missing key
    pub fn require(&self, key: &str) -> JobResult<&str> {
        self.get(key)
            .ok_or_else(|| JobError::config(format!("Missing required parameter: {key}")))
    }

    pub fn get_f64(&self, key: &str) -> JobResult<Option<f64>> {
        self.get(key)
            .map(|v| v.parse::<f64>()
                .map_err(|e| JobError::config(format!("Parameter {key} is not a number ({v:?}): {e}"))))
            .transpose()
    }

    pub fn get_i64(&self, key: &str) -> JobResult<Option<i64>> {
        self.get(key)
            .map(|v| v.parse::<i64>()
                .map_err(|e| JobError::config(format!("Parameter {key} is not an integer ({v:?}): {e}"))))
            .transpose()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key).map(|v| v.to_ascii_lowercase()).as_deref(), Some("true") | Some("1") | Some("on"))
    }

    /// Splits a comma separated list value, dropping empty entries
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect())
            .unwrap_or_default()
    }

    /// Decodes a JSON-encoded value into any deserializable type
    pub fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> JobResult<Option<T>> {
        match self.get(key) {
            Some(v) => {
                let parsed = serde_json::from_str(v)
                    .map_err(|e| JobError::config(format!("Parameter {key} is not valid JSON: {e}")))?;
                Ok(Some(parsed))
            },
            None => Ok(None)
        }
    }

    /// Decodes every `sample_N` entry, ordered by N
    pub fn sample_descriptors(&self) -> JobResult<Vec<SampleDescriptor>> {
        let mut indexed: Vec<(u64, SampleDescriptor)> = vec![];
        for key in self.values.keys().filter(|k| k.starts_with(SAMPLE_PREFIX)) {
            let index: u64 = key[SAMPLE_PREFIX.len()..].parse()
                .map_err(|_e| JobError::config(format!("Sample key must be sample_<number>: {key}")))?;
            if let Some(descriptor) = self.get_json::<SampleDescriptor>(key)? {
                indexed.push((index, descriptor));
            }
        }
        indexed.sort_by_key(|(i, _d)| *i);
        Ok(indexed.into_iter().map(|(_i, d)| d).collect())
    }

    /// Optional genome id shared by the job
    pub fn library_id(&self) -> JobResult<Option<u64>> {
        Ok(self.get_i64("library_id")?.map(|v| v as u64))
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example() -> JobParameters {
        let json: serde_json::Value = serde_json::json!({
            "alignment": "BWA-Mem",
            "referenceLibraryCreation": " Custom ",
            "minAfThreshold": 0.05,
            "library_id": 7,
            "sample_10": {"readset": 0, "fileName": "s10_R1.fastq.gz"},
            "sample_2": "{\"readset\": 12, \"fileName\": \"s2_R1.fastq.gz\", \"fileName2\": \"s2_R2.fastq.gz\"}",
            "empty": ""
        });
        JobParameters::from_json_object(json.as_object().unwrap())
    }

    #[test]
    fn test_basic_getters() {
        let params = example();
        assert_eq!(params.get("alignment"), Some("BWA-Mem"));
        assert_eq!(params.get("referenceLibraryCreation"), Some("Custom"));
        assert_eq!(params.get("empty"), None);
        assert!(params.require("missing").is_err());
        assert_eq!(params.get_f64("minAfThreshold").unwrap(), Some(0.05));
        assert_eq!(params.library_id().unwrap(), Some(7));
        assert!(params.get_i64("alignment").is_err());
        assert_eq!(params.get_list("alignment"), vec!["BWA-Mem".to_string()]);
    }

    #[test]
    fn test_sample_descriptors() {
        let params = example();
        let samples = params.sample_descriptors().unwrap();
        assert_eq!(samples.len(), 2);

        // numeric ordering, not lexicographic
        assert_eq!(samples[0].file_name, "s2_R1.fastq.gz");
        assert_eq!(samples[0].file_name2.as_deref(), Some("s2_R2.fastq.gz"));
        assert!(samples[0].has_existing_readset());
        assert_eq!(samples[1].file_name, "s10_R1.fastq.gz");
        assert!(!samples[1].has_existing_readset());
    }

    #[test]
    fn test_bad_sample_key() {
        let mut params = JobParameters::default();
        params.insert("sample_x", "{}");
        assert!(params.sample_descriptors().is_err());
    }
}
