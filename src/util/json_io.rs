
use std::io::{BufWriter, Write};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::errors::JobResult;

/// Helper function that loads a file into some type, helpful generic
/// # Arguments
/// * `filename` - the file path to open and parse, gzip is detected by the `.gz` extension
/// # Errors
/// * if the file does not open properly
/// * if the deserialization throws errors
pub fn load_json<T: serde::de::DeserializeOwned>(filename: &Path) -> JobResult<T> {
    let fp: Box<dyn std::io::Read> = if filename.extension().unwrap_or_default() == "gz" {
        Box::new(
            flate2::read::MultiGzDecoder::new(
                File::open(filename)?
            )
        )
    } else {
        Box::new(File::open(filename)?)
    };
    let result: T = serde_json::from_reader(std::io::BufReader::new(fp))?;
    Ok(result)
}

/// This will save a generic serializable struct to JSON.
/// # Arguments
/// * `data` - the data in memory
/// * `out_filename` - user provided path to write to
/// # Errors
/// * if opening or writing to the file throw errors
/// * if JSON serialization throws errors
pub fn save_json<T: serde::Serialize>(data: &T, out_filename: &Path) -> JobResult<()> {
    let file: Box<dyn std::io::Write> = if out_filename.extension().unwrap_or_default() == "gz" {
        Box::new(
            flate2::write::GzEncoder::new(
                File::create(out_filename)?,
                flate2::Compression::best()
            )
        )
    } else {
        Box::new(File::create(out_filename)?)
    };
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)?;
    writer.flush()?;
    Ok(())
}

/// Saves JSON to a temporary sibling and renames it over the target, so readers never see a partial file
/// # Errors
/// * same as `save_json`, plus rename failures
pub fn save_json_atomic<T: serde::Serialize>(data: &T, out_filename: &Path) -> JobResult<()> {
    let mut tmp_name = out_filename.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_filename = PathBuf::from(tmp_name);
    save_json(data, &tmp_filename)?;
    std::fs::rename(&tmp_filename, out_filename)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_gz_and_atomic() {
        let tmp = tempfile::tempdir().unwrap();
        let mut data: BTreeMap<String, u64> = Default::default();
        data.insert("a".to_string(), 1);

        let gz_fn = tmp.path().join("data.json.gz");
        save_json(&data, &gz_fn).unwrap();
        let loaded: BTreeMap<String, u64> = load_json(&gz_fn).unwrap();
        assert_eq!(loaded, data);

        let plain_fn = tmp.path().join("data.json");
        save_json_atomic(&data, &plain_fn).unwrap();
        assert!(!tmp.path().join("data.json.tmp").exists());
        let loaded: BTreeMap<String, u64> = load_json(&plain_fn).unwrap();
        assert_eq!(loaded, data);
    }
}
