
use log::{debug, trace};
use std::path::{Path, PathBuf};

use crate::data_types::file_type::TypeHierarchy;
use crate::util::file_probe::FileProbe;

/// Outcome of a lookup. When nothing was found, `path` is the expected location.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub path: PathBuf,
    pub found: bool,
    /// Directories inspected, in the order they were checked
    pub searched: Vec<PathBuf>
}

/// Locates artifacts across nested split/join working directories.
/// Each derivation level nests output two directories deeper, so a file derived through D types is
/// expected 2×D levels above the current analysis directory. If it is not there, the directories between
/// the expected one and the current one are checked, closest to the expected directory first.
pub struct DirectoryResolver<'a> {
    hierarchy: &'a TypeHierarchy,
    probe: &'a dyn FileProbe
}

impl<'a> DirectoryResolver<'a> {
    pub fn new(hierarchy: &'a TypeHierarchy, probe: &'a dyn FileProbe) -> Self {
        Self { hierarchy, probe }
    }

    /// The directory a file with this name is expected in: two levels up per entry in its derivation chain.
    /// There is no extra base offset; job directories have no per-protocol subdirectory above
    /// `splits/<child>`, so a chain of length L lands exactly 2×L levels up.
    pub fn expected_dir(&self, analysis_dir: &Path, name: &str) -> PathBuf {
        let depth = self.hierarchy.derivation_chain(name)
            .map(|chain| chain.len())
            .unwrap_or(0);
        let mut dir = analysis_dir;
        for _level in 0..(2 * depth) {
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break
            };
        }
        dir.to_path_buf()
    }

    /// Finds `name` for a job whose current analysis directory is `analysis_dir`.
    /// Read-only; only existence checks through the probe.
    pub fn resolve(&self, analysis_dir: &Path, name: &str) -> Resolution {
        if self.hierarchy.derivation_chain(name).is_none() {
            let path = analysis_dir.join(name);
            return Resolution {
                found: self.probe.exists(&path),
                path,
                searched: vec![analysis_dir.to_path_buf()]
            };
        }

        let expected_dir = self.expected_dir(analysis_dir, name);
        let expected = expected_dir.join(name);
        let mut searched = vec![expected_dir.clone()];
        if self.probe.exists(&expected) {
            return Resolution { path: expected, found: true, searched };
        }

        // every directory strictly below the expected one, down to the analysis directory
        let mut between: Vec<&Path> = vec![];
        let mut current = Some(analysis_dir);
        while let Some(dir) = current {
            if dir == expected_dir {
                break;
            }
            between.push(dir);
            current = dir.parent();
        }

        for dir in between.into_iter().rev() {
            searched.push(dir.to_path_buf());
            let candidate = dir.join(name);
            trace!("Checking alternate location {candidate:?}");
            if self.probe.exists(&candidate) {
                debug!("Found {name} in alternate directory {dir:?}");
                return Resolution { path: candidate, found: true, searched };
            }
        }

        Resolution { path: expected, found: false, searched }
    }
}
