
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Read-only existence checks, abstracted so resolution logic can be tested without touching disk
pub trait FileProbe: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}

/// Checks the real file system
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskProbe;

impl FileProbe for DiskProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// A set of paths that are considered present
#[derive(Debug, Default)]
pub struct MemoryProbe {
    paths: RwLock<BTreeSet<PathBuf>>
}

impl MemoryProbe {
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Self {
        let probe = Self::default();
        for p in paths.iter() {
            probe.add(p.as_ref());
        }
        probe
    }

    pub fn add(&self, path: &Path) {
        if let Ok(mut guard) = self.paths.write() {
            guard.insert(path.to_path_buf());
        }
    }

    pub fn remove(&self, path: &Path) {
        if let Ok(mut guard) = self.paths.write() {
            guard.remove(path);
        }
    }
}

impl FileProbe for MemoryProbe {
    fn exists(&self, path: &Path) -> bool {
        match self.paths.read() {
            Ok(guard) => guard.contains(path),
            Err(_) => false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_probe() {
        let probe = MemoryProbe::new(&["/a/b.txt"]);
        assert!(probe.exists(Path::new("/a/b.txt")));
        assert!(!probe.exists(Path::new("/a/c.txt")));
        probe.add(Path::new("/a/c.txt"));
        assert!(probe.exists(Path::new("/a/c.txt")));
        probe.remove(Path::new("/a/b.txt"));
        assert!(!probe.exists(Path::new("/a/b.txt")));
    }
}
