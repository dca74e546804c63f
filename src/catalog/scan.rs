//! @acp:module "File Index"
//! @acp:summary "Cached directory listing of a source root"
//! @acp:domain cli
//! @acp:layer service
//!
//! Walking a large source tree dominates catalog construction, and the
//! generator asks for files by name once per module. The tree is walked once;
//! glob and name lookups are answered from the listing and cached per
//! (root, pattern) until `invalidate` is called.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// @acp:summary "Lazily walked, cached listing of files under a root"
#[derive(Debug, Clone)]
pub struct FileIndex {
    root: PathBuf,
    exclude: Vec<Pattern>,
    /// Relative paths with `/` separators, sorted
    listing: Option<Vec<String>>,
    cache: HashMap<(PathBuf, String), Vec<PathBuf>>,
    by_name: HashMap<String, Vec<PathBuf>>,
}

impl FileIndex {
    pub fn new(root: impl Into<PathBuf>, exclude: &[String]) -> Self {
        let exclude = exclude
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid exclude pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();
        Self {
            root: root.into(),
            exclude,
            listing: None,
            cache: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drop the listing and every cached lookup
    pub fn invalidate(&mut self) {
        self.listing = None;
        self.cache.clear();
        self.by_name.clear();
    }

    fn listing(&mut self) -> &[String] {
        if self.listing.is_none() {
            let mut files: Vec<String> = WalkDir::new(&self.root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| {
                    let relative = e.path().strip_prefix(&self.root).ok()?;
                    let relative = relative.to_string_lossy().replace('\\', "/");
                    let excluded = self
                        .exclude
                        .iter()
                        .any(|p| p.matches_with(&relative, MATCH_OPTIONS));
                    (!excluded).then_some(relative)
                })
                .collect();
            files.sort();
            debug!("Indexed {} files under {}", files.len(), self.root.display());
            self.listing = Some(files);
        }
        self.listing.as_deref().unwrap_or_default()
    }

    /// Relative paths matching a glob pattern, in path order
    pub fn find(&mut self, pattern: &str) -> Vec<PathBuf> {
        let key = (self.root.clone(), pattern.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }

        let found: Vec<PathBuf> = match Pattern::new(pattern) {
            Ok(glob) => self
                .listing()
                .iter()
                .filter(|rel| glob.matches_with(rel, MATCH_OPTIONS))
                .map(PathBuf::from)
                .collect(),
            Err(e) => {
                warn!("Invalid pattern '{}': {}", pattern, e);
                Vec::new()
            }
        };
        self.cache.insert(key, found.clone());
        found
    }

    /// Relative paths whose file name is exactly `file_name`
    pub fn find_named(&mut self, file_name: &str) -> Vec<PathBuf> {
        if self.by_name.is_empty() {
            let mut by_name: HashMap<String, Vec<PathBuf>> = HashMap::new();
            for rel in self.listing() {
                let name = rel.rsplit('/').next().unwrap_or(rel);
                by_name
                    .entry(name.to_string())
                    .or_default()
                    .push(PathBuf::from(rel));
            }
            self.by_name = by_name;
        }
        self.by_name.get(file_name).cloned().unwrap_or_default()
    }

    /// Number of files in the listing
    pub fn len(&mut self) -> usize {
        self.listing().len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        for rel in [
            "bertos/kern/proc.c",
            "bertos/kern/proc.h",
            "bertos/cpu/avr/drv/ser_avr.c",
            "bertos/cfg/cfg_proc.h",
            "build/out.c",
        ] {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        dir
    }

    #[test]
    fn test_find_with_excludes() {
        let dir = tree();
        let mut index = FileIndex::new(dir.path(), &["build/**".to_string()]);
        let found = index.find("**/*.c");
        assert_eq!(
            found,
            vec![
                PathBuf::from("bertos/cpu/avr/drv/ser_avr.c"),
                PathBuf::from("bertos/kern/proc.c"),
            ]
        );
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn test_find_named() {
        let dir = tree();
        let mut index = FileIndex::new(dir.path(), &[]);
        assert_eq!(
            index.find_named("proc.h"),
            vec![PathBuf::from("bertos/kern/proc.h")]
        );
        assert!(index.find_named("missing.c").is_empty());
    }

    #[test]
    fn test_cache_until_invalidate() {
        let dir = tree();
        let mut index = FileIndex::new(dir.path(), &[]);
        assert_eq!(index.find("**/*.S").len(), 0);

        fs::write(dir.path().join("bertos/kern/switch.S"), "").unwrap();
        assert_eq!(index.find("**/*.S").len(), 0);

        index.invalidate();
        assert_eq!(index.find("**/*.S"), vec![PathBuf::from("bertos/kern/switch.S")]);
    }
}
