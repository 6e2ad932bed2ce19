// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! On-disk report cache
//!
//! Entries are serialized [`Report`]s named by the `blake3` hash of the tool
//! version, the engine settings and the contents of every input file.

use crate::config::EngineConfig;
use crate::report::Report;
use fv_common::{FvError, FvResult, TOOL_VERSION};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ReportCache {
    dir: PathBuf,
}

impl ReportCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Content hash of a run
    ///
    /// Unreadable files hash their error kind, so a file that later becomes
    /// readable misses the cache.
    pub fn key(&self, files: &[PathBuf], config: &EngineConfig) -> FvResult<String> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(TOOL_VERSION.as_bytes());
        hasher.update(&[0]);
        hasher.update(config.fingerprint()?.as_bytes());
        hasher.update(&[0]);
        for path in files {
            hasher.update(path.display().to_string().as_bytes());
            hasher.update(&[0]);
            match fs::read(path) {
                Ok(bytes) => {
                    hasher.update(&(bytes.len() as u64).to_le_bytes());
                    hasher.update(&bytes);
                }
                Err(err) => {
                    hasher.update(b"!");
                    hasher.update(err.kind().to_string().as_bytes());
                }
            }
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    fn entry(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Cached report, `None` when missing or unreadable
    pub fn load(&self, key: &str) -> Option<Report> {
        let path = self.entry(key);
        let text = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&text) {
            Ok(report) => Some(report),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "ignoring corrupt cache entry");
                None
            }
        }
    }

    pub fn store(&self, key: &str, report: &Report) -> FvResult<()> {
        fs::create_dir_all(&self.dir).map_err(|err| FvError::io(&self.dir, err))?;
        let path = self.entry(key);
        let staging = self.dir.join(format!("{}.json.tmp", key));
        let json = serde_json::to_string(report)?;
        fs::write(&staging, json).map_err(|err| FvError::io(&staging, err))?;
        fs::rename(&staging, &path).map_err(|err| FvError::io(&path, err))?;
        debug!(path = %path.display(), "report cached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_depends_on_contents_and_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("main.go");
        fs::write(&file, "package main\n").unwrap();
        let cache = ReportCache::new(dir.path().join("cache"));
        let config = EngineConfig::default();

        let first = cache.key(std::slice::from_ref(&file), &config).unwrap();
        assert_eq!(first, cache.key(std::slice::from_ref(&file), &config).unwrap());
        assert_ne!(first, cache.key(std::slice::from_ref(&file), &config.clone().with_iteration_cap(3)).unwrap());

        fs::write(&file, "package main\n\nfunc f() {}\n").unwrap();
        assert_ne!(first, cache.key(std::slice::from_ref(&file), &config).unwrap());
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ReportCache::new(dir.path());
        assert!(cache.load("abc").is_none());
        let report = Report::empty(TOOL_VERSION);
        cache.store("abc", &report).unwrap();
        assert_eq!(cache.load("abc"), Some(report));
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        assert!(ReportCache::new(dir.path()).load("bad").is_none());
    }
}
