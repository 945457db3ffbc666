//! Saved build environment and source discovery.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::{EngineError, Result};

/// File inside the doctree directory holding the saved environment.
pub const ENV_FILENAME: &str = "environment.json";

const ENV_VERSION: u32 = 1;

/// A source document found under the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Path relative to the source directory, `/`-separated, without suffix.
    pub docname: String,
    pub path: PathBuf,
    /// Modification time in milliseconds since the epoch.
    pub mtime: u64,
}

/// What the previous build knew about the sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    pub version: u32,
    /// Fingerprint of the configuration values the environment depends on.
    pub config: String,
    pub documents: BTreeMap<String, u64>,
}

impl BuildEnvironment {
    pub fn new(config: String) -> Self {
        Self {
            version: ENV_VERSION,
            config,
            documents: BTreeMap::new(),
        }
    }

    /// Load the environment saved in `doctree_dir`.
    ///
    /// A missing, unreadable or outdated file yields `None`; the caller
    /// then starts from scratch.
    pub fn load(doctree_dir: &Path) -> Result<Option<Self>> {
        let path = doctree_dir.join(ENV_FILENAME);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(EngineError::io(
                    format!("failed to read {}", path.display()),
                    err,
                ));
            }
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(env) if env.version == ENV_VERSION => Ok(Some(env)),
            Ok(env) => {
                debug!(version = env.version, "discarding environment of another version");
                Ok(None)
            }
            Err(err) => {
                debug!(error = %err, "discarding unreadable environment");
                Ok(None)
            }
        }
    }

    pub fn save(&self, doctree_dir: &Path) -> Result<()> {
        fs::create_dir_all(doctree_dir).map_err(|e| {
            EngineError::io(format!("failed to create {}", doctree_dir.display()), e)
        })?;
        let path = doctree_dir.join(ENV_FILENAME);
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            EngineError::io("failed to serialize environment", io::Error::other(e))
        })?;
        fs::write(&path, json)
            .map_err(|e| EngineError::io(format!("failed to write {}", path.display()), e))
    }

    /// Sources that are new or changed since this environment was saved.
    pub fn outdated<'a>(&self, sources: &'a [Source]) -> Vec<&'a Source> {
        sources
            .iter()
            .filter(|s| self.documents.get(&s.docname) != Some(&s.mtime))
            .collect()
    }

    /// Documents known to this environment that no longer exist.
    pub fn removed(&self, sources: &[Source]) -> Vec<String> {
        self.documents
            .keys()
            .filter(|name| !sources.iter().any(|s| &s.docname == *name))
            .cloned()
            .collect()
    }

    pub fn record(&mut self, source: &Source) {
        self.documents.insert(source.docname.clone(), source.mtime);
    }

    pub fn forget(&mut self, docname: &str) {
        self.documents.remove(docname);
    }
}

/// Build a matcher for `exclude_patterns`, rooted at `srcdir`.
fn exclude_matcher(srcdir: &Path, patterns: &[String]) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(srcdir);
    for pattern in patterns {
        builder.add_line(None, pattern).map_err(|e| {
            EngineError::Config(format!("invalid exclude pattern {pattern:?}: {e}"))
        })?;
    }
    builder
        .build()
        .map_err(|e| EngineError::Config(format!("invalid exclude patterns: {e}")))
}

/// Find every source document under `srcdir`.
///
/// Hidden entries, anything matching `exclude_patterns`, and the given
/// `skip` directories (output locations nested in the source tree) are
/// left out. The result is sorted by docname.
pub fn collect_sources(
    srcdir: &Path,
    suffixes: &[String],
    exclude_patterns: &[String],
    skip: &[&Path],
) -> Result<Vec<Source>> {
    let matcher = exclude_matcher(srcdir, exclude_patterns)?;
    let mut sources = Vec::new();

    let walker = WalkDir::new(srcdir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let skipped = skip.iter().any(|dir| entry.path() == *dir);
            let excluded = matcher
                .matched(entry.path(), entry.file_type().is_dir())
                .is_ignore();
            !(hidden || skipped || excluded)
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let context = format!("failed to walk {}", srcdir.display());
            EngineError::io(context, io::Error::other(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(srcdir) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        let Some(docname) = suffixes
            .iter()
            .find_map(|suffix| relative.strip_suffix(suffix.as_str()))
        else {
            trace!(path = %relative, "not a source document");
            continue;
        };

        let mtime = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

        sources.push(Source {
            docname: docname.to_string(),
            path: entry.path().to_path_buf(),
            mtime,
        });
    }

    debug!(count = sources.len(), srcdir = %srcdir.display(), "collected sources");
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn suffixes() -> Vec<String> {
        vec![".rst".to_string(), ".md".to_string()]
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "Title\n=====\n").unwrap();
    }

    #[test]
    fn test_collect_sources_filters() {
        let temp = TempDir::new().unwrap();
        let src = temp.path();
        touch(src, "index.rst");
        touch(src, "guide/intro.md");
        touch(src, "notes.txt");
        touch(src, ".hidden/secret.rst");
        touch(src, "drafts/wip.rst");
        touch(src, "_build/html/old.rst");

        let build = src.join("_build");
        let sources = collect_sources(
            src,
            &suffixes(),
            &["drafts".to_string()],
            &[build.as_path()],
        )
        .unwrap();

        let names: Vec<&str> = sources.iter().map(|s| s.docname.as_str()).collect();
        assert_eq!(names, vec!["guide/intro", "index"]);
    }

    #[test]
    fn test_load_missing_environment() {
        let temp = TempDir::new().unwrap();
        assert_eq!(BuildEnvironment::load(temp.path()).unwrap(), None);
    }

    #[test]
    fn test_save_and_detect_changes() {
        let temp = TempDir::new().unwrap();
        let doctrees = temp.path().join(".doctrees");

        let a = Source {
            docname: "a".to_string(),
            path: PathBuf::from("a.rst"),
            mtime: 10,
        };
        let b = Source {
            docname: "b".to_string(),
            path: PathBuf::from("b.rst"),
            mtime: 20,
        };

        let mut env = BuildEnvironment::new("cfg".to_string());
        env.record(&a);
        env.record(&b);
        env.save(&doctrees).unwrap();

        let loaded = BuildEnvironment::load(&doctrees).unwrap().unwrap();
        assert_eq!(loaded, env);

        let changed_b = Source { mtime: 21, ..b };
        let c = Source {
            docname: "c".to_string(),
            path: PathBuf::from("c.rst"),
            mtime: 5,
        };
        let now = vec![changed_b, c];
        let outdated: Vec<&str> = loaded
            .outdated(&now)
            .into_iter()
            .map(|s| s.docname.as_str())
            .collect();
        assert_eq!(outdated, vec!["b", "c"]);
        assert_eq!(loaded.removed(&now), vec!["a"]);
    }

    #[test]
    fn test_corrupt_environment_is_discarded() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(ENV_FILENAME), "{not json").unwrap();
        assert_eq!(BuildEnvironment::load(temp.path()).unwrap(), None);
    }
}
