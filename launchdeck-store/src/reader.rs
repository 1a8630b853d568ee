//! Definition Store Reader.
//!
//! Enumerates `*.plist` files per domain, parses them into [`JobDefinition`]s
//! and keeps a modification-time cache so repeated listings only re-parse
//! files that actually changed. Read-only: listing never writes anything.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use launchdeck_core::types::{Domain, JobDefinition, JobKey};

use crate::error::{io_err, StoreError};
use crate::layout::DomainLayout;
use crate::parse::read_definition;

struct CacheEntry {
    modified: SystemTime,
    definition: JobDefinition,
}

/// Read-only view of the on-disk job definitions.
///
/// Cheap to share behind an `Arc`; the cache is interior state guarded by a
/// mutex, so listings from multiple threads stay coherent.
pub struct DefinitionStore {
    layout: DomainLayout,
    cache: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl DefinitionStore {
    pub fn new(layout: DomainLayout) -> Self {
        Self {
            layout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &DomainLayout {
        &self.layout
    }

    /// List every definition in one domain, in file-name order.
    ///
    /// - missing directory → empty listing (a user without
    ///   `~/Library/LaunchAgents` simply has no jobs there)
    /// - unreadable directory → [`StoreError::AccessDenied`]
    /// - unparseable file → `Malformed`-annotated entry, enumeration continues
    /// - duplicate labels keep the first file (file-name order) and warn
    pub fn list(&self, domain: Domain) -> Result<Vec<JobDefinition>, StoreError> {
        let dir = self.layout.dir(domain);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries =
            std::fs::read_dir(dir).map_err(|e| classify_read_dir_error(domain, dir, e))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "plist"))
            .collect();
        paths.sort();

        let mut seen_labels = HashSet::new();
        let mut definitions = Vec::with_capacity(paths.len());
        for path in &paths {
            let definition = self.read_cached(path, domain)?;
            if !seen_labels.insert(definition.label.clone()) {
                tracing::warn!(
                    label = %definition.label,
                    path = %path.display(),
                    "duplicate label in domain listing; ignoring file"
                );
                continue;
            }
            definitions.push(definition);
        }

        // Entries whose file disappeared must not linger in the cache.
        let listed: HashSet<&PathBuf> = paths.iter().collect();
        self.lock_cache()
            .retain(|path, _| !path.starts_with(dir) || listed.contains(path));

        Ok(definitions)
    }

    /// The definition for one key, if its file exists.
    pub fn find(&self, key: &JobKey) -> Result<Option<JobDefinition>, StoreError> {
        Ok(self
            .list(key.domain)?
            .into_iter()
            .find(|definition| definition.label == key.label))
    }

    fn read_cached(&self, path: &Path, domain: Domain) -> Result<JobDefinition, StoreError> {
        let metadata = std::fs::metadata(path).map_err(|e| io_err(path, e))?;
        let modified = metadata.modified().map_err(|e| io_err(path, e))?;

        let mut cache = self.lock_cache();
        if let Some(entry) = cache.get(path) {
            if entry.modified == modified {
                tracing::debug!(path = %path.display(), "definition cache hit");
                return Ok(entry.definition.clone());
            }
        }

        let definition = read_definition(path, domain, DateTime::<Utc>::from(modified));
        cache.insert(
            path.to_path_buf(),
            CacheEntry {
                modified,
                definition: definition.clone(),
            },
        );
        Ok(definition)
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn classify_read_dir_error(domain: Domain, dir: &Path, e: std::io::Error) -> StoreError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        StoreError::AccessDenied {
            domain,
            path: dir.to_path_buf(),
        }
    } else {
        io_err(dir, e)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
