//! Reference dataset loading.
//!
//! A reference directory holds one or more `.json` files, each a JSON
//! array of `WeaponFireEvent` records with camelCase field names.  Files
//! are read in file-name order and their records concatenated, so the
//! resulting order is stable across platforms.

use firecheck_protocol::WeaponFireEvent;
use log::{info, warn};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("failed to list reference directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read reference file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid reference file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("reference dataset is empty")]
    Empty,
}

/// Ordered, non-empty reference dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSet {
    events: Vec<WeaponFireEvent>,
}

impl ReferenceSet {
    pub fn new(events: Vec<WeaponFireEvent>) -> Result<Self, ReferenceError> {
        if events.is_empty() {
            return Err(ReferenceError::Empty);
        }
        let mut seen = BTreeSet::new();
        for event in &events {
            if !seen.insert(&event.identifier) {
                warn!("Reference dataset lists {} more than once", event.identifier);
            }
        }
        Ok(Self { events })
    }

    /// Load every `.json` file in `dir`.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ReferenceError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| ReferenceError::ListDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ReferenceError::ListDir {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();

        let mut events = Vec::new();
        for path in &files {
            let loaded = load_file(path)?;
            info!("Loaded {} reference events from {}", loaded.len(), path.display());
            events.extend(loaded);
        }
        Self::new(events)
    }

    pub fn events(&self) -> &[WeaponFireEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WeaponFireEvent> {
        self.events.iter()
    }
}

impl<'a> IntoIterator for &'a ReferenceSet {
    type Item = &'a WeaponFireEvent;
    type IntoIter = std::slice::Iter<'a, WeaponFireEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Read one reference file.
pub fn load_file(path: &Path) -> Result<Vec<WeaponFireEvent>, ReferenceError> {
    let json = fs::read_to_string(path).map_err(|source| ReferenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| ReferenceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
