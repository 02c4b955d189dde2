//! Snapshot cache - reuse expanded tables across views
//!
//! Normalizing and expanding a large export is the expensive step; every
//! view after that is a cheap aggregation. Snapshots are keyed by the
//! identity of their source (file path, size and modification time, or a
//! content hash for uploaded bytes) and by the configuration they were built
//! with, and are shared as `Arc<Snapshot>`.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::api::logs::log_info;
use crate::config::DepartmentConfig;
use crate::error::PipelineResult;
use crate::transform::pipeline::{load_bytes, load_csv, Snapshot};

/// Snapshots kept before the oldest is evicted.
pub const DEFAULT_CAPACITY: usize = 8;

/// Where a snapshot's rows came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    File {
        path: PathBuf,
        size: u64,
        modified: Option<SystemTime>,
    },
    Bytes {
        hash: u64,
        len: usize,
    },
}

/// Cache key: source identity plus a configuration fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub source: SourceId,
    pub config: u64,
}

impl SourceKey {
    /// Key a file by path, size and modification time.
    pub fn for_path(path: &Path, config: &DepartmentConfig) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Ok(Self {
            source: SourceId::File {
                path,
                size: metadata.len(),
                modified: metadata.modified().ok(),
            },
            config: config_fingerprint(config),
        })
    }

    /// Key uploaded content by its hash.
    pub fn for_bytes(bytes: &[u8], config: &DepartmentConfig) -> Self {
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        Self {
            source: SourceId::Bytes {
                hash: hasher.finish(),
                len: bytes.len(),
            },
            config: config_fingerprint(config),
        }
    }
}

/// Hash of every field of a configuration.
pub fn config_fingerprint(config: &DepartmentConfig) -> u64 {
    let mut hasher = DefaultHasher::new();
    config.hash(&mut hasher);
    hasher.finish()
}

/// Bounded map of snapshots, evicting the oldest insertion first.
pub struct SnapshotCache {
    capacity: usize,
    entries: HashMap<SourceKey, Arc<Snapshot>>,
    order: VecDeque<SourceKey>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a cache holding at most `capacity` snapshots (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &SourceKey) -> Option<Arc<Snapshot>> {
        self.entries.get(key).cloned()
    }

    /// Store a snapshot, evicting the oldest entry when full.
    pub fn insert(&mut self, key: SourceKey, snapshot: Arc<Snapshot>) -> Arc<Snapshot> {
        if self.entries.insert(key.clone(), snapshot.clone()).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        snapshot
    }

    /// Cached snapshot for `key`, or build, store and return a new one.
    ///
    /// A failing `build` leaves the cache untouched.
    pub fn get_or_try_insert_with<F>(&mut self, key: SourceKey, build: F) -> PipelineResult<Arc<Snapshot>>
    where
        F: FnOnce() -> PipelineResult<Snapshot>,
    {
        if let Some(snapshot) = self.get(&key) {
            log_info(format!("Reusing cached snapshot {}", snapshot.run_id));
            return Ok(snapshot);
        }
        let snapshot = Arc::new(build()?);
        Ok(self.insert(key, snapshot))
    }

    /// Load a CSV file through the cache.
    pub fn load_csv(&mut self, path: &Path, config: Arc<DepartmentConfig>) -> PipelineResult<Arc<Snapshot>> {
        let key = SourceKey::for_path(path, &config)?;
        self.get_or_try_insert_with(key, || load_csv(path, config))
    }

    /// Load uploaded bytes through the cache.
    pub fn load_bytes(&mut self, bytes: &[u8], config: Arc<DepartmentConfig>) -> PipelineResult<Arc<Snapshot>> {
        let key = SourceKey::for_bytes(bytes, &config);
        self.get_or_try_insert_with(key, || load_bytes(bytes, config))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
