use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::{
    backend::{Backend, MemoryBackend},
    builder::{self, BuildReport},
    cache::{CacheStore, RebuildLock},
    config::{BackendKind, SiteConfig},
    error::Result,
    fingerprint::{Fingerprint, InvalidationMode},
    index::Indexes,
    redb_backend::RedbBackend,
    repository::Repository,
};

const CACHE_DIR: &str = ".loam/cache";
const REDB_FILE: &str = "index.redb";

/// A content site rooted at a directory: configuration, cache policy and the
/// entry point for opening a [`Repository`].
pub struct Site {
    root: PathBuf,
    config: SiteConfig,
}

/// Snapshot of cache health for the `status` command.
#[derive(Debug, Clone)]
pub struct SiteStatus {
    /// A committed cache exists on disk.
    pub cached: bool,
    /// The cache matches the current content tree.
    pub fresh: bool,
    pub built_at: Option<DateTime<Utc>>,
    /// Signature of the tree as it is right now.
    pub signature: String,
    pub items: usize,
    pub types: Vec<String>,
}

impl Site {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = SiteConfig::load(&root)?;
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    /// Open the repository, rebuilding the cache first when the
    /// invalidation policy demands it.
    pub fn repository(&self) -> Result<Repository> {
        let store = CacheStore::open(self.cache_dir())?;
        let indexes = self.fresh_indexes(&store)?;

        let backend: Box<dyn Backend> = match self.config.cache.backend {
            BackendKind::Memory => Box::new(MemoryBackend::new(indexes)),
            BackendKind::Redb => {
                let path = store.dir().join(REDB_FILE);
                if path.is_file() {
                    Box::new(RedbBackend::open(&path)?)
                } else {
                    Box::new(RedbBackend::materialize(&path, &indexes)?)
                }
            }
        };

        Ok(Repository::new(backend, self.config.clone(), &self.root))
    }

    /// Unconditional full rebuild, waiting for any concurrent rebuild to
    /// finish first.
    pub fn rebuild(&self) -> Result<BuildReport> {
        let store = CacheStore::open(self.cache_dir())?;
        let _lock = RebuildLock::acquire(store.dir())?;
        self.rebuild_locked(&store)
    }

    /// Build the indexes without touching the cache; used by `lint`.
    pub fn check(&self) -> Result<BuildReport> {
        builder::build(&self.config, &self.root)
    }

    /// Delete the cache directory. The next access rebuilds from scratch.
    pub fn clear_cache(&self) -> Result<()> {
        let dir = self.cache_dir();
        if dir.is_dir() {
            std::fs::remove_dir_all(&dir)?;
            tracing::info!(dir = %dir.display(), "cache cleared");
        }
        Ok(())
    }

    pub fn status(&self) -> Result<SiteStatus> {
        let store = CacheStore::open(self.cache_dir())?;
        let current = Fingerprint::compute(&self.config, &self.root)?;
        let cached = store.fingerprint();
        let indexes = store.load();

        Ok(SiteStatus {
            cached: cached.is_some(),
            fresh: cached
                .as_ref()
                .is_some_and(|c| current.matches(c)),
            built_at: cached.map(|c| c.built_at),
            signature: current.signature,
            items: indexes
                .as_ref()
                .map(|i| i.content.len())
                .unwrap_or(0),
            types: indexes
                .map(|i| i.content.types())
                .unwrap_or_default(),
        })
    }

    /// Indexes that honor the configured invalidation mode.
    fn fresh_indexes(&self, store: &CacheStore) -> Result<Indexes> {
        match self.config.cache.mode {
            InvalidationMode::Never => match store.load() {
                Some(indexes) => Ok(indexes),
                None => self.rebuild_shared(store),
            },
            InvalidationMode::Always => self.rebuild_shared(store),
            InvalidationMode::Auto => {
                let current =
                    Fingerprint::compute(&self.config, &self.root)?;
                if current.is_fresh(store.dir()) {
                    if let Some(indexes) = store.load() {
                        return Ok(indexes);
                    }
                }
                self.rebuild_shared(store)
            }
        }
    }

    /// Rebuild if this process wins the lock; otherwise serve whatever
    /// committed cache exists, falling back to an unsaved in-memory build.
    fn rebuild_shared(&self, store: &CacheStore) -> Result<Indexes> {
        match RebuildLock::try_acquire(store.dir())? {
            Some(_lock) => {
                Ok(self.rebuild_locked(store)?.indexes)
            }
            None => {
                tracing::info!(
                    "rebuild in progress elsewhere, serving current cache"
                );
                match store.load() {
                    Some(indexes) => Ok(indexes),
                    None => {
                        Ok(builder::build(&self.config, &self.root)?.indexes)
                    }
                }
            }
        }
    }

    fn rebuild_locked(&self, store: &CacheStore) -> Result<BuildReport> {
        // Fingerprint first: a file changing between here and the scan ends
        // up stale and triggers the next rebuild rather than going unseen.
        let fingerprint = Fingerprint::compute(&self.config, &self.root)?;
        let report = builder::build(&self.config, &self.root)?;

        // The fingerprint (written last, inside save) commits the cache, so
        // every projection must land before it.
        if self.config.cache.backend == BackendKind::Redb {
            RedbBackend::materialize(
                &store.dir().join(REDB_FILE),
                &report.indexes,
            )?;
        }
        store.save(&report.indexes, &fingerprint)?;
        Ok(report)
    }
}
