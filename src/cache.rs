use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;

use crate::{
    error::{Error, Result},
    fingerprint::{Fingerprint, FINGERPRINT_FILE},
    index::{ContentIndex, Indexes, RouteIndex, TaxonomyIndex},
};

const CONTENT_FILE: &str = "content_index.bin";
const TAXONOMY_FILE: &str = "tax_index.bin";
const ROUTES_FILE: &str = "routes.bin";
const LOCK_FILE: &str = ".rebuild.lock";

/// On-disk index cache: three MessagePack files plus the fingerprint
/// manifest.
///
/// Writes are atomic per file (temp file then rename) and the manifest is
/// written last, so a crashed writer leaves either the previous complete
/// cache or a cache the fingerprint check will reject.
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open a cache directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            std::fs::create_dir_all(&dir)
                .map_err(|_| Error::CacheDir(dir.clone()))?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a full set of indexes and the fingerprint that validates
    /// them.
    pub fn save(
        &self,
        indexes: &Indexes,
        fingerprint: &Fingerprint,
    ) -> Result<()> {
        self.write_atomic(
            CONTENT_FILE,
            &rmp_serde::to_vec_named(&indexes.content)?,
        )?;
        self.write_atomic(
            TAXONOMY_FILE,
            &rmp_serde::to_vec_named(&indexes.taxonomy)?,
        )?;
        self.write_atomic(
            ROUTES_FILE,
            &rmp_serde::to_vec_named(&indexes.routes)?,
        )?;

        // The manifest commits the cache. Readers that load a manifest are
        // guaranteed the index files it fingerprints are complete.
        let manifest = serde_json::to_vec_pretty(fingerprint)?;
        self.write_atomic(FINGERPRINT_FILE, &manifest)?;

        tracing::debug!(dir = %self.dir.display(), "index cache written");
        Ok(())
    }

    /// Load the cached indexes.
    ///
    /// Missing or undecodable files yield `None` rather than an error; the
    /// caller falls back to a rebuild either way.
    pub fn load(&self) -> Option<Indexes> {
        let content: ContentIndex = self.read_file(CONTENT_FILE)?;
        let taxonomy: TaxonomyIndex = self.read_file(TAXONOMY_FILE)?;
        let routes: RouteIndex = self.read_file(ROUTES_FILE)?;
        Some(Indexes {
            content,
            taxonomy,
            routes,
        })
    }

    /// The stored fingerprint, if the cache has been committed.
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        Fingerprint::load(&self.dir)
    }

    fn read_file<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
    ) -> Option<T> {
        let bytes = std::fs::read(self.dir.join(name)).ok()?;
        match rmp_serde::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(file = name, error = %e, "corrupt cache file");
                None
            }
        }
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let final_path = self.dir.join(name);
        let tmp_path = self.dir.join(format!("{name}.tmp"));
        std::fs::write(&tmp_path, bytes)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}

/// Advisory lock serializing rebuilds within one cache directory.
///
/// Held for the duration of a rebuild; releasing is automatic on drop. A
/// process that cannot acquire it knows another rebuild is in flight and
/// should serve the existing cache instead.
pub struct RebuildLock {
    file: File,
}

impl RebuildLock {
    /// Try to take the rebuild lock. `None` means another process holds it.
    pub fn try_acquire(cache_dir: &Path) -> Result<Option<Self>> {
        let file = Self::lock_file(cache_dir)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file })),
            Err(_) => Ok(None),
        }
    }

    /// Take the rebuild lock, waiting for any current holder to finish.
    pub fn acquire(cache_dir: &Path) -> Result<Self> {
        let file = Self::lock_file(cache_dir)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    fn lock_file(cache_dir: &Path) -> Result<File> {
        Ok(OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(cache_dir.join(LOCK_FILE))?)
    }
}

impl Drop for RebuildLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
