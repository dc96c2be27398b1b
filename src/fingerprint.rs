use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    path::Path,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{config::SiteConfig, error::Result, walker};

/// File name of the fingerprint manifest, written beside the index caches.
pub const FINGERPRINT_FILE: &str = "fingerprint.json";

/// When to check the content tree against the cached fingerprint.
///
/// This is configuration, not separate code paths: all modes flow through
/// the same freshness check in `Site`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationMode {
    /// Compare the fingerprint on every access, rebuild when stale.
    #[default]
    Auto,
    /// Rebuild on every access. Diagnostic only.
    Always,
    /// Trust the cache unconditionally; rebuild only on explicit command.
    Never,
}

/// A cheap signature over the content tree's structure (paths, mtimes and
/// sizes, not file contents), used to detect staleness.
///
/// Created only by successful full rebuilds; readers compare, never mutate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub signature: String,
    pub built_at: DateTime<Utc>,
}

impl Fingerprint {
    /// Scan the content tree for every configured type (plus the taxonomy
    /// declaration files) and derive the current signature.
    ///
    /// A tree with zero content files still produces a valid, comparable
    /// fingerprint.
    pub fn compute(config: &SiteConfig, site_root: &Path) -> Result<Self> {
        let mut hasher = DefaultHasher::new();
        let content_root = site_root.join("content");

        // Types, taxonomies and redirects shape the cached indexes as much
        // as the files do; an edited loam.toml must read as stale.
        serde_json::to_vec(&(
            &config.types,
            &config.taxonomies,
            &config.redirects,
        ))?
        .hash(&mut hasher);

        for (type_name, type_config) in &config.types {
            type_name.hash(&mut hasher);
            let dir = content_root.join(type_config.dir_for(type_name));
            for file in walker::discover(&dir)? {
                file.relative_path.hash(&mut hasher);
                file.mtime.hash(&mut hasher);
                file.size.hash(&mut hasher);
            }
        }

        // Taxonomy declarations also invalidate the cache.
        let tax_dir = content_root.join("_taxonomies");
        for taxonomy in config.taxonomies.keys() {
            let path = tax_dir.join(format!("{taxonomy}.yml"));
            if let Ok(meta) = std::fs::metadata(&path) {
                taxonomy.hash(&mut hasher);
                meta.len().hash(&mut hasher);
                if let Ok(mtime) = meta.modified() {
                    if let Ok(d) =
                        mtime.duration_since(std::time::UNIX_EPOCH)
                    {
                        d.as_secs().hash(&mut hasher);
                    }
                }
            }
        }

        Ok(Self {
            signature: format!("{:016x}", hasher.finish()),
            built_at: Utc::now(),
        })
    }

    /// Whether a cached fingerprint still matches this (current) one.
    pub fn matches(&self, cached: &Fingerprint) -> bool {
        self.signature == cached.signature
    }

    /// Load the stored fingerprint from a cache directory.
    ///
    /// Fails closed: a missing or unreadable manifest is `None`, which
    /// callers must treat as "stale, rebuild needed".
    pub fn load(cache_dir: &Path) -> Option<Self> {
        let raw =
            std::fs::read_to_string(cache_dir.join(FINGERPRINT_FILE)).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Check a cache directory's stored fingerprint against this one.
    pub fn is_fresh(&self, cache_dir: &Path) -> bool {
        Self::load(cache_dir).is_some_and(|cached| self.matches(&cached))
    }
}
