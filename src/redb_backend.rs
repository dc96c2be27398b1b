use std::path::Path;

use redb::{Database, ReadableDatabase, TableDefinition};
use serde::de::DeserializeOwned;

use crate::{
    backend::{recent_list, Backend},
    error::Result,
    index::{Indexes, RouteIndex, TaxonomyIndex, Term},
    item::Item,
};

// Items keyed by "type\0slug"; the NUL keeps per-type ranges contiguous.
const ITEMS: TableDefinition<&str, &[u8]> = TableDefinition::new("items");
const ITEMS_BY_ID: TableDefinition<&str, &str> =
    TableDefinition::new("items_by_id");
const ITEMS_BY_PATH: TableDefinition<&str, &str> =
    TableDefinition::new("items_by_path");
// Whole-index blobs: taxonomy, routes, type list, per-type recent lists.
const BLOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("blobs");

const BLOB_TAXONOMY: &str = "taxonomy";
const BLOB_ROUTES: &str = "routes";
const BLOB_TYPES: &str = "types";

/// Backend that serves from a redb database materialized at rebuild time.
///
/// The database is a pure projection of the in-memory indexes; it is thrown
/// away and rewritten on every rebuild rather than updated in place.
pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    /// Open an existing database for serving.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(ITEMS)?;
        txn.open_table(ITEMS_BY_ID)?;
        txn.open_table(ITEMS_BY_PATH)?;
        txn.open_table(BLOBS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Write a fresh database from a full set of indexes, replacing any
    /// previous file.
    pub fn materialize(path: &Path, indexes: &Indexes) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        {
            let mut items = txn.open_table(ITEMS)?;
            let mut by_id = txn.open_table(ITEMS_BY_ID)?;
            let mut by_path = txn.open_table(ITEMS_BY_PATH)?;
            for type_items in indexes.content.by_type.values() {
                for item in type_items.values() {
                    let key = item_key(&item.type_name, &item.slug);
                    items.insert(
                        key.as_str(),
                        rmp_serde::to_vec_named(item)?.as_slice(),
                    )?;
                    by_id.insert(item.id.as_str(), key.as_str())?;
                    by_path.insert(item.file_path.as_str(), key.as_str())?;
                }
            }

            let mut blobs = txn.open_table(BLOBS)?;
            blobs.insert(
                BLOB_TAXONOMY,
                rmp_serde::to_vec_named(&indexes.taxonomy)?.as_slice(),
            )?;
            blobs.insert(
                BLOB_ROUTES,
                rmp_serde::to_vec_named(&indexes.routes)?.as_slice(),
            )?;
            let types = indexes.content.types();
            blobs.insert(
                BLOB_TYPES,
                rmp_serde::to_vec_named(&types)?.as_slice(),
            )?;

            for type_name in &types {
                let slugs: Vec<String> = recent_list(indexes, type_name)
                    .into_iter()
                    .map(|item| item.slug)
                    .collect();
                blobs.insert(
                    recent_key(type_name).as_str(),
                    rmp_serde::to_vec_named(&slugs)?.as_slice(),
                )?;
            }
        }
        txn.commit()?;

        tracing::debug!(path = %path.display(), "redb index materialized");
        Ok(Self { db })
    }

    fn item_at_key(&self, key: &str) -> Result<Option<Item>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ITEMS)?;
        match table.get(key)? {
            Some(guard) => Ok(Some(rmp_serde::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn blob<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(BLOBS)?;
        match table.get(key)? {
            Some(guard) => Ok(Some(rmp_serde::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }
}

fn item_key(type_name: &str, slug: &str) -> String {
    format!("{type_name}\0{slug}")
}

fn recent_key(type_name: &str) -> String {
    format!("recent\0{type_name}")
}

impl Backend for RedbBackend {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn item(&self, type_name: &str, slug: &str) -> Result<Option<Item>> {
        self.item_at_key(&item_key(type_name, slug))
    }

    fn item_by_id(&self, id: &str) -> Result<Option<Item>> {
        let key = {
            let txn = self.db.begin_read()?;
            let table = txn.open_table(ITEMS_BY_ID)?;
            table.get(id)?.map(|guard| guard.value().to_string())
        };
        match key {
            Some(key) => self.item_at_key(&key),
            None => Ok(None),
        }
    }

    fn item_by_path(&self, relative_path: &str) -> Result<Option<Item>> {
        let key = {
            let txn = self.db.begin_read()?;
            let table = txn.open_table(ITEMS_BY_PATH)?;
            table
                .get(relative_path)?
                .map(|guard| guard.value().to_string())
        };
        match key {
            Some(key) => self.item_at_key(&key),
            None => Ok(None),
        }
    }

    fn items_of(&self, type_name: &str) -> Result<Vec<Item>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ITEMS)?;
        let start = format!("{type_name}\0");
        let end = format!("{type_name}\x01");
        let mut items = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (_, value) = entry?;
            items.push(rmp_serde::from_slice(value.value())?);
        }
        Ok(items)
    }

    fn recent(
        &self,
        type_name: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Item>> {
        let slugs: Vec<String> =
            self.blob(&recent_key(type_name))?.unwrap_or_default();
        let mut items = Vec::with_capacity(limit.min(slugs.len()));
        for slug in slugs.iter().skip(offset).take(limit) {
            if let Some(item) = self.item(type_name, slug)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn term(&self, taxonomy: &str, slug: &str) -> Result<Option<Term>> {
        Ok(self
            .taxonomy_index()?
            .term(taxonomy, slug)
            .cloned())
    }

    fn taxonomy_index(&self) -> Result<TaxonomyIndex> {
        Ok(self.blob(BLOB_TAXONOMY)?.unwrap_or_default())
    }

    fn route_index(&self) -> Result<RouteIndex> {
        Ok(self.blob(BLOB_ROUTES)?.unwrap_or_default())
    }

    fn types(&self) -> Result<Vec<String>> {
        Ok(self.blob(BLOB_TYPES)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::MemoryBackend,
        config::SearchWeights,
        item::{test_item, STATUS_DRAFT},
        query::Query,
    };
    use chrono::NaiveDate;

    fn sample() -> Indexes {
        let mut indexes = Indexes::default();
        let mut old = test_item("post", "old", "Old Post");
        old.date = NaiveDate::from_ymd_opt(2023, 1, 1);
        let mut new = test_item("post", "new", "New Post");
        new.date = NaiveDate::from_ymd_opt(2024, 6, 1);
        let mut draft = test_item("post", "draft", "Hidden");
        draft.status = STATUS_DRAFT.to_string();
        indexes.content.insert(old);
        indexes.content.insert(new);
        indexes.content.insert(draft);
        indexes.content.insert(test_item("page", "about", "About"));
        indexes
    }

    #[test]
    fn materialize_then_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.redb");
        let indexes = sample();

        {
            let backend =
                RedbBackend::materialize(&path, &indexes).unwrap();
            assert!(backend.item("post", "new").unwrap().is_some());
        }

        let reopened = RedbBackend::open(&path).unwrap();
        let item = reopened.item("post", "new").unwrap().unwrap();
        assert_eq!(item.title, "New Post");
        assert!(reopened.item("post", "missing").unwrap().is_none());
    }

    #[test]
    fn secondary_lookups() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.redb");
        let indexes = sample();
        let id = indexes.content.get("page", "about").unwrap().id.clone();
        let backend = RedbBackend::materialize(&path, &indexes).unwrap();

        assert_eq!(
            backend.item_by_id(&id).unwrap().unwrap().slug,
            "about"
        );
        assert_eq!(
            backend
                .item_by_path("content/pages/about.md")
                .unwrap()
                .unwrap()
                .slug,
            "about"
        );
        assert!(backend.item_by_id("nope").unwrap().is_none());
    }

    #[test]
    fn per_type_range_does_not_leak() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.redb");
        let backend =
            RedbBackend::materialize(&path, &sample()).unwrap();

        let posts = backend.items_of("post").unwrap();
        assert_eq!(posts.len(), 3);
        assert!(posts.iter().all(|i| i.type_name == "post"));
        assert!(backend.items_of("pos").unwrap().is_empty());
    }

    #[test]
    fn recent_list_matches_memory_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.redb");
        let indexes = sample();
        let redb = RedbBackend::materialize(&path, &indexes).unwrap();
        let memory = MemoryBackend::new(indexes);

        let a: Vec<String> = redb
            .recent("post", 0, 10)
            .unwrap()
            .into_iter()
            .map(|i| i.slug)
            .collect();
        let b: Vec<String> = memory
            .recent("post", 0, 10)
            .unwrap()
            .into_iter()
            .map(|i| i.slug)
            .collect();
        assert_eq!(a, b);
        assert_eq!(a, vec!["new", "old"]);

        let offset: Vec<String> = redb
            .recent("post", 1, 10)
            .unwrap()
            .into_iter()
            .map(|i| i.slug)
            .collect();
        assert_eq!(offset, vec!["old"]);
    }

    #[test]
    fn query_parity_with_memory_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.redb");
        let indexes = sample();
        let redb = RedbBackend::materialize(&path, &indexes).unwrap();
        let memory = MemoryBackend::new(indexes);
        let weights = SearchWeights::default();

        for query in [
            Query::new("post"),
            Query::new("post").any_status(),
            Query::new("post").search("post"),
            Query::new("page"),
            Query::across_types(),
            Query::across_types().search("post"),
        ] {
            let a = redb.query(&query, &weights).unwrap();
            let b = memory.query(&query, &weights).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn rematerialize_replaces_old_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.redb");
        RedbBackend::materialize(&path, &sample()).unwrap();

        let mut smaller = Indexes::default();
        smaller.content.insert(test_item("post", "only", "Only"));
        let backend =
            RedbBackend::materialize(&path, &smaller).unwrap();

        assert!(backend.item("post", "new").unwrap().is_none());
        assert_eq!(backend.items_of("post").unwrap().len(), 1);
        assert_eq!(backend.types().unwrap(), vec!["post"]);
    }
}
