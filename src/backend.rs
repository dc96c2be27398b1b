use std::collections::BTreeMap;

use crate::{
    config::SearchWeights,
    error::Result,
    index::{Indexes, RouteIndex, TaxonomyIndex, Term},
    item::Item,
    query::{Query, QueryResults},
};

/// Storage abstraction the repository talks to.
///
/// Query execution is a provided method funneling every implementation
/// through the same engine, so two backends built from the same indexes
/// answer every query identically.
pub trait Backend: Send + Sync {
    /// Short identifier for logs and `status` output.
    fn name(&self) -> &'static str;

    fn item(&self, type_name: &str, slug: &str) -> Result<Option<Item>>;

    fn item_by_id(&self, id: &str) -> Result<Option<Item>>;

    fn item_by_path(&self, relative_path: &str) -> Result<Option<Item>>;

    /// Every item of a type, drafts included, in slug order.
    fn items_of(&self, type_name: &str) -> Result<Vec<Item>>;

    /// A window into the newest published items of a type, date-descending:
    /// `offset` items skipped, at most `limit` returned. Backends keep the
    /// full list precomputed; it is the hot path for listings.
    fn recent(
        &self,
        type_name: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Item>>;

    fn term(&self, taxonomy: &str, slug: &str) -> Result<Option<Term>>;

    fn taxonomy_index(&self) -> Result<TaxonomyIndex>;

    fn route_index(&self) -> Result<RouteIndex>;

    /// Content types present in the index.
    fn types(&self) -> Result<Vec<String>>;

    /// Item count for a type, optionally narrowed to one exact status.
    fn count(&self, type_name: &str, status: Option<&str>) -> Result<usize> {
        Ok(self
            .items_of(type_name)?
            .iter()
            .filter(|item| status.is_none_or(|s| item.status == s))
            .count())
    }

    fn query(
        &self,
        query: &Query,
        weights: &SearchWeights,
    ) -> Result<QueryResults> {
        let items = match query.type_name() {
            Some(type_name) => self.items_of(type_name)?,
            // No type: candidates are the union of every type.
            None => {
                let mut all = Vec::new();
                for type_name in self.types()? {
                    all.extend(self.items_of(&type_name)?);
                }
                all
            }
        };
        Ok(query.execute(items, weights))
    }
}

/// Backend that serves straight from deserialized indexes.
pub struct MemoryBackend {
    indexes: Indexes,
    /// Per type: published items pre-sorted date-descending.
    recent: BTreeMap<String, Vec<Item>>,
}

impl MemoryBackend {
    pub fn new(indexes: Indexes) -> Self {
        let mut recent = BTreeMap::new();
        for type_name in indexes.content.types() {
            recent.insert(
                type_name.clone(),
                recent_list(&indexes, &type_name),
            );
        }
        Self { indexes, recent }
    }
}

/// Published items of one type, ordered the way the query engine orders a
/// default date-descending query.
pub(crate) fn recent_list(indexes: &Indexes, type_name: &str) -> Vec<Item> {
    let items = indexes
        .content
        .items_of(type_name)
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();
    let count = items.len().max(1);
    let mut out = Vec::new();
    // Page through the engine so ordering stays canonical even past the
    // per-page clamp.
    let mut page = 1;
    loop {
        let results = Query::new(type_name)
            .per_page(count)
            .page(page)
            .execute(items.iter().cloned(), &SearchWeights::default());
        let done = !results.has_more();
        out.extend(results.hits.into_iter().map(|hit| hit.item));
        if done {
            break;
        }
        page += 1;
    }
    out
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn item(&self, type_name: &str, slug: &str) -> Result<Option<Item>> {
        Ok(self.indexes.content.get(type_name, slug).cloned())
    }

    fn item_by_id(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.indexes.content.get_by_id(id).cloned())
    }

    fn item_by_path(&self, relative_path: &str) -> Result<Option<Item>> {
        Ok(self.indexes.content.get_by_path(relative_path).cloned())
    }

    fn items_of(&self, type_name: &str) -> Result<Vec<Item>> {
        Ok(self
            .indexes
            .content
            .items_of(type_name)
            .into_iter()
            .cloned()
            .collect())
    }

    fn recent(
        &self,
        type_name: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Item>> {
        Ok(self
            .recent
            .get(type_name)
            .map(|list| {
                list.iter().skip(offset).take(limit).cloned().collect()
            })
            .unwrap_or_default())
    }

    fn term(&self, taxonomy: &str, slug: &str) -> Result<Option<Term>> {
        Ok(self.indexes.taxonomy.term(taxonomy, slug).cloned())
    }

    fn taxonomy_index(&self) -> Result<TaxonomyIndex> {
        Ok(self.indexes.taxonomy.clone())
    }

    fn route_index(&self) -> Result<RouteIndex> {
        Ok(self.indexes.routes.clone())
    }

    fn types(&self) -> Result<Vec<String>> {
        Ok(self.indexes.content.types())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{test_item, STATUS_DRAFT};
    use chrono::NaiveDate;

    fn sample() -> Indexes {
        let mut indexes = Indexes::default();
        let mut old = test_item("post", "old", "Old");
        old.date = NaiveDate::from_ymd_opt(2023, 1, 1);
        let mut new = test_item("post", "new", "New");
        new.date = NaiveDate::from_ymd_opt(2024, 6, 1);
        let mut draft = test_item("post", "draft", "Draft");
        draft.status = STATUS_DRAFT.to_string();
        indexes.content.insert(old);
        indexes.content.insert(new);
        indexes.content.insert(draft);
        indexes.content.insert(test_item("page", "about", "About"));
        indexes
    }

    #[test]
    fn lookups() {
        let backend = MemoryBackend::new(sample());
        assert!(backend.item("post", "new").unwrap().is_some());
        assert!(backend.item("post", "missing").unwrap().is_none());
        assert_eq!(backend.items_of("post").unwrap().len(), 3);
        assert_eq!(
            backend.types().unwrap(),
            vec!["page".to_string(), "post".to_string()]
        );
    }

    #[test]
    fn recent_excludes_drafts_and_sorts_by_date() {
        let backend = MemoryBackend::new(sample());
        let recent = backend.recent("post", 0, 10).unwrap();
        let slugs: Vec<_> =
            recent.iter().map(|i| i.slug.as_str()).collect();
        assert_eq!(slugs, vec!["new", "old"]);

        let limited = backend.recent("post", 0, 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].slug, "new");
    }

    #[test]
    fn recent_window_serves_later_pages() {
        let backend = MemoryBackend::new(sample());
        let second = backend.recent("post", 1, 1).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].slug, "old");
        assert!(backend.recent("post", 2, 1).unwrap().is_empty());
    }

    #[test]
    fn recent_for_unknown_type_is_empty() {
        let backend = MemoryBackend::new(sample());
        assert!(backend.recent("event", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn counts_with_optional_status() {
        let backend = MemoryBackend::new(sample());
        assert_eq!(backend.count("post", None).unwrap(), 3);
        assert_eq!(backend.count("post", Some("published")).unwrap(), 2);
        assert_eq!(backend.count("post", Some("draft")).unwrap(), 1);
        assert_eq!(backend.count("event", None).unwrap(), 0);
    }

    #[test]
    fn fast_path_equals_general_query() {
        let backend = MemoryBackend::new(sample());
        let fast: Vec<String> = backend
            .recent("post", 0, 50)
            .unwrap()
            .into_iter()
            .map(|i| i.slug)
            .collect();
        let general: Vec<String> = backend
            .query(&Query::new("post").per_page(50), &SearchWeights::default())
            .unwrap()
            .hits
            .into_iter()
            .map(|hit| hit.item.slug)
            .collect();
        assert_eq!(fast, general);
    }

    #[test]
    fn default_query_path() {
        let backend = MemoryBackend::new(sample());
        let results = backend
            .query(&Query::new("post"), &SearchWeights::default())
            .unwrap();
        assert_eq!(results.total, 2);
        assert_eq!(results.hits[0].item.slug, "new");
    }

    #[test]
    fn untyped_query_spans_every_type() {
        let backend = MemoryBackend::new(sample());
        let results = backend
            .query(&Query::across_types(), &SearchWeights::default())
            .unwrap();
        // Two published posts plus the page; the draft stays out.
        assert_eq!(results.total, 3);
        assert!(results.items().any(|i| i.type_name == "page"));
    }
}
