use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::{Redirect, TaxonomyConfig},
    item::Item,
};

/// The `(type, slug)` coordinate of an item; the secondary lookup maps point
/// here rather than duplicating items.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ItemKey {
    pub type_name: String,
    pub slug: String,
}

impl ItemKey {
    pub fn new(type_name: &str, slug: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            slug: slug.to_string(),
        }
    }
}

/// Content metadata index: three O(1) lookup paths over the same items.
///
/// Invariants (maintained by the builder): every item occupies exactly one
/// slot per map, `(type, slug)` pairs are unique, ids are unique globally.
/// All maps are `BTreeMap` so serialization is byte-deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentIndex {
    pub by_type: BTreeMap<String, BTreeMap<String, Item>>,
    pub by_id: BTreeMap<String, ItemKey>,
    pub by_path: BTreeMap<String, ItemKey>,
}

impl ContentIndex {
    /// Insert an item into all three maps. The caller has already resolved
    /// slug and id collisions.
    pub fn insert(&mut self, item: Item) {
        let key = ItemKey::new(&item.type_name, &item.slug);
        self.by_id.insert(item.id.clone(), key.clone());
        self.by_path.insert(item.file_path.clone(), key);
        self.by_type
            .entry(item.type_name.clone())
            .or_default()
            .insert(item.slug.clone(), item);
    }

    pub fn get(&self, type_name: &str, slug: &str) -> Option<&Item> {
        self.by_type.get(type_name)?.get(slug)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Item> {
        let key = self.by_id.get(id)?;
        self.get(&key.type_name, &key.slug)
    }

    pub fn get_by_path(&self, relative_path: &str) -> Option<&Item> {
        let key = self.by_path.get(relative_path)?;
        self.get(&key.type_name, &key.slug)
    }

    pub fn contains(&self, type_name: &str, slug: &str) -> bool {
        self.get(type_name, slug).is_some()
    }

    /// Content types that have at least one item.
    pub fn types(&self) -> Vec<String> {
        self.by_type.keys().cloned().collect()
    }

    pub fn items_of(&self, type_name: &str) -> Vec<&Item> {
        self.by_type
            .get(type_name)
            .map(|items| items.values().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.values().all(BTreeMap::is_empty)
    }
}

/// A named value within a taxonomy that items can belong to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Member `type:slug` keys, sorted by item id for stable builds.
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub config: TaxonomyConfig,
    pub terms: BTreeMap<String, Term>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyIndex {
    pub taxonomies: BTreeMap<String, TaxonomyEntry>,
}

impl TaxonomyIndex {
    pub fn terms(&self, taxonomy: &str) -> Option<&BTreeMap<String, Term>> {
        self.taxonomies.get(taxonomy).map(|entry| &entry.terms)
    }

    pub fn term(&self, taxonomy: &str, slug: &str) -> Option<&Term> {
        self.terms(taxonomy)?.get(slug)
    }

    pub fn names(&self) -> Vec<String> {
        self.taxonomies.keys().cloned().collect()
    }
}

/// What an exact route resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Route {
    /// A single content item.
    Item {
        type_name: String,
        slug: String,
        #[serde(default)]
        template: Option<String>,
    },
    /// The listing page of a dated content type.
    Archive {
        type_name: String,
        #[serde(default)]
        template: Option<String>,
    },
}

/// A taxonomy's URL prefix, keyed by base path in the route table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyRoute {
    pub taxonomy: String,
    pub base: String,
}

/// The route table: exact paths, taxonomy prefixes, and redirects.
///
/// Invariant: no path appears in both `exact` and `redirects`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteIndex {
    pub exact: BTreeMap<String, Route>,
    pub taxonomy: BTreeMap<String, TaxonomyRoute>,
    pub redirects: BTreeMap<String, Redirect>,
}

/// The three logical indexes a rebuild produces and the cache persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Indexes {
    pub content: ContentIndex,
    pub taxonomy: TaxonomyIndex,
    pub routes: RouteIndex,
}
