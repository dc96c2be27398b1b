use std::path::PathBuf;

use crate::{
    backend::Backend,
    config::{SearchWeights, SiteConfig},
    error::Result,
    index::{Route, RouteIndex, TaxonomyIndex, Term},
    item::{Document, Item},
    parser,
    query::{Query, QueryResults},
};

/// What a request path resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteMatch {
    /// A content item or type archive.
    Content(Route),
    /// A taxonomy term listing, e.g. `/category/tutorials`.
    Term { taxonomy: String, term: String },
    /// A configured redirect.
    Redirect { to: String, status: u16 },
}

/// Read-side facade over a backend: lookups, queries, routing and body
/// hydration, with per-type search weights applied from the site config.
pub struct Repository {
    backend: Box<dyn Backend>,
    config: SiteConfig,
    site_root: PathBuf,
}

impl Repository {
    pub fn new(
        backend: Box<dyn Backend>,
        config: SiteConfig,
        site_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            config,
            site_root: site_root.into(),
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn get(&self, type_name: &str, slug: &str) -> Result<Option<Item>> {
        self.backend.item(type_name, slug)
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<Item>> {
        self.backend.item_by_id(id)
    }

    pub fn get_by_path(&self, relative_path: &str) -> Result<Option<Item>> {
        self.backend.item_by_path(relative_path)
    }

    /// An item with its markdown body read back from the source file.
    ///
    /// `None` when the item is unknown or its file has vanished since the
    /// last rebuild.
    pub fn document(
        &self,
        type_name: &str,
        slug: &str,
    ) -> Result<Option<Document>> {
        let item = match self.backend.item(type_name, slug)? {
            Some(item) => item,
            None => return Ok(None),
        };
        let path = self.site_root.join(&item.file_path);
        if !path.is_file() {
            tracing::warn!(
                path = %path.display(),
                "indexed file missing, cache is stale"
            );
            return Ok(None);
        }
        let taxonomies: Vec<String> = self
            .config
            .types
            .get(type_name)
            .map(|t| t.taxonomies.clone())
            .unwrap_or_default();
        let parsed = parser::parse_file(
            &path,
            &item.file_path,
            type_name,
            &taxonomies,
        )?;
        Ok(Some(Document {
            item,
            body: parsed.body,
        }))
    }

    pub fn query(&self, query: &Query) -> Result<QueryResults> {
        // Untyped queries score with the default weights; per-type search
        // config applies only when the query names a type.
        let mut weights = match query.type_name() {
            Some(type_name) => self.config.weights_for(type_name),
            None => SearchWeights::default(),
        };
        if query.is_search() {
            if let Some(type_name) = query.type_name() {
                // Respect the type's search config: a disabled type scores
                // nothing, and excluded fields contribute nothing.
                let search = self
                    .config
                    .types
                    .get(type_name)
                    .map(|t| t.search.clone())
                    .unwrap_or_default();
                let field_on = |name: &str| {
                    search.enabled
                        && search.fields.iter().any(|f| f == name)
                };
                if !field_on("title") {
                    weights.title_phrase = 0;
                    weights.title_all_tokens = 0;
                    weights.title_token = 0;
                }
                if !field_on("excerpt") {
                    weights.excerpt_phrase = 0;
                    weights.excerpt_token = 0;
                }
                if !search.enabled {
                    weights.featured = 0;
                }
            }
        }
        self.backend.query(query, &weights)
    }

    /// Every item of a type in slug order, drafts included.
    pub fn items_of(&self, type_name: &str) -> Result<Vec<Item>> {
        self.backend.items_of(type_name)
    }

    /// One page of the newest published items of a type, served from the
    /// backend's precomputed list.
    pub fn recent(
        &self,
        type_name: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<Item>> {
        let offset =
            page.max(1).saturating_sub(1).saturating_mul(per_page);
        self.backend.recent(type_name, offset, per_page)
    }

    pub fn count(
        &self,
        type_name: &str,
        status: Option<&str>,
    ) -> Result<usize> {
        self.backend.count(type_name, status)
    }

    pub fn exists(&self, type_name: &str, slug: &str) -> Result<bool> {
        Ok(self.backend.item(type_name, slug)?.is_some())
    }

    pub fn term(&self, taxonomy: &str, slug: &str) -> Result<Option<Term>> {
        self.backend.term(taxonomy, slug)
    }

    /// The members of a taxonomy term, resolved to items, in the term's
    /// id-sorted member order.
    pub fn items_with_term(
        &self,
        taxonomy: &str,
        term_slug: &str,
    ) -> Result<Vec<Item>> {
        let term = match self.backend.term(taxonomy, term_slug)? {
            Some(term) => term,
            None => return Ok(Vec::new()),
        };
        let mut items = Vec::with_capacity(term.items.len());
        for key in &term.items {
            if let Some((type_name, slug)) = key.split_once(':') {
                if let Some(item) = self.backend.item(type_name, slug)? {
                    items.push(item);
                }
            }
        }
        Ok(items)
    }

    /// Declared taxonomy names.
    pub fn taxonomies(&self) -> Result<Vec<String>> {
        Ok(self.backend.taxonomy_index()?.names())
    }

    pub fn taxonomy_index(&self) -> Result<TaxonomyIndex> {
        self.backend.taxonomy_index()
    }

    pub fn route_index(&self) -> Result<RouteIndex> {
        self.backend.route_index()
    }

    pub fn types(&self) -> Result<Vec<String>> {
        self.backend.types()
    }

    /// Resolve a request path: redirects, then exact routes, then taxonomy
    /// term prefixes.
    pub fn route_for(&self, path: &str) -> Result<Option<RouteMatch>> {
        let path = normalize_request_path(path);
        let routes = self.backend.route_index()?;

        if let Some(redirect) = routes.redirects.get(&path) {
            return Ok(Some(RouteMatch::Redirect {
                to: redirect.to.clone(),
                status: redirect.status,
            }));
        }
        if let Some(route) = routes.exact.get(&path) {
            return Ok(Some(RouteMatch::Content(route.clone())));
        }

        // "/category/tutorials" under base "/category": the remainder must
        // be a single segment naming an existing term.
        for (base, tax_route) in &routes.taxonomy {
            let Some(rest) = path.strip_prefix(base.as_str()) else {
                continue;
            };
            let Some(term_slug) = rest.strip_prefix('/') else {
                continue;
            };
            if term_slug.is_empty() || term_slug.contains('/') {
                continue;
            }
            if self
                .backend
                .term(&tax_route.taxonomy, term_slug)?
                .is_some()
            {
                return Ok(Some(RouteMatch::Term {
                    taxonomy: tax_route.taxonomy.clone(),
                    term: term_slug.to_string(),
                }));
            }
        }

        Ok(None)
    }
}

/// Trim a query string and trailing slash; guarantee a leading slash.
fn normalize_request_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
