use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    fingerprint::InvalidationMode,
};

/// Site configuration file name, looked up in the site root.
pub const CONFIG_FILE: &str = "loam.toml";

/// Full site configuration, read once at startup.
///
/// Every section is optional; a site with no `loam.toml` gets the default
/// `page` + `post` types and `category` + `tag` taxonomies.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site: SiteInfo,
    pub cache: CacheConfig,
    pub types: BTreeMap<String, TypeConfig>,
    pub taxonomies: BTreeMap<String, TaxonomyConfig>,
    pub redirects: BTreeMap<String, Redirect>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteInfo {
    pub name: String,
    pub base_url: String,
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            name: "Loam Site".to_string(),
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When to rebuild the index caches.
    pub mode: InvalidationMode,
    /// Which backend serves queries.
    pub backend: BackendKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Redb,
}

/// One content type: where its files live and how they are routed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TypeConfig {
    pub label: Option<String>,
    /// Directory under `content/`; defaults to the type name.
    pub dir: Option<String>,
    pub sorting: Sorting,
    pub url: UrlConfig,
    pub template: Option<String>,
    pub taxonomies: Vec<String>,
    pub search: SearchConfig,
}

impl Default for TypeConfig {
    fn default() -> Self {
        Self {
            label: None,
            dir: None,
            sorting: Sorting::Manual,
            url: UrlConfig::default(),
            template: None,
            taxonomies: Vec::new(),
            search: SearchConfig::default(),
        }
    }
}

impl TypeConfig {
    /// The content directory for a type named `name`.
    pub fn dir_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.dir.as_deref().unwrap_or(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sorting {
    #[default]
    Manual,
    DateDesc,
}

/// URL strategy for a content type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UrlConfig {
    /// URLs mirror the folder structure under `base` (`about.md` → `/about`).
    Hierarchical {
        #[serde(default = "default_base")]
        base: String,
    },
    /// URLs substitute `{slug}` into `pattern`; `archive` is the listing page.
    Pattern {
        pattern: String,
        #[serde(default)]
        archive: Option<String>,
    },
}

fn default_base() -> String {
    "/".to_string()
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self::Hierarchical {
            base: default_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enabled: bool,
    pub fields: Vec<String>,
    /// Full override of the default scoring weights when present.
    pub weights: Option<SearchWeights>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fields: vec!["title".to_string(), "excerpt".to_string()],
            weights: None,
        }
    }
}

/// Relevance scoring weights. Keys omitted from a per-type override keep
/// their standard values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchWeights {
    pub title_phrase: i64,
    pub title_all_tokens: i64,
    pub title_token: i64,
    pub title_token_cap: i64,
    pub excerpt_phrase: i64,
    pub excerpt_token: i64,
    pub excerpt_token_cap: i64,
    pub featured: i64,
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self {
            title_phrase: 80,
            title_all_tokens: 40,
            title_token: 10,
            title_token_cap: 30,
            excerpt_phrase: 30,
            excerpt_token: 3,
            excerpt_token_cap: 15,
            featured: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    pub label: Option<String>,
    /// Whether the taxonomy gets a route prefix on the frontend.
    pub public: bool,
    /// URL prefix; defaults to `/{taxonomy}`.
    pub base: Option<String>,
    /// Auto-create terms referenced by content but not declared.
    pub allow_unknown_terms: bool,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            label: None,
            public: true,
            base: None,
            allow_unknown_terms: true,
        }
    }
}

impl TaxonomyConfig {
    pub fn base_for(&self, name: &str) -> String {
        match &self.base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("/{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Redirect {
    pub to: String,
    #[serde(default = "default_redirect_status")]
    pub status: u16,
}

fn default_redirect_status() -> u16 {
    301
}

impl Default for SiteConfig {
    fn default() -> Self {
        let mut types = BTreeMap::new();
        types.insert(
            "page".to_string(),
            TypeConfig {
                label: Some("Pages".to_string()),
                dir: Some("pages".to_string()),
                ..TypeConfig::default()
            },
        );
        types.insert(
            "post".to_string(),
            TypeConfig {
                label: Some("Posts".to_string()),
                dir: Some("posts".to_string()),
                sorting: Sorting::DateDesc,
                url: UrlConfig::Pattern {
                    pattern: "/blog/{slug}".to_string(),
                    archive: Some("/blog".to_string()),
                },
                taxonomies: vec!["category".to_string(), "tag".to_string()],
                search: SearchConfig::default(),
                ..TypeConfig::default()
            },
        );

        let mut taxonomies = BTreeMap::new();
        taxonomies.insert("category".to_string(), TaxonomyConfig::default());
        taxonomies.insert("tag".to_string(), TaxonomyConfig::default());

        Self {
            site: SiteInfo::default(),
            cache: CacheConfig::default(),
            types,
            taxonomies,
            redirects: BTreeMap::new(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from `<site_root>/loam.toml`, falling back to the
    /// defaults when the file does not exist.
    pub fn load(site_root: &Path) -> Result<Self> {
        let path = site_root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Scoring weights for a type: its override, or the defaults.
    pub fn weights_for(&self, type_name: &str) -> SearchWeights {
        self.types
            .get(type_name)
            .and_then(|t| t.search.weights.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_config_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let config = SiteConfig::load(tmp.path()).unwrap();

        assert!(config.types.contains_key("page"));
        assert!(config.types.contains_key("post"));
        assert_eq!(config.types["post"].sorting, Sorting::DateDesc);
        assert_eq!(config.types["post"].dir_for("post"), "posts");
        assert!(config.taxonomies.contains_key("category"));
    }

    #[test]
    fn parses_toml_config() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[site]
name = "My Site"

[cache]
mode = "never"
backend = "redb"

[types.doc]
dir = "docs"
sorting = "date_desc"
url = { kind = "pattern", pattern = "/docs/{slug}", archive = "/docs" }
taxonomies = ["topic"]

[taxonomies.topic]
public = false
allow_unknown_terms = false

[redirects."/old"]
to = "/new"
status = 302
"#,
        )
        .unwrap();

        let config = SiteConfig::load(tmp.path()).unwrap();
        assert_eq!(config.site.name, "My Site");
        assert_eq!(config.cache.mode, InvalidationMode::Never);
        assert_eq!(config.cache.backend, BackendKind::Redb);
        assert_eq!(config.types["doc"].taxonomies, vec!["topic"]);
        assert!(!config.taxonomies["topic"].public);
        assert_eq!(config.redirects["/old"].to, "/new");
        assert_eq!(config.redirects["/old"].status, 302);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "not [valid").unwrap();
        assert!(matches!(
            SiteConfig::load(tmp.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn weight_override_replaces_defaults() {
        let mut config = SiteConfig::default();
        let mut weights = SearchWeights::default();
        weights.title_phrase = 200;
        config.types.get_mut("post").unwrap().search.weights =
            Some(weights.clone());

        assert_eq!(config.weights_for("post"), weights);
        assert_eq!(config.weights_for("page"), SearchWeights::default());
    }

    #[test]
    fn config_sections_compare_by_value() {
        assert_eq!(CacheConfig::default(), CacheConfig::default());
        let tax = TaxonomyConfig::default();
        assert_eq!(tax, tax.clone());
        let redirect = Redirect {
            to: "/new".to_string(),
            status: 302,
        };
        assert_eq!(redirect, redirect.clone());
    }

    #[test]
    fn taxonomy_base_defaults_to_name() {
        let tax = TaxonomyConfig::default();
        assert_eq!(tax.base_for("category"), "/category");

        let custom = TaxonomyConfig {
            base: Some("/topics/".to_string()),
            ..TaxonomyConfig::default()
        };
        assert_eq!(custom.base_for("topic"), "/topics");
    }
}
