use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::Path,
};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::{SiteConfig, TypeConfig, UrlConfig},
    error::{Error, Result},
    index::{
        ContentIndex, Indexes, Route, RouteIndex, TaxonomyEntry,
        TaxonomyIndex, TaxonomyRoute, Term,
    },
    item::Item,
    parser::{self, ParsedFile},
    ulid, walker,
};

/// How serious a lint finding is. `Error` findings mean content was excluded
/// from the index; `Warning` findings were repaired in place.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One finding from a rebuild: what happened, where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintIssue {
    pub severity: Severity,
    pub path: String,
    pub message: String,
}

impl LintIssue {
    fn warning(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.to_string(),
            message: message.into(),
        }
    }

    fn error(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// The output of a full rebuild: the three indexes plus everything the lint
/// pass found along the way.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub indexes: Indexes,
    pub issues: Vec<LintIssue>,
    pub files_seen: usize,
}

impl BuildReport {
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == Severity::Error)
    }
}

/// Run a full rebuild: discover, parse, index, link taxonomies, derive
/// routes.
///
/// Parsing runs in parallel; the fold into the indexes is sequential over
/// path-sorted input, so two rebuilds of the same tree produce identical
/// indexes.
pub fn build(config: &SiteConfig, site_root: &Path) -> Result<BuildReport> {
    let content_root = site_root.join("content");
    let mut issues = Vec::new();

    // -- Discover --
    let mut jobs: Vec<(&str, &TypeConfig, walker::SourceFile)> = Vec::new();
    for (type_name, type_config) in &config.types {
        let dir = content_root.join(type_config.dir_for(type_name));
        for file in walker::discover(&dir)? {
            jobs.push((type_name, type_config, file));
        }
    }
    let files_seen = jobs.len();
    tracing::debug!(files = files_seen, "discovered content files");

    // -- Parse (parallel) --
    let parsed: Vec<(String, Result<ParsedFile>)> = jobs
        .par_iter()
        .map(|(type_name, type_config, file)| {
            let relative = format!(
                "content/{}/{}",
                type_config.dir_for(type_name),
                file.relative_path.display()
            );
            let result = parser::parse_file(
                &file.absolute_path,
                &relative,
                type_name,
                &type_config.taxonomies,
            );
            (relative, result)
        })
        .collect();

    // -- Fold into the content index (sequential, deterministic) --
    let mut content = ContentIndex::default();
    for (relative, result) in parsed {
        let mut item = match result {
            Ok(parsed) => parsed.item,
            Err(Error::Parse { path, message }) => {
                issues.push(LintIssue::error(&path, message));
                continue;
            }
            Err(e) => return Err(e),
        };

        if item.id.is_empty() {
            item.id = ulid::from_seed(&relative);
            issues.push(LintIssue::warning(
                &relative,
                "missing id, assigned a placeholder; add an `id` to the \
                 front matter to make it permanent",
            ));
        } else if !ulid::is_valid(&item.id) {
            issues.push(LintIssue::warning(
                &relative,
                format!("invalid id `{}`, assigned a placeholder", item.id),
            ));
            item.id = ulid::from_seed(&relative);
        }

        if content.contains(&item.type_name, &item.slug) {
            issues.push(LintIssue::error(
                &relative,
                format!(
                    "duplicate slug `{}` for type `{}`, file excluded",
                    item.slug, item.type_name
                ),
            ));
            continue;
        }
        if let Some(existing) = content.get_by_id(&item.id) {
            issues.push(LintIssue::error(
                &relative,
                format!(
                    "duplicate id `{}` (already used by {}), file excluded",
                    item.id, existing.file_path
                ),
            ));
            continue;
        }

        scrub_terms(config, &mut item, &mut issues);
        content.insert(item);
    }

    let taxonomy =
        build_taxonomies(config, &content_root, &content, &mut issues)?;
    let routes = build_routes(config, &content, &mut issues);

    tracing::info!(
        items = content.len(),
        issues = issues.len(),
        "index build complete"
    );

    Ok(BuildReport {
        indexes: Indexes {
            content,
            taxonomy,
            routes,
        },
        issues,
        files_seen,
    })
}

/// Drop term references to taxonomies the site does not declare, normalize
/// term slugs, and collapse duplicates (`[Rust, rust]` is one membership).
fn scrub_terms(
    config: &SiteConfig,
    item: &mut Item,
    issues: &mut Vec<LintIssue>,
) {
    let mut cleaned = BTreeMap::new();
    for (taxonomy, raw_terms) in std::mem::take(&mut item.terms) {
        if !config.taxonomies.contains_key(&taxonomy) {
            issues.push(LintIssue::warning(
                &item.file_path,
                format!("references undeclared taxonomy `{taxonomy}`"),
            ));
            continue;
        }
        let mut seen = BTreeSet::new();
        let slugs: Vec<String> = raw_terms
            .iter()
            .map(|t| parser::slugify(t))
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        if !slugs.is_empty() {
            cleaned.insert(taxonomy, slugs);
        }
    }
    item.terms = cleaned;
}

/// Assemble the taxonomy index: declared terms from
/// `content/_taxonomies/<name>.yml`, auto-created terms where allowed, and
/// membership lists sorted by item id.
fn build_taxonomies(
    config: &SiteConfig,
    content_root: &Path,
    content: &ContentIndex,
    issues: &mut Vec<LintIssue>,
) -> Result<TaxonomyIndex> {
    let mut index = TaxonomyIndex::default();
    let tax_dir = content_root.join("_taxonomies");

    for (name, tax_config) in &config.taxonomies {
        let decl_path = tax_dir.join(format!("{name}.yml"));
        let terms = match declared_terms(&decl_path) {
            Ok(terms) => terms,
            Err(Error::Parse { path, message }) => {
                issues.push(LintIssue::error(&path, message));
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        index.taxonomies.insert(
            name.clone(),
            TaxonomyEntry {
                config: tax_config.clone(),
                terms,
            },
        );
    }

    // Membership pass. Members are sorted by id afterwards so the lists are
    // stable across rebuilds.
    for type_items in content.by_type.values() {
        for item in type_items.values() {
            for (taxonomy, slugs) in &item.terms {
                let entry = match index.taxonomies.get_mut(taxonomy) {
                    Some(entry) => entry,
                    None => continue,
                };
                for slug in slugs {
                    if let Some(term) = entry.terms.get_mut(slug) {
                        term.items.push(item.member_key());
                    } else if entry.config.allow_unknown_terms {
                        entry.terms.insert(
                            slug.clone(),
                            Term {
                                name: display_name(slug),
                                description: None,
                                items: vec![item.member_key()],
                            },
                        );
                    } else {
                        issues.push(LintIssue::warning(
                            &item.file_path,
                            format!(
                                "unknown term `{slug}` in taxonomy \
                                 `{taxonomy}`, membership dropped"
                            ),
                        ));
                    }
                }
            }
        }
    }

    for entry in index.taxonomies.values_mut() {
        for term in entry.terms.values_mut() {
            term.items.sort_by_key(|key| {
                key.split_once(':')
                    .and_then(|(t, s)| content.get(t, s))
                    .map(|item| item.id.clone())
                    .unwrap_or_default()
            });
        }
    }

    Ok(index)
}

/// Parse a taxonomy declaration file. Two shapes are accepted: a mapping
/// (`slug: Display Name` or `slug: {name, description}`) and a sequence of
/// mappings with an explicit `slug` key.
fn declared_terms(path: &Path) -> Result<BTreeMap<String, Term>> {
    if !path.is_file() {
        return Ok(BTreeMap::new());
    }
    let raw = std::fs::read_to_string(path)?;
    let display = path.display().to_string();
    let value: serde_yaml::Value = serde_yaml::from_str(&raw)
        .map_err(|e| Error::parse(&display, e.to_string()))?;

    let mut terms = BTreeMap::new();
    match value {
        serde_yaml::Value::Null => {}
        serde_yaml::Value::Mapping(mapping) => {
            for (key, value) in mapping {
                let slug = match key.as_str() {
                    Some(k) => parser::slugify(k),
                    None => {
                        return Err(Error::parse(
                            &display,
                            "term keys must be strings",
                        ));
                    }
                };
                let term = declared_term(&display, &slug, value)?;
                terms.insert(slug, term);
            }
        }
        serde_yaml::Value::Sequence(entries) => {
            for entry in entries {
                let serde_yaml::Value::Mapping(m) = &entry else {
                    return Err(Error::parse(
                        &display,
                        "each term entry must be a mapping with a `slug`",
                    ));
                };
                let slug = m
                    .get("slug")
                    .and_then(|v| v.as_str())
                    .map(parser::slugify)
                    .ok_or_else(|| {
                        Error::parse(
                            &display,
                            "each term entry must be a mapping with a `slug`",
                        )
                    })?;
                let term = declared_term(&display, &slug, entry)?;
                terms.insert(slug, term);
            }
        }
        _ => {
            return Err(Error::parse(
                &display,
                "taxonomy declaration must be a mapping or a sequence",
            ));
        }
    }
    Ok(terms)
}

fn declared_term(
    file: &str,
    slug: &str,
    value: serde_yaml::Value,
) -> Result<Term> {
    match value {
        serde_yaml::Value::String(name) => Ok(Term {
            name,
            description: None,
            items: Vec::new(),
        }),
        serde_yaml::Value::Mapping(m) => Ok(Term {
            name: m
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| display_name(slug)),
            description: m
                .get("description")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            items: Vec::new(),
        }),
        serde_yaml::Value::Null => Ok(Term {
            name: display_name(slug),
            description: None,
            items: Vec::new(),
        }),
        _ => Err(Error::parse(
            file,
            format!("term `{slug}` must be a string or a mapping"),
        )),
    }
}

/// `some-term` → `Some Term`, for auto-created terms.
fn display_name(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>()
                        + chars.as_str()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive the route table from the content index and site config.
///
/// Only published items get routes. On a URL collision the first route
/// (BTreeMap iteration order) wins and the loser is reported.
fn build_routes(
    config: &SiteConfig,
    content: &ContentIndex,
    issues: &mut Vec<LintIssue>,
) -> RouteIndex {
    let mut routes = RouteIndex::default();

    for (type_name, type_config) in &config.types {
        if let UrlConfig::Pattern {
            archive: Some(archive),
            ..
        } = &type_config.url
        {
            insert_route(
                &mut routes,
                normalize_url(archive),
                Route::Archive {
                    type_name: type_name.clone(),
                    template: type_config.template.clone(),
                },
                "loam.toml",
                issues,
            );
        }

        for item in content.items_of(type_name) {
            if !item.is_published() {
                continue;
            }
            let url = item_url(type_name, type_config, item);
            insert_route(
                &mut routes,
                url,
                Route::Item {
                    type_name: type_name.clone(),
                    slug: item.slug.clone(),
                    template: type_config.template.clone(),
                },
                &item.file_path,
                issues,
            );
        }
    }

    for (name, tax_config) in &config.taxonomies {
        if tax_config.public {
            let base = tax_config.base_for(name);
            routes.taxonomy.insert(
                base.clone(),
                TaxonomyRoute {
                    taxonomy: name.clone(),
                    base,
                },
            );
        }
    }

    for (path, redirect) in &config.redirects {
        let path = normalize_url(path);
        if routes.exact.contains_key(&path) {
            issues.push(LintIssue::warning(
                "loam.toml",
                format!("redirect `{path}` shadows a content route, skipped"),
            ));
            continue;
        }
        routes.redirects.insert(path, redirect.clone());
    }

    routes
}

fn insert_route(
    routes: &mut RouteIndex,
    url: String,
    route: Route,
    source: &str,
    issues: &mut Vec<LintIssue>,
) {
    if routes.exact.contains_key(&url) {
        issues.push(LintIssue::error(
            source,
            format!("route collision at `{url}`, first definition wins"),
        ));
        return;
    }
    routes.exact.insert(url, route);
}

/// The public URL of an item under its type's URL strategy.
fn item_url(type_name: &str, type_config: &TypeConfig, item: &Item) -> String {
    match &type_config.url {
        UrlConfig::Pattern { pattern, .. } => {
            normalize_url(&pattern.replace("{slug}", &item.slug))
        }
        UrlConfig::Hierarchical { base } => {
            // Mirror the folder structure: parent directories plus the
            // item's slug, with `index` collapsing onto its directory.
            let prefix =
                format!("content/{}/", type_config.dir_for(type_name));
            let inner = item
                .file_path
                .strip_prefix(&prefix)
                .unwrap_or(&item.file_path);
            let mut segments: Vec<&str> =
                Path::new(inner)
                    .parent()
                    .into_iter()
                    .flat_map(|p| p.iter())
                    .filter_map(|c| c.to_str())
                    .collect();
            if item.slug != "index" {
                segments.push(&item.slug);
            }
            let base = base.trim_end_matches('/');
            if segments.is_empty() {
                normalize_url(if base.is_empty() { "/" } else { base })
            } else {
                format!("{base}/{}", segments.join("/"))
            }
        }
    }
}

/// Leading slash, no trailing slash (except the root itself).
fn normalize_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn site() -> (tempfile::TempDir, SiteConfig) {
        (tempfile::tempdir().unwrap(), SiteConfig::default())
    }

    #[test]
    fn builds_empty_site() {
        let (tmp, config) = site();
        let report = build(&config, tmp.path()).unwrap();
        assert!(report.indexes.content.is_empty());
        assert!(report.issues.is_empty());
        assert_eq!(report.files_seen, 0);
    }

    #[test]
    fn indexes_items_and_derives_routes() {
        let (tmp, config) = site();
        write(
            tmp.path(),
            "content/pages/about.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\ntitle: About\n---\nBody",
        );
        write(
            tmp.path(),
            "content/posts/2024-01-15-hello.md",
            "---\nid: 01BX5ZZKBKACTAV9WEVGEMMVRZ\ntitle: Hello\n---\nHi",
        );

        let report = build(&config, tmp.path()).unwrap();
        let indexes = &report.indexes;

        assert_eq!(indexes.content.len(), 2);
        assert!(indexes.content.get("page", "about").is_some());
        assert!(indexes.content.get("post", "hello").is_some());
        assert!(matches!(
            indexes.routes.exact.get("/about"),
            Some(Route::Item { slug, .. }) if slug == "about"
        ));
        assert!(matches!(
            indexes.routes.exact.get("/blog/hello"),
            Some(Route::Item { .. })
        ));
        assert!(matches!(
            indexes.routes.exact.get("/blog"),
            Some(Route::Archive { type_name, .. }) if type_name == "post"
        ));
        assert!(report.issues.is_empty());
    }

    #[test]
    fn missing_id_gets_stable_placeholder() {
        let (tmp, config) = site();
        write(tmp.path(), "content/pages/about.md", "# About\n");

        let a = build(&config, tmp.path()).unwrap();
        let b = build(&config, tmp.path()).unwrap();

        let id_a = &a.indexes.content.get("page", "about").unwrap().id;
        let id_b = &b.indexes.content.get("page", "about").unwrap().id;
        assert_eq!(id_a, id_b);
        assert!(ulid::is_valid(id_a));
        assert!(a
            .issues
            .iter()
            .any(|i| i.severity == Severity::Warning
                && i.message.contains("missing id")));
    }

    #[test]
    fn duplicate_slug_excludes_later_file() {
        let (tmp, config) = site();
        write(
            tmp.path(),
            "content/pages/a.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\nslug: about\n---\n",
        );
        write(
            tmp.path(),
            "content/pages/b.md",
            "---\nid: 01BX5ZZKBKACTAV9WEVGEMMVRZ\nslug: about\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        assert_eq!(report.indexes.content.len(), 1);
        // Path-sorted fold: a.md wins.
        assert_eq!(
            report.indexes.content.get("page", "about").unwrap().file_path,
            "content/pages/a.md"
        );
        assert!(report.has_errors());
    }

    #[test]
    fn duplicate_id_excludes_later_file() {
        let (tmp, config) = site();
        write(
            tmp.path(),
            "content/pages/a.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\n---\n",
        );
        write(
            tmp.path(),
            "content/pages/b.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        assert_eq!(report.indexes.content.len(), 1);
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.contains("duplicate id")));
    }

    #[test]
    fn parse_error_is_reported_not_fatal() {
        let (tmp, config) = site();
        write(tmp.path(), "content/pages/bad.md", "---\n[broken\n---\n");
        write(
            tmp.path(),
            "content/pages/good.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        assert_eq!(report.indexes.content.len(), 1);
        assert!(report.has_errors());
    }

    #[test]
    fn auto_creates_unknown_terms() {
        let (tmp, config) = site();
        write(
            tmp.path(),
            "content/posts/p.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\ntag: [Rust Lang]\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        let term =
            report.indexes.taxonomy.term("tag", "rust-lang").unwrap();
        assert_eq!(term.name, "Rust Lang");
        assert_eq!(term.items, vec!["post:p"]);
    }

    #[test]
    fn duplicate_term_references_collapse() {
        let (tmp, config) = site();
        write(
            tmp.path(),
            "content/posts/p.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\n\
             tag: [Rust, rust, RUST]\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        let item = report.indexes.content.get("post", "p").unwrap();
        assert_eq!(item.terms["tag"], vec!["rust"]);
        let term = report.indexes.taxonomy.term("tag", "rust").unwrap();
        assert_eq!(term.items, vec!["post:p"]);
    }

    #[test]
    fn declared_terms_and_strict_taxonomy() {
        let (tmp, mut config) = site();
        config
            .taxonomies
            .get_mut("category")
            .unwrap()
            .allow_unknown_terms = false;
        write(
            tmp.path(),
            "content/_taxonomies/category.yml",
            "tutorials:\n  name: Tutorials\n  description: Guides\n",
        );
        write(
            tmp.path(),
            "content/posts/a.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\ncategory: tutorials\n---\n",
        );
        write(
            tmp.path(),
            "content/posts/b.md",
            "---\nid: 01BX5ZZKBKACTAV9WEVGEMMVRZ\ncategory: mystery\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        let tax = &report.indexes.taxonomy;
        assert_eq!(
            tax.term("category", "tutorials").unwrap().description.as_deref(),
            Some("Guides")
        );
        assert_eq!(
            tax.term("category", "tutorials").unwrap().items,
            vec!["post:a"]
        );
        assert!(tax.term("category", "mystery").is_none());
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.contains("unknown term")));
    }

    #[test]
    fn declared_terms_accept_sequence_form() {
        let (tmp, config) = site();
        write(
            tmp.path(),
            "content/_taxonomies/tag.yml",
            "- slug: rust\n  name: Rust\n- slug: web\n  name: Web\n  \
             description: Browsers and servers\n",
        );
        write(
            tmp.path(),
            "content/posts/p.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\ntag: [rust]\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        let tax = &report.indexes.taxonomy;
        assert_eq!(tax.term("tag", "rust").unwrap().items, vec!["post:p"]);
        assert_eq!(
            tax.term("tag", "web").unwrap().description.as_deref(),
            Some("Browsers and servers")
        );
        assert!(tax.term("tag", "web").unwrap().items.is_empty());
    }

    #[test]
    fn drafts_get_no_routes() {
        let (tmp, config) = site();
        write(
            tmp.path(),
            "content/pages/secret.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\nstatus: draft\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        assert!(report.indexes.content.get("page", "secret").is_some());
        assert!(report.indexes.routes.exact.get("/secret").is_none());
    }

    #[test]
    fn hierarchical_urls_mirror_folders() {
        let (tmp, config) = site();
        write(
            tmp.path(),
            "content/pages/team/bob.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\n---\n",
        );
        write(
            tmp.path(),
            "content/pages/index.md",
            "---\nid: 01BX5ZZKBKACTAV9WEVGEMMVRZ\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        assert!(report.indexes.routes.exact.contains_key("/team/bob"));
        assert!(report.indexes.routes.exact.contains_key("/"));
    }

    #[test]
    fn redirect_shadowing_content_is_skipped() {
        let (tmp, mut config) = site();
        config.redirects.insert(
            "/about".to_string(),
            crate::config::Redirect {
                to: "/elsewhere".to_string(),
                status: 301,
            },
        );
        config.redirects.insert(
            "/old-blog".to_string(),
            crate::config::Redirect {
                to: "/blog".to_string(),
                status: 301,
            },
        );
        write(
            tmp.path(),
            "content/pages/about.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        let routes = &report.indexes.routes;
        assert!(!routes.redirects.contains_key("/about"));
        assert_eq!(routes.redirects["/old-blog"].to, "/blog");
        assert!(report
            .issues
            .iter()
            .any(|i| i.message.contains("shadows")));
    }

    #[test]
    fn taxonomy_routes_for_public_taxonomies() {
        let (tmp, mut config) = site();
        config.taxonomies.get_mut("tag").unwrap().public = false;

        let report = build(&config, tmp.path()).unwrap();
        let routes = &report.indexes.routes;
        assert!(routes.taxonomy.contains_key("/category"));
        assert!(!routes.taxonomy.contains_key("/tag"));
    }

    #[test]
    fn member_lists_sorted_by_id() {
        let (tmp, config) = site();
        // z.md carries the smaller id; path order would put it last.
        write(
            tmp.path(),
            "content/posts/a.md",
            "---\nid: 01BX5ZZKBKACTAV9WEVGEMMVRZ\ntag: rust\n---\n",
        );
        write(
            tmp.path(),
            "content/posts/z.md",
            "---\nid: 01ARZ3NDEKTSV4RRFFQ69G5FAV\ntag: rust\n---\n",
        );

        let report = build(&config, tmp.path()).unwrap();
        let term = report.indexes.taxonomy.term("tag", "rust").unwrap();
        assert_eq!(term.items, vec!["post:z", "post:a"]);
    }

    #[test]
    fn rebuild_is_idempotent() {
        let (tmp, config) = site();
        write(
            tmp.path(),
            "content/posts/2024-05-01-first.md",
            "---\ntitle: First\ntag: [rust, cli]\n---\nbody",
        );
        write(tmp.path(), "content/pages/about.md", "# About\n");

        let a = build(&config, tmp.path()).unwrap();
        let b = build(&config, tmp.path()).unwrap();
        assert_eq!(a.indexes, b.indexes);
        assert_eq!(
            rmp_serde::to_vec_named(&a.indexes).unwrap(),
            rmp_serde::to_vec_named(&b.indexes).unwrap()
        );
    }

    #[test]
    fn url_normalization() {
        assert_eq!(normalize_url("/blog/"), "/blog");
        assert_eq!(normalize_url("blog"), "/blog");
        assert_eq!(normalize_url("/"), "/");
        assert_eq!(normalize_url(""), "/");
    }

    #[test]
    fn display_name_from_slug() {
        assert_eq!(display_name("rust-lang"), "Rust Lang");
        assert_eq!(display_name("cli"), "Cli");
    }

    #[test]
    fn deterministic_across_type_order() {
        // BTreeMap config iteration means type order is stable regardless
        // of declaration order in the file.
        let (tmp, config) = site();
        write(tmp.path(), "content/pages/x.md", "# X\n");
        let report = build(&config, tmp.path()).unwrap();
        let types: Vec<PathBuf> = report
            .indexes
            .content
            .types()
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(types, vec![PathBuf::from("page")]);
    }
}
