//! loam - a flat-file content engine.
//!
//! loam walks a tree of markdown files with YAML front matter, builds
//! binary metadata indexes (content, taxonomies, routes), caches them with
//! a fingerprint of the source tree, and answers filtered, sorted, searched
//! and paginated queries from either an in-memory or a [redb]-backed store.
//! Markdown bodies stay on disk and are read back on demand.
//!
//! [redb]: https://github.com/cberner/redb
//!
//! # Quick start
//!
//! ```no_run
//! use loam::{Query, Site};
//!
//! let site = Site::open("my-site").unwrap();
//! let repo = site.repository().unwrap();
//!
//! let results = repo
//!     .query(&Query::new("post").with_term("tag", "rust").per_page(5))
//!     .unwrap();
//! for item in results.items() {
//!     println!("{}: {}", item.slug, item.title);
//! }
//!
//! if let Some(doc) = repo.document("post", "hello-world").unwrap() {
//!     println!("{}", doc.body);
//! }
//! ```

pub mod backend;
pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod item;
pub mod parser;
pub mod query;
pub mod redb_backend;
pub mod repository;
pub mod site;
pub mod ulid;
pub mod walker;

pub use backend::{Backend, MemoryBackend};
pub use builder::{BuildReport, LintIssue, Severity};
pub use config::SiteConfig;
pub use error::{Error, Result};
pub use index::Indexes;
pub use item::{Document, Item};
pub use query::{Direction, FieldOp, Query, QueryResults};
pub use redb_backend::RedbBackend;
pub use repository::{Repository, RouteMatch};
pub use site::{Site, SiteStatus};
