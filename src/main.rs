use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use serde_json::json;
use tracing_subscriber::EnvFilter;

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

use cli::{
    Cli, Command, GetArgs, LintArgs, LsArgs, MakeArgs, QueryArgs,
    RebuildArgs, StatusArgs,
};
use config::Sorting;
use error::{Error, Result};
use query::{Direction, Query};
use repository::Repository;
use site::Site;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("LOAM_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let root: PathBuf = match cli.site {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    let site = Site::open(&root)?;

    match cli.command {
        Command::Rebuild(args) => cmd_rebuild(&site, &args)?,
        Command::Status(args) => cmd_status(&site, &args)?,
        Command::Lint(args) => cmd_lint(&site, &args)?,
        Command::Query(args) => {
            let repo = site.repository()?;
            cmd_query(&repo, &args)?;
        }
        Command::Get(args) => {
            let repo = site.repository()?;
            cmd_get(&repo, &args)?;
        }
        Command::Ls(args) => {
            let repo = site.repository()?;
            cmd_ls(&repo, &args)?;
        }
        Command::Make(args) => cmd_make(&site, &args)?,
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "loam",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

fn cmd_rebuild(site: &Site, args: &RebuildArgs) -> Result<()> {
    let report = site.rebuild()?;

    if args.json {
        let value = json!({
            "files": report.files_seen,
            "items": report.indexes.content.len(),
            "issues": report.issues,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for issue in &report.issues {
            eprintln!("{issue}");
        }
        println!(
            "Indexed {} items from {} files ({} issue{}).",
            report.indexes.content.len(),
            report.files_seen,
            report.issues.len(),
            if report.issues.len() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

fn cmd_status(site: &Site, args: &StatusArgs) -> Result<()> {
    let status = site.status()?;

    if args.json {
        let value = json!({
            "cached": status.cached,
            "fresh": status.fresh,
            "built_at": status.built_at,
            "signature": status.signature,
            "items": status.items,
            "types": status.types,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "cache: {}",
            match (status.cached, status.fresh) {
                (false, _) => "absent",
                (true, false) => "stale",
                (true, true) => "fresh",
            }
        );
        if let Some(built_at) = status.built_at {
            println!("built: {built_at}");
        }
        println!("items: {}", status.items);
        if !status.types.is_empty() {
            println!("types: {}", status.types.join(", "));
        }
    }
    Ok(())
}

fn cmd_lint(site: &Site, args: &LintArgs) -> Result<()> {
    let report = site.check()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.issues)?);
    } else if report.issues.is_empty() {
        println!(
            "No problems in {} files.",
            report.files_seen
        );
    } else {
        for issue in &report.issues {
            println!("{issue}");
        }
    }

    if report.has_errors() || (args.strict && !report.issues.is_empty()) {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_query(repo: &Repository, args: &QueryArgs) -> Result<()> {
    let mut query = match &args.type_name {
        Some(type_name) => Query::new(type_name),
        None => Query::across_types(),
    };
    query = query
        .order_by(
            &args.order_by,
            if args.asc { Direction::Asc } else { Direction::Desc },
        )
        .page(args.page)
        .per_page(args.per_page);

    if args.drafts {
        query = query.any_status();
    } else if let Some(status) = &args.status {
        query = query.status(status);
    }
    if let Some(needle) = &args.search {
        query = query.search(needle);
    }
    for spec in &args.term {
        let (taxonomy, term) = spec.split_once(':').ok_or_else(|| {
            Error::Config(format!(
                "term filter must be `taxonomy:term`, got `{spec}`"
            ))
        })?;
        query = query.with_term(taxonomy, term);
    }
    for triple in args.filters.chunks(3) {
        let [field, op, value] = triple else {
            return Err(Error::Config(
                "--where takes FIELD OP VALUE".to_string(),
            ));
        };
        // An unknown operator matches nothing rather than erroring.
        query = query.where_field_str(field, op, parse_value(value));
    }

    let results = repo.query(&query)?;
    let searching = args.search.is_some();

    if args.json {
        let items: Vec<serde_json::Value> = results
            .hits
            .iter()
            .map(|hit| {
                let mut value = serde_json::to_value(&hit.item)
                    .unwrap_or(serde_json::Value::Null);
                if searching {
                    if let Some(map) = value.as_object_mut() {
                        map.insert("score".to_string(), json!(hit.score));
                    }
                }
                value
            })
            .collect();
        let value = json!({
            "total": results.total,
            "page": results.page,
            "per_page": results.per_page,
            "total_pages": results.total_pages(),
            "items": items,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for hit in &results.hits {
            if searching {
                println!(
                    "{}\t{}\t{} ({})",
                    hit.item.slug, hit.item.title, hit.score, hit.item.status
                );
            } else {
                println!(
                    "{}\t{}\t{}",
                    hit.item.slug,
                    hit.item.date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    hit.item.title
                );
            }
        }
        eprintln!(
            "page {}/{} ({} total)",
            results.page,
            results.total_pages(),
            results.total
        );
    }
    Ok(())
}

/// JSON value if it parses, plain string otherwise, so `--where views > 10`
/// compares numerically but `--where author = addy` needs no quoting.
fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn cmd_get(repo: &Repository, args: &GetArgs) -> Result<()> {
    let item = resolve_reference(repo, &args.reference)?.ok_or_else(|| {
        Error::NotFound {
            kind: "item",
            name: args.reference.clone(),
        }
    })?;

    if args.body {
        let doc = repo
            .document(&item.type_name, &item.slug)?
            .ok_or_else(|| Error::NotFound {
                kind: "file",
                name: item.file_path.clone(),
            })?;
        print!("{}", doc.body);
    } else if args.json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("id: {}", item.id);
        println!("type: {}", item.type_name);
        println!("slug: {}", item.slug);
        println!("title: {}", item.title);
        println!("status: {}", item.status);
        if let Some(date) = item.date {
            println!("date: {date}");
        }
        if let Some(updated) = item.updated {
            println!("updated: {updated}");
        }
        for (taxonomy, terms) in &item.terms {
            println!("{taxonomy}: {}", terms.join(", "));
        }
        println!("file: {}", item.file_path);
    }
    Ok(())
}

/// `type:slug`, then a bare ULID, then a source file path.
fn resolve_reference(
    repo: &Repository,
    reference: &str,
) -> Result<Option<item::Item>> {
    if let Some((type_name, slug)) = reference.split_once(':') {
        return repo.get(type_name, slug);
    }
    if ulid::is_valid(reference) {
        if let Some(item) = repo.get_by_id(reference)? {
            return Ok(Some(item));
        }
    }
    repo.get_by_path(reference.trim_start_matches("./"))
}

fn cmd_ls(repo: &Repository, args: &LsArgs) -> Result<()> {
    let matcher = match &args.glob {
        Some(pattern) => Some(
            globset::Glob::new(pattern)
                .map_err(|e| Error::Config(e.to_string()))?
                .compile_matcher(),
        ),
        None => None,
    };

    let types = match &args.type_name {
        Some(type_name) => vec![type_name.clone()],
        None => repo.types()?,
    };

    let mut items = Vec::new();
    for type_name in &types {
        for item in repo.items_of(type_name)? {
            if !args.drafts && !item.is_published() {
                continue;
            }
            if let Some(matcher) = &matcher {
                if !matcher.is_match(&item.file_path) {
                    continue;
                }
            }
            items.push(item);
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            println!(
                "{}:{}\t{}\t{}",
                item.type_name, item.slug, item.status, item.title
            );
        }
        eprintln!("{} item{}", items.len(), if items.len() == 1 {
            ""
        } else {
            "s"
        });
    }
    Ok(())
}

fn cmd_make(site: &Site, args: &MakeArgs) -> Result<()> {
    let config = site.config();
    let type_config =
        config.types.get(&args.type_name).ok_or_else(|| {
            Error::NotFound {
                kind: "content type",
                name: args.type_name.clone(),
            }
        })?;

    let slug = match &args.slug {
        Some(slug) => parser::slugify(slug),
        None => parser::slugify(&args.title),
    };
    if slug.is_empty() {
        return Err(Error::Config(
            "title produces an empty slug".to_string(),
        ));
    }

    let dir = site
        .root()
        .join("content")
        .join(type_config.dir_for(&args.type_name));
    let path = dir.join(format!("{slug}.md"));
    if path.exists() {
        return Err(Error::Config(format!(
            "{} already exists",
            path.display()
        )));
    }
    std::fs::create_dir_all(&dir)?;

    let mut front = String::from("---\n");
    front.push_str(&format!("id: {}\n", ulid::generate()));
    front.push_str(&format!("title: {}\n", args.title));
    if args.draft {
        front.push_str("status: draft\n");
    }
    if type_config.sorting == Sorting::DateDesc {
        let today = chrono::Utc::now().date_naive();
        front.push_str(&format!("date: {today}\n"));
    }
    front.push_str("---\n\n");

    std::fs::write(&path, front)?;
    println!("{}", path.display());
    Ok(())
}
