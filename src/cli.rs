use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "loam",
    about = "A flat-file content engine: index, query and route markdown \
             content"
)]
pub struct Cli {
    /// Site root directory (defaults to the current directory)
    #[arg(long, global = true)]
    pub site: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rebuild the index caches from the content tree
    Rebuild(RebuildArgs),
    /// Show cache freshness and index statistics
    Status(StatusArgs),
    /// Check the content tree and report problems without caching
    Lint(LintArgs),
    /// Query items of a content type
    Query(QueryArgs),
    /// Print a single item by type:slug, id, or file path
    Get(GetArgs),
    /// List indexed items
    Ls(LsArgs),
    /// Scaffold a new content file with a fresh id
    Make(MakeArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct RebuildArgs {
    /// Output the build report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct LintArgs {
    /// Output findings as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit non-zero on warnings as well as errors
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// Content type to query; every type when omitted
    pub type_name: Option<String>,

    /// Field filter as FIELD OP VALUE, e.g. `--where author = addy`
    /// (ops: = != > >= < <= in not_in like; repeatable)
    #[arg(
        short = 'w',
        long = "where",
        num_args = 3,
        value_names = ["FIELD", "OP", "VALUE"],
        action = clap::ArgAction::Append
    )]
    pub filters: Vec<String>,

    /// Taxonomy term filter as `taxonomy:term` (repeatable)
    #[arg(short, long)]
    pub term: Vec<String>,

    /// Relevance search over title and excerpt
    #[arg(short, long)]
    pub search: Option<String>,

    /// Field to order by (ignored while searching)
    #[arg(long, default_value = "date")]
    pub order_by: String,

    /// Sort ascending instead of descending
    #[arg(long)]
    pub asc: bool,

    /// Admit items with exactly this status
    #[arg(long, conflicts_with = "drafts")]
    pub status: Option<String>,

    /// Admit items of any status, drafts included
    #[arg(long)]
    pub drafts: bool,

    /// Page number (1-based)
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Page size (clamped to 1..=100)
    #[arg(short = 'n', long, default_value = "10")]
    pub per_page: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// `type:slug`, a 26-character id, or a content file path
    pub reference: String,

    /// Print the markdown body instead of the metadata
    #[arg(short, long)]
    pub body: bool,

    /// Output metadata as JSON
    #[arg(long, conflicts_with = "body")]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct LsArgs {
    /// Limit to one content type
    pub type_name: Option<String>,

    /// Glob over source file paths, e.g. `content/posts/2024-*`
    #[arg(short = 'g', long)]
    pub glob: Option<String>,

    /// Include drafts
    #[arg(long)]
    pub drafts: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct MakeArgs {
    /// Content type of the new item
    pub type_name: String,

    /// Title; the slug is derived from it unless --slug is given
    pub title: String,

    /// Explicit slug
    #[arg(long)]
    pub slug: Option<String>,

    /// Create as a draft
    #[arg(long)]
    pub draft: bool,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_query_with_filters() {
        let cli = Cli::parse_from([
            "loam", "query", "post", "--where", "author", "=", "addy",
            "--term", "tag:rust", "-n", "5", "--page", "2",
        ]);
        match cli.command {
            Command::Query(args) => {
                assert_eq!(args.type_name.as_deref(), Some("post"));
                assert_eq!(args.filters, vec!["author", "=", "addy"]);
                assert_eq!(args.term, vec!["tag:rust"]);
                assert_eq!(args.per_page, 5);
                assert_eq!(args.page, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_apply_after_subcommand() {
        let cli =
            Cli::parse_from(["loam", "status", "--site", "/tmp/x", "-vv"]);
        assert_eq!(cli.site.as_deref(), Some(std::path::Path::new("/tmp/x")));
        assert_eq!(cli.verbose, 2);
    }
}
