use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use wiki_core::page::PageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser)]
#[command(name = "wiki")]
#[command(about = "Personal wiki with an incremental link, tag and catalog index")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (TOML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding pages/, db/ and search_index/
    #[arg(short = 'd', long, env = "DATA_DIRECTORY", global = true)]
    pub data_directory: Option<PathBuf>,

    /// Overrides the config file; RUST_LOG overrides both
    #[arg(short = 'l', long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

/// Page fields shared by create and update.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct PageArgs {
    #[arg(long = "type")]
    pub page_type: Option<PageType>,

    #[arg(long)]
    pub category: Option<String>,

    /// Comma-separated list
    #[arg(long)]
    pub tags: Option<String>,

    #[arg(long)]
    pub pinned: Option<bool>,

    /// Markdown body
    #[arg(long, conflicts_with = "file")]
    pub body: Option<String>,

    /// Read the markdown body from a file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a page with a fresh permanent id
    Create {
        /// Page title; blank takes the first heading of the body
        #[arg(long, default_value = "")]
        title: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Rewrite an existing page; omitted fields keep their current values
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Print a page's stored markdown
    Show { id: String },

    /// Outgoing and incoming links of a page
    Neighbors { id: String },

    /// Pages linking to a target
    Backlinks { target: String },

    /// Pages of one type, newest first
    List {
        #[arg(long = "type")]
        page_type: String,
    },

    /// Recently updated pages
    Recent {
        #[arg(long)]
        pinned: bool,
    },

    /// Page, category and tag totals
    Count,

    /// Pages carrying a tag
    Tag { slug: String },

    /// Pages in a category
    Category { slug: String },

    /// Full-text search
    Search {
        query: String,

        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_with_page_fields() {
        let cli = Cli::try_parse_from([
            "wiki", "--data-directory", "/tmp/w", "create", "--title", "Hello", "--type", "Journal",
            "--tags", "a, b", "--body", "See [[X]]",
        ])
        .unwrap();
        let Commands::Create { title, page } = cli.command else {
            panic!("expected create");
        };
        assert_eq!(title, "Hello");
        assert_eq!(page.page_type, Some(PageType::Journal));
        assert_eq!(page.tags.as_deref(), Some("a, b"));
        assert_eq!(cli.data_directory, Some(PathBuf::from("/tmp/w")));
    }

    #[test]
    fn rejects_unknown_page_type() {
        assert!(Cli::try_parse_from(["wiki", "create", "--type", "recipe"]).is_err());
    }

    #[test]
    fn body_and_file_are_exclusive() {
        let parsed = Cli::try_parse_from(["wiki", "create", "--body", "x", "--file", "y.md"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn recent_defaults_to_unpinned() {
        let cli = Cli::try_parse_from(["wiki", "recent"]).unwrap();
        assert!(matches!(cli.command, Commands::Recent { pinned: false }));
    }
}
