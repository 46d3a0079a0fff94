//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use docvault_core::DuplicateAction;
use docvault_core::search::MAX_SEARCH_PAGE_SIZE;

/// Upload, find and fetch documents in a document vault.
#[derive(Parser, Debug)]
#[command(name = "docvault")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// API base URL (overrides the config file)
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Bearer token (falls back to DOCVAULT_TOKEN, then the saved token file)
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload one or more files concurrently
    Upload(UploadArgs),
    /// List files, newest first
    List(ListArgs),
    /// Delete a file by id
    Delete {
        /// File id
        id: i64,
    },
    /// Print a short-lived download link
    DownloadLink {
        /// File id
        id: i64,
    },
    /// Print a short-lived inline preview link
    PreviewLink {
        /// File id
        id: i64,
    },
    /// Full-text search over extracted document text
    Search(SearchArgs),
    /// Check whether extracted text exists for a file
    HasText {
        /// File id
        id: i64,
    },
    /// Print the extracted text of a file
    Text {
        /// File id
        id: i64,
    },
    /// Save a bearer token for later runs
    Login {
        /// Token issued by the vault
        token: String,
    },
    /// Forget the saved bearer token
    Logout,
}

/// What to do when an uploaded name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnDuplicate {
    /// Delete the existing file, then upload
    Replace,
    /// Upload under a numbered name such as report-1.pdf
    KeepBoth,
    /// Skip the file
    Skip,
}

impl From<OnDuplicate> for DuplicateAction {
    fn from(value: OnDuplicate) -> Self {
        match value {
            OnDuplicate::Replace => Self::Replace,
            OnDuplicate::KeepBoth => Self::KeepBoth,
            OnDuplicate::Skip => Self::Cancel,
        }
    }
}

/// Arguments for `upload`.
#[derive(ClapArgs, Debug, Clone)]
pub struct UploadArgs {
    /// Files to upload
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Action when a file with the same name exists
    #[arg(long, value_enum, default_value_t = OnDuplicate::Skip)]
    pub on_duplicate: OnDuplicate,

    /// Upload without checking for existing names
    #[arg(long, conflicts_with = "on_duplicate")]
    pub no_duplicate_check: bool,
}

/// Arguments for `list`.
#[derive(ClapArgs, Debug, Clone)]
pub struct ListArgs {
    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    pub page: u32,

    /// Files per page (1-100)
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub size: u32,
}

/// Arguments for `search`.
#[derive(ClapArgs, Debug, Clone)]
pub struct SearchArgs {
    /// Search query
    #[arg(required = true, num_args = 1.., value_name = "QUERY")]
    pub query: Vec<String>,

    /// Results per page (1-100); defaults to the configured page size
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_SEARCH_PAGE_SIZE)))]
    pub limit: Option<u32>,

    /// Number of pages to fetch
    #[arg(short = 'p', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=50))]
    pub pages: u32,
}
