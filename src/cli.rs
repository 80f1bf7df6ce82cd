use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::infra::config::Config;

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
    /// Loaded configuration with CLI overrides applied
    pub config: Config,
}

impl AppContext {
    /// Report a completed action (suppressed by --quiet)
    pub fn success(&self, msg: &str) {
        if self.quiet {
            return;
        }
        if self.no_color {
            eprintln!("ok: {msg}");
        } else {
            eprintln!("{} {msg}", "ok:".green().bold());
        }
    }

    /// Report a recoverable problem (always shown)
    pub fn warn(&self, msg: &str) {
        if self.no_color {
            eprintln!("warning: {msg}");
        } else {
            eprintln!("{} {msg}", "warning:".yellow().bold());
        }
    }

    /// Optionally colored heading text
    pub fn heading(&self, text: &str) -> String {
        if self.no_color { text.to_string() } else { text.cyan().bold().to_string() }
    }
}

#[derive(Parser)]
#[command(name = "frag")]
#[command(
    about = "Store Python code fragments, parametrize snippets with probed types, and synthesize new snippets from the store"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log pipeline steps to stderr (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Fragment store file (overrides config)
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Turn a selection into a parametrized snippet
    Parametrize(ParametrizeArgs),

    /// Rebuild a document from stored fragments
    Synthesize(SynthesizeArgs),

    /// Add a fragment to the store
    Add(AddArgs),

    /// Update fields of a stored fragment
    Edit(EditArgs),

    /// Remove a fragment from the store
    Delete(LabelArgs),

    /// Print one fragment
    Show(ShowArgs),

    /// List fragments, optionally filtered
    List(ListArgs),

    /// Manage the folder hierarchy
    Folder(FolderArgs),

    /// Initialize a fragforge.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Probe flags shared by commands that run the type probe
#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    /// Skip execution; placeholders stay untyped
    #[arg(long)]
    pub no_probe: bool,

    /// Probe timeout in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Python interpreter (overrides config)
    #[arg(long, value_name = "PROGRAM")]
    pub python: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ParametrizeArgs {
    /// Document and selected lines (format: file.py:3-5, `-` for stdin)
    pub target: String,

    #[command(flatten)]
    pub probe: ProbeArgs,

    /// Emit JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct SynthesizeArgs {
    /// Document and optional lines (format: file.py or file.py:3-5)
    pub target: String,

    /// Emit JSON output
    #[arg(long)]
    pub json: bool,
}

/// Editable fragment fields
#[derive(Args, Debug, Clone, Default)]
pub struct FragmentFields {
    /// Fragment body (code)
    #[arg(long)]
    pub body: Option<String>,

    /// Comma-separated keywords used by synthesis
    #[arg(long)]
    pub keywords: Option<String>,

    /// Language scope, e.g. python
    #[arg(long)]
    pub scope: Option<String>,

    /// Free-form domain
    #[arg(long)]
    pub domain: Option<String>,

    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,

    /// Snippet trigger prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Human description
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Unique fragment label
    pub label: String,

    /// Take the body from a selection (format: file.py:3-5)
    #[arg(long, value_name = "FILE:LINES")]
    pub from: Option<String>,

    /// Parametrize the selection given with --from
    #[arg(long, requires = "from")]
    pub parametrize: bool,

    #[command(flatten)]
    pub fields: FragmentFields,

    #[command(flatten)]
    pub probe: ProbeArgs,
}

#[derive(Parser, Debug)]
pub struct EditArgs {
    /// Label of the fragment to update
    pub label: String,

    #[command(flatten)]
    pub fields: FragmentFields,

    /// Replace the placeholder list
    #[arg(long)]
    pub placeholders: Option<String>,

    /// Add a tag
    #[arg(long, value_name = "TAG")]
    pub add_tag: Vec<String>,

    /// Remove a tag
    #[arg(long, value_name = "TAG")]
    pub remove_tag: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct LabelArgs {
    /// Fragment label
    pub label: String,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Fragment label
    pub label: String,

    /// Emit JSON output
    #[arg(long)]
    pub json: bool,

    /// Emit the editor-snippet view instead of the full record
    #[arg(long)]
    pub snippet: bool,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Filter predicate (e.g. "scope:python,keyword:for")
    #[arg(short, long, value_name = "PRED")]
    pub filter: Option<String>,

    /// Emit JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct FolderArgs {
    #[command(subcommand)]
    pub command: FolderSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum FolderSubcommand {
    /// Create a folder
    Add {
        /// Folder label
        label: String,

        /// Parent folder (default: root)
        #[arg(long)]
        parent: Option<String>,
    },

    /// Delete a folder; its children move to its parent
    Delete {
        /// Folder label
        label: String,
    },

    /// Replace the children of a folder
    SetChildren {
        /// Folder label
        label: String,

        /// Fragment or folder labels
        children: Vec<String>,
    },

    /// Print the folder hierarchy
    Tree,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,

    /// Install into this directory instead of printing to stdout
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}
