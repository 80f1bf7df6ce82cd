//! **fragforge** - Reusable Python code fragments with typed placeholders
//!
//! Parametrizes selected snippets by detecting their free variables with
//! tree-sitter and sampling runtime types from an instrumented run, and
//! synthesizes new snippets from stored fragments by keyword overlap.

/// Command-line interface with clap integration
pub mod cli;

/// CLI handlers for store commands
pub mod cli_ext {
    /// add/edit/delete/show/list and folder management
    pub mod store_cmd;
}

/// Shell completion generation
pub mod completion;

/// Parametrization and synthesis engine
pub mod core {
    /// Engine error taxonomy (parse, execution, cancellation)
    pub mod error;
    pub use error::{EngineError, ExecutionFailure, ParseFailure};

    /// Placeholder arena with offset-tracked rewriting
    pub mod placeholder;
    pub use placeholder::{Placeholder, PlaceholderId, PlaceholderSet, Span};

    /// Free-variable detection for a selection
    pub mod extract;
    pub use extract::{PlaceholderExtractor, Position, Selection, SelectionTarget};

    /// Probe-instrumented script builder
    pub mod instrument;

    /// External interpreter driver with timeout and cancellation
    pub mod exec;
    pub use exec::{CancelToken, ExecutionDriver, ProbeOptions};

    /// Probe output parsing and type assignment
    pub mod report;

    /// Placeholder tokens and serialized lists
    pub mod format;

    /// extract → probe → format pipeline
    pub mod parametrize;
    pub use parametrize::{Parametrization, Parametrizer, ProbeStatus, run as parametrize_run};

    /// Line-level fragment synthesis (FOEF)
    pub mod synth;
    pub use synth::{Synthesis, Synthesizer, run as synthesize_run};
}

/// Language processing - tree-sitter Python queries
pub mod parsers {
    /// Declarations and parameter-like references of a Python document
    pub mod python_parser;
    pub use python_parser::{Declaration, PythonAst, Reference, ReferenceKind};
}

/// Fragment storage (in-memory and JSON file)
pub mod store;

/// Infrastructure - Configuration, I/O, and utilities
pub mod infra {
    /// Configuration management with TOML support
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// Source reading (files and stdin) and text writing
    pub mod io;

    /// CRLF/LF-robust line indexing for O(1) line→byte mapping
    pub mod line_index;
    pub use line_index::NewlineIndex;

    /// Offset, UTF-8 and tree-sitter node helpers
    pub mod utils;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::{parametrize_run, synthesize_run};
pub use infra::{Config, load_config};
pub use store::{FileStore, Fragment, FragmentStore, MemoryStore};
