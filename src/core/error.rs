//! Error taxonomy of the parametrization engine.
//!
//! - `ParseFailure`: the document does not parse; fatal to the call.
//! - `ExecutionFailure`: the probe process failed; callers degrade to
//!   untyped placeholders and warn.
//! - `Cancelled`: user abort, never a partial result.

use std::time::Duration;

use miette::{Diagnostic, SourceSpan};

/// Python source that Tree-sitter could not parse cleanly.
#[derive(Debug, Diagnostic, thiserror::Error)]
#[error("Python source does not parse at {line}:{column}: {message}")]
#[diagnostic(code(fragforge::parse))]
pub struct ParseFailure
{
    /// 1-based line of the first error node
    pub line: usize,
    /// 0-based byte column of the first error node
    pub column: usize,
    pub message: String,

    #[source_code]
    pub src: String,

    #[label("parse error here")]
    pub span: SourceSpan,

    #[help]
    pub help: Option<String>,
}

/// Failure of the external probe process.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionFailure
{
    #[error("probe process exited with code {code:?}")]
    NonZeroExit
    {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("probe process wrote to stderr: {}", last_line(.stderr))]
    Stderr
    {
        stdout: String, stderr: String
    },

    #[error("probe process timed out after {timeout:?}")]
    TimedOut
    {
        timeout: Duration,
        stdout: String,
        stderr: String,
    },

    #[error("failed to spawn interpreter `{program}`")]
    Spawn
    {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("probe i/o failed")]
    Io(#[from] std::io::Error),
}

impl ExecutionFailure
{
    /// Standard output captured before the failure, if any.
    pub fn stdout(&self) -> Option<&str>
    {
        match self
        {
            Self::NonZeroExit { stdout, .. }
            | Self::Stderr { stdout, .. }
            | Self::TimedOut { stdout, .. } => Some(stdout),
            Self::Spawn { .. } | Self::Io(_) => None,
        }
    }

    /// Diagnostic output of the process, if any.
    pub fn stderr(&self) -> Option<&str>
    {
        match self
        {
            Self::NonZeroExit { stderr, .. }
            | Self::Stderr { stderr, .. }
            | Self::TimedOut { stderr, .. } => Some(stderr),
            Self::Spawn { .. } | Self::Io(_) => None,
        }
    }
}

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError
{
    #[error(transparent)]
    Parse(#[from] Box<ParseFailure>),

    #[error("type probe failed: {0}")]
    Execution(#[from] ExecutionFailure),

    #[error("operation cancelled")]
    Cancelled,

    #[error("selection {0} lies outside the document")]
    InvalidSelection(String),

    #[error("placeholder span {start}..{end} does not fit the buffer")]
    Rewrite
    {
        start: usize, end: usize
    },

    #[error("Python grammar rejected by tree-sitter")]
    Grammar(#[from] tree_sitter::LanguageError),
}

impl From<ParseFailure> for EngineError
{
    fn from(value: ParseFailure) -> Self
    {
        Self::Parse(Box::new(value))
    }
}

/// Last non-empty line of process diagnostics (Python puts the
/// exception message there).
fn last_line(text: &str) -> &str
{
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
}
