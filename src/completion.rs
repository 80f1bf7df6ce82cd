//! Completion scripts for the `frag` command tree.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{Shell, generate, generate_to};
use tracing::debug;

use crate::cli::{AppContext, Cli, CompletionsArgs};

/// Binary name completions are generated for
const BIN_NAME: &str = "frag";

/// Write the script for `shell` to `out`
pub fn render(
    shell: Shell,
    out: &mut dyn Write,
)
{
    generate(shell, &mut Cli::command(), BIN_NAME, out);
}

/// Write the script into `dir` under the shell's conventional file name
/// (`frag.bash`, `_frag`, ...) and return its path.
pub fn install(
    shell: Shell,
    dir: &Path,
) -> Result<PathBuf>
{
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = generate_to(shell, &mut Cli::command(), BIN_NAME, dir)
        .with_context(|| format!("Failed to write {shell} completions into {}", dir.display()))?;

    debug!(path = %path.display(), "completions written");
    Ok(path)
}

/// Without `--out-dir` the script goes to stdout
pub fn run(
    args: CompletionsArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let Some(dir) = args.out_dir
    else
    {
        render(args.shell, &mut std::io::stdout().lock());
        return Ok(());
    };

    if ctx.dry_run
    {
        println!("dry run: would write {} completions for `{BIN_NAME}` into {}", args.shell, dir.display());
        return Ok(());
    }

    let path = install(args.shell, &dir)?;
    ctx.success(&format!("wrote {} completions to {}", args.shell, path.display()));
    Ok(())
}
