//! Parametrization pipeline:
//! extract → instrument → execute → parse reports → assign → format.
//!
//! A failing probe degrades the result to untyped (or partially
//! typed) placeholders instead of failing the call; a parse failure
//! or a cancellation aborts it.

use std::ops::Range;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::cli::{AppContext, ParametrizeArgs, ProbeArgs};
use crate::core::error::{EngineError, ExecutionFailure};
use crate::core::exec::{CancelToken, ExecutionDriver, ProbeOptions};
use crate::core::extract::{PlaceholderExtractor, Selection, SelectionTarget};
use crate::core::format::{self, FormattedSnippet};
use crate::core::instrument::build_script;
use crate::core::placeholder::PlaceholderSet;
use crate::core::report::{assign_types, parse_reports};
use crate::infra::config::Config;
use crate::infra::io::read_source;
use crate::infra::line_index::NewlineIndex;

/// What happened to the type probe
#[derive(Debug)]
pub enum ProbeStatus
{
    /// The probe ran cleanly
    Typed
    {
        assigned: usize
    },
    /// Execution was disabled or there was nothing to probe
    Skipped,
    /// The probe failed; types come from whatever it printed first
    Degraded(ExecutionFailure),
}

/// Result of one parametrization call
#[derive(Debug)]
pub struct Parametrization
{
    /// Selection text with placeholder tokens
    pub body: String,
    /// Placeholders with spans relative to `body`
    pub placeholders: PlaceholderSet,
    /// Serialized placeholder list
    pub list: String,
    pub status: ProbeStatus,
}

impl Parametrization
{
    /// Human-readable warning for a degraded probe
    pub fn warning(&self) -> Option<String>
    {
        match &self.status
        {
            ProbeStatus::Degraded(failure) => Some(format!(
                "datatypes could not be determined ({failure}); placeholders may be untyped"
            )),
            _ => None,
        }
    }
}

/// Engine entry point for parametrizing selections.
#[derive(Clone)]
pub struct Parametrizer
{
    extractor: PlaceholderExtractor,
    driver: ExecutionDriver,
    probe: bool,
}

impl Parametrizer
{
    pub fn new(
        extractor: PlaceholderExtractor,
        driver: ExecutionDriver,
    ) -> Self
    {
        Self { extractor, driver, probe: true }
    }

    /// Build from configuration
    pub fn from_config(cfg: &Config) -> Self
    {
        let extractor = PlaceholderExtractor::new()
            .with_ignored(
                cfg.extract
                    .ignore_names
                    .iter()
                    .cloned(),
            )
            .with_index_base(cfg.markers.index_base);
        let driver = ExecutionDriver::new(ProbeOptions::from(&cfg.probe));

        Self::new(extractor, driver).with_probe(cfg.probe.enabled)
    }

    /// Enable or disable the execution step
    pub fn with_probe(
        mut self,
        enabled: bool,
    ) -> Self
    {
        self.probe = enabled;
        self
    }

    /// Parametrize `selection` of `document`.
    ///
    /// # Errors
    ///
    /// `Parse` when the document does not parse, `InvalidSelection`
    /// when the selection is outside it, `Cancelled` when `cancel` was
    /// set. Probe failures are reported through `ProbeStatus`.
    #[instrument(skip(self, document, cancel), fields(selection = %selection))]
    pub fn parametrize(
        &self,
        document: &str,
        selection: &Selection,
        cancel: &CancelToken,
    ) -> Result<Parametrization, EngineError>
    {
        let range = selection.byte_range(document)?;
        let mut set = self
            .extractor
            .extract(document, selection)?;

        let status = if !self.probe || set.is_empty()
        {
            debug!(probe = self.probe, "type probe skipped");
            ProbeStatus::Skipped
        }
        else
        {
            self.probe_types(document, range.clone(), &mut set, cancel)?
        };

        let FormattedSnippet { body, placeholders } = format::format_snippet(document, range, &set)?;
        let list = format::render_list(&placeholders);

        info!(placeholders = placeholders.len(), "selection parametrized");
        Ok(Parametrization { body, placeholders, list, status })
    }

    /// Run the instrumented program and attach sampled types.
    fn probe_types(
        &self,
        document: &str,
        range: Range<usize>,
        set: &mut PlaceholderSet,
        cancel: &CancelToken,
    ) -> Result<ProbeStatus, EngineError>
    {
        let script = build_script(document, range, set)?;

        match self
            .driver
            .run(&script.text, cancel)
        {
            Ok(output) =>
            {
                let assigned = assign_types(set, &parse_reports(&output.stdout));
                Ok(ProbeStatus::Typed { assigned })
            }
            Err(EngineError::Execution(failure)) =>
            {
                // Partial stdout still carries the types seen so far
                let assigned = failure
                    .stdout()
                    .map(|out| assign_types(set, &parse_reports(out)))
                    .unwrap_or(0);
                warn!(%failure, assigned, "type probe failed");
                Ok(ProbeStatus::Degraded(failure))
            }
            Err(other) => Err(other),
        }
    }
}

/// Apply `--no-probe`, `--timeout-ms` and `--python` to a config
pub fn apply_probe_args(
    cfg: &mut Config,
    args: &ProbeArgs,
)
{
    if args.no_probe
    {
        cfg.probe
            .enabled = false;
    }
    if let Some(ms) = args.timeout_ms
    {
        cfg.probe
            .timeout_ms = ms;
    }
    if let Some(python) = &args.python
    {
        cfg.probe
            .python = python.clone();
    }
}

/// Read a target and parametrize its selection (shared by
/// `parametrize` and `add --from`).
pub fn parametrize_target(
    target: &str,
    cfg: &Config,
) -> Result<Parametrization>
{
    let target = SelectionTarget::parse(target)?;
    let document = read_source(&target.file)?;
    let lines = NewlineIndex::build(document.as_bytes()).line_count();
    let selection = target.selection(lines);

    Parametrizer::from_config(cfg)
        .parametrize(&document, &selection, &CancelToken::new())
        .map_err(|e| match e
        {
            EngineError::Parse(diag) => anyhow::Error::new(miette_report(*diag)),
            other => anyhow::Error::new(other),
        })
        .with_context(|| format!("Failed to parametrize {}", target.file.display()))
}

/// Render a parse diagnostic with source context for the terminal
fn miette_report(diag: crate::core::error::ParseFailure) -> ParseReport
{
    ParseReport(format!("{:?}", miette::Report::new(diag)))
}

/// Pre-rendered miette diagnostic carried through anyhow
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ParseReport(String);

pub fn run(
    args: ParametrizeArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let mut cfg = ctx
        .config
        .clone();
    apply_probe_args(&mut cfg, &args.probe);

    let result = parametrize_target(&args.target, &cfg)?;

    if let Some(warning) = result.warning()
    {
        ctx.warn(&warning);
    }

    if args.json
    {
        let output = json!({
            "body": result.body,
            "placeholders": result.list,
            "entries": result.placeholders.iter().collect::<Vec<_>>(),
            "warning": result.warning(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", result.body);
    if !ctx.quiet
    {
        if ctx.no_color
        {
            println!("placeholders: {}", result.list);
        }
        else
        {
            println!("{} {}", "placeholders:".bright_black(), result.list.cyan());
        }
    }

    Ok(())
}
