use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Fragment store settings
    pub store: StoreConfig,

    /// Type-probe execution settings
    pub probe: ProbeConfig,

    /// Placeholder extraction settings
    pub extract: ExtractConfig,

    /// Placeholder marker numbering
    pub markers: MarkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig
{
    /// JSON store file; `~` and `$VAR` are expanded
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig
{
    /// Run the instrumented program to sample datatypes
    pub enabled: bool,
    /// Interpreter used to execute the probe
    pub python: String,
    /// Hard limit for one probe run
    pub timeout_ms: u64,
    /// How often the driver checks for exit and cancellation
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig
{
    /// Names never treated as placeholders (on top of Python builtins)
    pub ignore_names: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig
{
    /// First placeholder index (0 or 1)
    pub index_base: usize,
}

impl Default for StoreConfig
{
    fn default() -> Self
    {
        Self { path: "~/fragments/fragments.json".to_string() }
    }
}

impl Default for ProbeConfig
{
    fn default() -> Self
    {
        Self {
            enabled: true,
            python: "python3".to_string(),
            timeout_ms: 10_000,
            poll_interval_ms: 20,
        }
    }
}

impl StoreConfig
{
    /// Store path with `~` and environment variables expanded
    pub fn resolved_path(&self) -> Result<PathBuf>
    {
        let expanded = shellexpand::full(&self.path)
            .with_context(|| format!("Failed to expand store path {}", self.path))?;

        Ok(PathBuf::from(expanded.as_ref()))
    }
}

impl ProbeConfig
{
    pub fn timeout(&self) -> Duration
    {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration
    {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

/// Load configuration from the first config file found in `dir`,
/// then overlay `FRAGFORGE_*` environment variables
/// (`FRAGFORGE_PROBE__TIMEOUT_MS=500`).
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_names = ["fragforge.toml", "fragforge.yaml", "fragforge.json", ".fragforge.toml"];

    for name in &config_names
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    // Add environment variables with FRAGFORGE_ prefix
    builder = builder.add_source(
        config::Environment::with_prefix("FRAGFORGE")
            .prefix_separator("_")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("fragforge.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        println!("{toml_string}");
        return Ok(());
    }

    crate::infra::io::write_text(&config_path, &toml_string)?;

    ctx.success(&format!("Created config file at {}", config_path.display()));
    Ok(())
}
