use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cli::{AppContext, InitArgs};
use crate::core::lookup::ConflictPolicy;

/// Candidate config file names, checked in priority order
/// `declmap.json` is left out because `resolve` writes its output there.
const CONFIG_FILES: [&str; 3] = ["declmap.toml", "declmap.yaml", ".declmap.toml"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Attribute name carried by edges synthesized from dataflow observations
    pub dataflow_attribute: String,

    /// Co-change pruning settings
    pub cochange: CochangeConfig,

    /// Structural lookup settings
    pub lookup: LookupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CochangeConfig
{
    pub attribute: String,
    pub threshold: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig
{
    pub conflict_policy: ConflictPolicy,
}

impl Default for CochangeConfig
{
    fn default() -> Self
    {
        Self { attribute: "Cochange".to_string(), threshold: 10.0 }
    }
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            dataflow_attribute: "Dataflow".to_string(),
            cochange: CochangeConfig::default(),
            lookup: LookupConfig::default(),
        }
    }
}

/// Load configuration from the current working directory.
pub fn load_config() -> Result<Config>
{
    load_config_in(Path::new("."))
}

/// Load configuration from the first config file found in `dir`, then
/// overlay `DECLMAP_*` environment variables (`__` separates sections).
pub fn load_config_in(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    for name in &CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            debug!(path = %path.display(), "loading config file");
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("DECLMAP")
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

/// Like [`load_config`], but a broken config file or environment override is
/// reported and the defaults are used instead.
pub fn load_config_or_default() -> Config
{
    load_config_or_default_in(Path::new("."))
}

pub fn load_config_or_default_in(dir: &Path) -> Config
{
    match load_config_in(dir)
    {
        Ok(config) => config,
        Err(err) =>
        {
            warn!("ignoring configuration, using defaults: {err:#}");
            Config::default()
        }
    }
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("declmap.toml");

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
        if !ctx.quiet
        {
            println!("Would write {}:\n{toml_string}", config_path.display());
        }
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
