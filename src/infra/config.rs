use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

/// Request defaults, overridable per request or per invocation.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Snapshot originals to `<path>.bak` before editing
    #[serde(default = "default_backup")]
    pub backup: bool,

    /// Materialize final file content in reports
    #[serde(default)]
    pub include_content: bool,

    /// Context lines around each hunk in dry-run previews
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,

    /// Emit structured JSON reports instead of human output
    #[serde(default)]
    pub json: bool,
}

fn default_backup() -> bool {
    true
}

fn default_context_lines() -> usize {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup: true,
            include_content: false,
            context_lines: 3,
            json: false,
        }
    }
}

pub fn load_config() -> Result<Config> {
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_paths = ["patchup.toml", ".patchup.toml"];

    for path in &config_paths {
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    // Add environment variables with PATCHUP_ prefix
    builder = builder.add_source(config::Environment::with_prefix("PATCHUP"));

    let cfg = builder.build().context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

pub fn init(args: InitArgs, ctx: &AppContext) -> Result<()> {
    let config_path = &args.path;

    if config_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::write(config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
