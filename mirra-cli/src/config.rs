use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use mirra_core::BuildRunConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MirraConfig {
    /// Build configuration, handed to mirra-core as is
    pub build: BuildRunConfig,
    /// Watch mode configuration
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period after the last change before rebuilding
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

impl MirraConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (MIRRA_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args
            .try_get_one::<String>("config")
            .unwrap_or(None)
            .cloned()
            .unwrap_or_else(|| "./mirra.toml".to_string());

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        let defaults = Self::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Add configuration file if it exists
        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::from(Path::new(&config_file)));
        }

        // 3. Add environment variables with MIRRA_ prefix
        builder = builder.add_source(
            Environment::with_prefix("MIRRA")
                .prefix_separator("_")
                .separator("__"), // Use double underscore for nested keys
        );

        // 4. Override with CLI arguments (highest priority)
        let mut cli_overrides = std::collections::HashMap::new();

        for key in ["source", "output", "layouts", "components"] {
            if let Some(value) = args.try_get_one::<String>(key).unwrap_or(None) {
                cli_overrides.insert(format!("build.{key}"), value.clone());
            }
        }
        if args.try_get_one::<bool>("force").unwrap_or(None) == Some(&true) {
            cli_overrides.insert("build.force".to_string(), "true".to_string());
        }
        if let Some(debounce) = args.try_get_one::<u64>("debounce").unwrap_or(None) {
            cli_overrides.insert("watch.debounce_ms".to_string(), debounce.to_string());
        }

        if !cli_overrides.is_empty() {
            builder = builder.add_source(config::Config::try_from(&cli_overrides)?);
        }

        // Build and deserialize
        let config = builder.build()?;
        let mut mirra_config: MirraConfig = config.try_deserialize()?;

        // Shared dirs left at their defaults live inside the chosen source
        let source = mirra_config.build.source.clone();
        mirra_config.build = mirra_config.build.source_dir(source);

        Ok(mirra_config)
    }
}
