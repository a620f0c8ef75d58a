//! Configuration system for trainkit.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace config -> environment -> explicit overrides. The workspace file
//! lives at `.trainkit/config.toml`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::grid::GridOptions;
use crate::run::RunSettings;
use crate::snapshot::SnapshotRules;

/// Top-level settings for a training run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainkitConfig {
    /// Run and dataset directories.
    #[serde(default)]
    pub run: RunSettings,
    /// Layout of saved sample grids.
    #[serde(default)]
    pub grid: GridOptions,
    /// What the source snapshot copies.
    #[serde(default)]
    pub snapshot: SnapshotRules,
    /// Accelerators to shard each batch across (0 = host only).
    #[serde(default)]
    pub accelerators: usize,
}

impl TrainkitConfig {
    /// Reject settings that would only fail later, mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.grid.columns == 0 || self.grid.padding == 0 {
            return Err(Error::invalid_value(format!(
                "grid columns and padding must be positive (columns={}, padding={})",
                self.grid.columns, self.grid.padding
            )));
        }
        if self.run.dataset.is_empty() {
            return Err(Error::invalid_value("run.dataset must not be empty"));
        }
        if self.snapshot.extensions.iter().any(|e| e.starts_with('.')) {
            return Err(Error::invalid_value(
                "snapshot extensions are given without the leading '.'",
            ));
        }
        Ok(())
    }
}

/// Load and validate configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `TRAINKIT_`, `__` for nesting)
/// 3. Workspace-local config (`.trainkit/config.toml`)
/// 4. User config (`<config dir>/trainkit/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&TrainkitConfig>,
) -> Result<TrainkitConfig> {
    let mut figment = Figment::from(Serialized::defaults(TrainkitConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "trainkit", "trainkit") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".trainkit").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // TRAINKIT_RUN__DATASET, TRAINKIT_GRID__COLUMNS, TRAINKIT_ACCELERATORS, ...
    figment = figment.merge(Env::prefixed("TRAINKIT_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: TrainkitConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    tracing::debug!(
        dataset = %config.run.dataset,
        accelerators = config.accelerators,
        "Loaded trainkit config"
    );
    Ok(config)
}
