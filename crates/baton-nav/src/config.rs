//! Navigator configuration
//!
//! Loaded from `<dir>/.baton/config.toml`:
//!
//! ```toml
//! [router]
//! pops_last_view = false
//!
//! [animation]
//! duration_ms = 300
//! easing = "ease_in_out"
//! effect = "fade"
//! removes_from_view_on_push = true
//! ```

use std::path::Path;

use baton_core::prelude::*;
use serde::{Deserialize, Serialize};

use crate::transition::{Easing, Effect};

pub const BATON_DIR: &str = ".baton";
pub const CONFIG_FILENAME: &str = "config.toml";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub router: RouterSettings,
    pub animation: AnimationSettings,
}

/// Defaults applied to newly created routers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Animate the last node out when it is popped
    pub pops_last_view: bool,
}

/// Defaults for [`AnimatedHandler::from_settings`](crate::transition::AnimatedHandler::from_settings)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    pub duration_ms: u64,
    pub easing: Easing,
    pub effect: Effect,
    pub removes_from_view_on_push: bool,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            duration_ms: 300,
            easing: Easing::EaseInOut,
            effect: Effect::Fade,
            removes_from_view_on_push: true,
        }
    }
}

/// Load configuration from `<dir>/.baton/config.toml`
///
/// Returns defaults if the file doesn't exist or can't be parsed.
pub fn load_config(dir: &Path) -> NavigatorConfig {
    let config_path = dir.join(BATON_DIR).join(CONFIG_FILENAME);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return NavigatorConfig::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                debug!("Loaded config from {:?}", config_path);
                config
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                NavigatorConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            NavigatorConfig::default()
        }
    }
}

/// Create `<dir>/.baton/config.toml` with defaults unless it already exists
///
/// Returns whether a file was written.
pub fn init_config(dir: &Path) -> Result<bool> {
    let config_path = dir.join(BATON_DIR).join(CONFIG_FILENAME);
    if config_path.exists() {
        debug!("Keeping existing config at {:?}", config_path);
        return Ok(false);
    }
    save_config(dir, &NavigatorConfig::default())?;
    Ok(true)
}

/// Write configuration to `<dir>/.baton/config.toml`
pub fn save_config(dir: &Path, config: &NavigatorConfig) -> Result<()> {
    let baton_dir = dir.join(BATON_DIR);

    if !baton_dir.exists() {
        std::fs::create_dir_all(&baton_dir)
            .map_err(|e| Error::config(format!("Failed to create .baton dir: {}", e)))?;
    }

    let config_path = baton_dir.join(CONFIG_FILENAME);
    let temp_path = baton_dir.join(".config.toml.tmp");

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;
    let full_content = format!("# baton navigator configuration\n\n{}", content);

    // Atomic write: write to temp, then rename
    std::fs::write(&temp_path, &full_content)
        .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;

    std::fs::rename(&temp_path, &config_path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    debug!("Saved config to {:?}", config_path);
    Ok(())
}
