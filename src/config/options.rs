//! Effective options for one invocation.
//!
//! Precedence: explicit arguments, then the selected preset from `configs`,
//! then the global settings.

use super::{Settings, normalize_storage_location};
use crate::errors::{AppError, Result};

/// Config name recorded when the invocation is not a pure replay of a preset.
pub const NO_CONFIG: &str = "none";

/// Options supplied directly by the caller. `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct OptionArgs {
    pub config: Option<String>,
    pub dump_key: Option<String>,
    pub instance: Option<String>,
    pub database: Option<String>,
    pub storage_location: Option<String>,
    pub reversible: Option<bool>,
    pub exclude: Option<Vec<String>>,
    pub pre_dump_hooks: Option<Vec<String>>,
    pub pre_swap_hooks: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveOptions {
    pub config: String,
    pub dump_key: Option<String>,
    pub instance: String,
    pub database: String,
    pub storage_location: String,
    pub reversible: bool,
    pub exclude: Vec<String>,
    pub pre_dump_hooks: Vec<String>,
    pub pre_swap_hooks: Vec<String>,
}

pub fn resolve(settings: &Settings, args: OptionArgs) -> Result<EffectiveOptions> {
    let preset = match &args.config {
        Some(name) => Some(settings.configs.get(name).ok_or_else(|| {
            AppError::Configuration(format!(
                "\"{}\" is not a valid configuration in \"configs\" of the settings file.",
                name
            ))
        })?),
        None => None,
    };

    // Exclusions and hooks change what gets dumped or restored, so an
    // invocation that overrides them no longer replays the preset.
    let overridden =
        args.exclude.is_some() || args.pre_dump_hooks.is_some() || args.pre_swap_hooks.is_some();
    let config = match &args.config {
        Some(name) if !overridden => name.clone(),
        _ => NO_CONFIG.to_string(),
    };

    let from_preset = |pick: fn(&super::PresetConfig) -> Option<String>| preset.and_then(pick);
    let lists_from_preset =
        |pick: fn(&super::PresetConfig) -> Option<Vec<String>>| preset.and_then(pick);

    let storage_location = args
        .storage_location
        .or_else(|| from_preset(|p| p.storage_location.clone()))
        .map(|location| normalize_storage_location(&location))
        .unwrap_or_else(|| settings.storage_location.clone());

    Ok(EffectiveOptions {
        config,
        dump_key: args.dump_key.or_else(|| from_preset(|p| p.dump_key.clone())),
        instance: args
            .instance
            .or_else(|| from_preset(|p| p.instance.clone()))
            .unwrap_or_else(|| settings.instance.clone()),
        database: args
            .database
            .or_else(|| from_preset(|p| p.database.clone()))
            .unwrap_or_else(|| settings.database.clone()),
        storage_location,
        reversible: args
            .reversible
            .or_else(|| preset.and_then(|p| p.reversible))
            .unwrap_or(settings.reversible),
        exclude: args
            .exclude
            .or_else(|| lists_from_preset(|p| p.exclude.clone()))
            .unwrap_or_else(|| settings.exclude.clone()),
        pre_dump_hooks: args
            .pre_dump_hooks
            .or_else(|| lists_from_preset(|p| p.pre_dump_hooks.clone()))
            .unwrap_or_else(|| settings.pre_dump_hooks.clone()),
        pre_swap_hooks: args
            .pre_swap_hooks
            .or_else(|| lists_from_preset(|p| p.pre_swap_hooks.clone()))
            .unwrap_or_else(|| settings.pre_swap_hooks.clone()),
    })
}
