use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// e.g., "info" | "debug"
    pub log_level: Option<String>,
    /// stream endpoint, e.g. "http://load-cell.local/load.bin"
    pub device_url: Option<String>,
    /// redraw ceiling, frames per second
    pub fps: Option<u32>,
    /// raw samples retained for the trace
    pub ring_capacity: Option<usize>,
    pub display: Option<DisplayConfig>,
    pub view: Option<ViewConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Display-unit range mapped onto the trace area.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ViewConfig {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// CLI overrides main passes in. All fields are Options so we can layer
/// them over YAML.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub device_url: Option<String>,
    pub fps: Option<u32>,
    pub ring_capacity: Option<usize>,
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
}

/// Public entry point: read YAML, merge, apply overrides, validate.
pub fn load(explicit_path: Option<&Path>, overrides: &Overrides) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = explicit_path {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_overrides(&mut cfg, overrides);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Effective YAML for `--dump-config`.
pub fn dump(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/cellscope/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/cellscope/config.yaml");
        if p.exists() {
            return Some(p);
        }
        let p = home.join(".config/cellscope.yaml");
        if p.exists() {
            return Some(p);
        }
    }
    // project local
    for candidate in &["cellscope.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()     { dst.log_level = src.log_level; }
    if src.device_url.is_some()    { dst.device_url = src.device_url; }
    if src.fps.is_some()           { dst.fps = src.fps; }
    if src.ring_capacity.is_some() { dst.ring_capacity = src.ring_capacity; }
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => {
            if s.width.is_some()  { d.width = s.width; }
            if s.height.is_some() { d.height = s.height; }
        }
        _ => {}
    }
    match (&mut dst.view, src.view) {
        (None, Some(c)) => dst.view = Some(c),
        (Some(d), Some(s)) => {
            if s.min.is_some() { d.min = s.min; }
            if s.max.is_some() { d.max = s.max; }
        }
        _ => {}
    }
}

fn apply_overrides(cfg: &mut Config, ov: &Overrides) {
    if ov.device_url.is_some()    { cfg.device_url = ov.device_url.clone(); }
    if ov.fps.is_some()           { cfg.fps = ov.fps; }
    if ov.ring_capacity.is_some() { cfg.ring_capacity = ov.ring_capacity; }

    let any_display = ov.display_width.is_some() || ov.display_height.is_some();
    if any_display && cfg.display.is_none() {
        cfg.display = Some(DisplayConfig::default());
    }
    if let Some(display) = cfg.display.as_mut() {
        if ov.display_width.is_some()  { display.width = ov.display_width; }
        if ov.display_height.is_some() { display.height = ov.display_height; }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(url) = cfg.device_url.as_ref() {
        if url.trim().is_empty() {
            return Err(ConfigError::Validation("device_url must not be empty".into()));
        }
    }
    if let Some(fps) = cfg.fps {
        if fps == 0 || fps > 240 {
            return Err(ConfigError::Validation("fps must be in 1..=240".into()));
        }
    }
    if let Some(cap) = cfg.ring_capacity {
        if cap == 0 {
            return Err(ConfigError::Validation("ring_capacity must be > 0".into()));
        }
    }
    if let Some(display) = cfg.display.as_ref() {
        if let (Some(w), Some(h)) = (display.width, display.height) {
            if w == 0 || h == 0 {
                return Err(ConfigError::Validation("display width/height must be > 0".into()));
            }
        }
    }
    if let Some(view) = cfg.view.as_ref() {
        if let (Some(lo), Some(hi)) = (view.min, view.max) {
            if !(lo < hi) {
                return Err(ConfigError::Validation("view min must be < view max".into()));
            }
        }
    }
    Ok(())
}
