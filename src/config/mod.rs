/// Configuration system for the guardrail console.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults** — [`schema::GuardrailConfig::default()`]
/// 2. **User global config** — `~/.guardrail/config.toml`
/// 3. **Project local config** — `.guardrail.toml` in the current directory
/// 4. **Environment variables** — `GUARDRAIL_*` overrides (highest precedence)
///
/// File layers are partial: only keys present in a file override earlier
/// layers. The result is an explicit value handed to [`crate::Console`] at
/// startup; nothing downstream reads the environment.
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::{BackendTarget, ConfigLayer, GuardrailConfig};

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration: defaults → global TOML → project
/// TOML → environment.
pub fn load() -> GuardrailConfig {
    let mut config = load_files(&[global_config_path(), project_config_path()]);
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Apply TOML layers in order. Missing or malformed files are skipped so a
/// broken config never blocks the console.
pub fn load_files(paths: &[Option<PathBuf>]) -> GuardrailConfig {
    let mut config = GuardrailConfig::default();
    for path in paths.iter().flatten() {
        if let Some(layer) = load_layer(path) {
            layer.apply_to(&mut config);
        }
    }
    config
}

fn load_layer(path: &Path) -> Option<ConfigLayer> {
    let content = fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(layer) => Some(layer),
        Err(err) => {
            log::warn!("ignoring malformed config {}: {err}", path.display());
            None
        }
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// `~/.guardrail/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".guardrail").join("config.toml"))
}

/// `.guardrail.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".guardrail.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment overrides (highest precedence layer).
///
/// Supported variables:
/// - `GUARDRAIL_BASE_URL` — backend root URL (empty clears it)
/// - `GUARDRAIL_REQUEST_TIMEOUT_MS` — metrics / incidents / chat timeout
/// - `GUARDRAIL_SCAN_TIMEOUT_MS` — scan timeout
/// - `GUARDRAIL_PROBE_TIMEOUT_MS` — wake probe timeout
/// - `GUARDRAIL_WAKE_DEADLINE_MS` — total wake budget
/// - `GUARDRAIL_INCIDENT_LIMIT` — dashboard incident window
/// - `GUARDRAIL_CHAT_USER` — user label for chat messages
/// - `GUARDRAIL_LOG` — log level
///
/// `lookup` is injected so the merge can be tested without touching the
/// process environment.
pub fn apply_env_overrides(config: &mut GuardrailConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("GUARDRAIL_BASE_URL") {
        let val = val.trim().to_string();
        config.backend.base_url = if val.is_empty() { None } else { Some(val) };
    }
    if let Some(ms) = parse_env(&lookup, "GUARDRAIL_REQUEST_TIMEOUT_MS") {
        config.timeouts.request_ms = ms;
    }
    if let Some(ms) = parse_env(&lookup, "GUARDRAIL_SCAN_TIMEOUT_MS") {
        config.timeouts.scan_ms = ms;
    }
    if let Some(ms) = parse_env(&lookup, "GUARDRAIL_PROBE_TIMEOUT_MS") {
        config.timeouts.probe_ms = ms;
    }
    if let Some(ms) = parse_env(&lookup, "GUARDRAIL_WAKE_DEADLINE_MS") {
        config.wake.deadline_ms = ms;
    }
    if let Some(limit) = parse_env(&lookup, "GUARDRAIL_INCIDENT_LIMIT") {
        config.dashboard.incident_limit = limit;
    }
    if let Some(val) = lookup("GUARDRAIL_CHAT_USER")
        && !val.trim().is_empty()
    {
        config.chat.user = val;
    }
    if let Some(val) = lookup("GUARDRAIL_LOG")
        && !val.is_empty()
    {
        config.logging.level = val;
    }
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {key}={raw:?}: not a number");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Config init / show
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.guardrail/config.toml`.
///
/// Returns an error if the file already exists (use `force = true` to
/// overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;
    write_default_config(&path, force)?;
    Ok(path)
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    fs::write(path, GuardrailConfig::default_toml()).context("failed to write config file")
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
