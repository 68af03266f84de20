/// Integration tests for layered configuration.
///
/// # Safety
///
/// These tests use `std::env::set_var` / `remove_var`, which are `unsafe` in
/// the 2024 edition. Everything that touches the environment lives in one
/// `#[test]` so nothing else in this binary reads the variables concurrently.
use guardrail_console::config::{self, BackendTarget};
use guardrail_console::{ConfigError, Console};

/// Helper: set an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn set_env(key: &str, val: &str) {
    unsafe { std::env::set_var(key, val) }
}

/// Helper: remove an env var (wraps the `unsafe` call).
///
/// # Safety
/// Must only be called from single-threaded test contexts.
unsafe fn remove_env(key: &str) {
    unsafe { std::env::remove_var(key) }
}

#[test]
fn environment_overrides_and_backend_target() {
    // --- base URL from the environment ---
    unsafe { set_env("GUARDRAIL_BASE_URL", "https://guard.example.com/") };
    unsafe { set_env("GUARDRAIL_WAKE_DEADLINE_MS", "5000") };
    unsafe { set_env("GUARDRAIL_INCIDENT_LIMIT", "3") };
    let cfg = config::load();
    match cfg.backend_target() {
        Ok(BackendTarget::Configured(base)) => {
            assert_eq!(base.as_str(), "https://guard.example.com")
        }
        other => panic!("expected configured backend, got {other:?}"),
    }
    assert_eq!(cfg.wake.deadline_ms, 5_000);
    assert_eq!(cfg.dashboard.incident_limit, 3);

    let console = Console::from_config(&cfg).unwrap();
    assert_eq!(console.dashboard().incident_limit(), 3);

    // --- empty value clears any file-provided URL ---
    unsafe { set_env("GUARDRAIL_BASE_URL", "") };
    let cfg = config::load();
    assert_eq!(cfg.backend_target(), Ok(BackendTarget::Unconfigured));
    assert!(matches!(
        Console::from_config(&cfg),
        Err(ConfigError::Unconfigured)
    ));

    // --- a URL without a scheme is rejected, not guessed ---
    unsafe { set_env("GUARDRAIL_BASE_URL", "guard.example.com") };
    let cfg = config::load();
    assert_eq!(
        cfg.backend_target(),
        Err(ConfigError::InvalidBaseUrl("guard.example.com".to_string()))
    );

    // --- garbage numbers leave the previous layer in place ---
    let from_files =
        config::load_files(&[config::global_config_file(), config::project_config_file()]);
    unsafe { set_env("GUARDRAIL_SCAN_TIMEOUT_MS", "90000") };
    assert_eq!(config::load().timeouts.scan_ms, 90_000);
    unsafe { set_env("GUARDRAIL_SCAN_TIMEOUT_MS", "a while") };
    let cfg = config::load();
    assert_eq!(cfg.timeouts.scan_ms, from_files.timeouts.scan_ms);

    unsafe { remove_env("GUARDRAIL_BASE_URL") };
    unsafe { remove_env("GUARDRAIL_WAKE_DEADLINE_MS") };
    unsafe { remove_env("GUARDRAIL_INCIDENT_LIMIT") };
    unsafe { remove_env("GUARDRAIL_SCAN_TIMEOUT_MS") };
}

#[test]
fn default_toml_is_a_valid_layer() {
    let layer: config::ConfigLayer =
        toml::from_str(&config::GuardrailConfig::default_toml()).unwrap();
    let mut cfg = config::GuardrailConfig::default();
    layer.apply_to(&mut cfg);
    assert_eq!(cfg, config::GuardrailConfig::default());
}
