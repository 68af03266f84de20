//! CLI command implementations for the guardrail console.
//!
//! Provides subcommand handlers for:
//! - `guardrail scan "prompt"` — raw vs redacted output, then refreshed KPIs
//! - `guardrail chat "message"` — one chat exchange
//! - `guardrail dashboard` — KPI cards and the recent incident table
//! - `guardrail wake` — poll a sleeping backend until it answers
//! - `guardrail health` — config status plus a single probe
//! - `guardrail config show|init` — configuration management

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use colored::Colorize;

use guardrail_console::config::{self, BackendTarget, GuardrailConfig};
use guardrail_console::error::{ConfigError, ScanError};
use guardrail_console::model::{IncidentRecord, Metrics, render_redactions};
use guardrail_console::transport::Request;
use guardrail_console::wake::WakeOutcome;
use guardrail_console::{Console, DashboardSnapshot};

/// Output format for the dashboard command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

/// Build a console, or print the configuration warning and return `None`.
///
/// Warnings go to stderr so `--format json` output stays parseable.
fn connect(cfg: &GuardrailConfig) -> Result<Option<Console>> {
    match Console::from_config(cfg) {
        Ok(console) => Ok(Some(console)),
        Err(ConfigError::Unconfigured) => {
            print_unconfigured();
            Ok(None)
        }
        Err(err) => Err(err).context("invalid backend configuration"),
    }
}

fn print_unconfigured() {
    eprintln!(
        "{} {}",
        "⚠".yellow().bold(),
        "No backend configured; network features are disabled.".yellow()
    );
    eprintln!(
        "  {}",
        "Set GUARDRAIL_BASE_URL or [backend] base_url in ~/.guardrail/config.toml.".dimmed()
    );
}

/// How long to let a background refresh finish before the process exits.
/// The incident half may need two sequential requests.
fn refresh_grace(cfg: &GuardrailConfig) -> Duration {
    cfg.timeouts.request() * 2 + Duration::from_secs(1)
}

// ---------------------------------------------------------------------------
// guardrail scan
// ---------------------------------------------------------------------------

pub fn run_scan(cfg: &GuardrailConfig, prompt: &str) -> Result<()> {
    let Some(console) = connect(cfg)? else {
        return Ok(());
    };

    println!("{}", "scanning...".dimmed());
    let result = match console.scanner().scan(prompt) {
        Ok(result) => result,
        Err(ScanError::Validation) => anyhow::bail!("prompt is empty"),
        Err(err) => return Err(err.into()),
    };

    println!("{}", "Scan Result".bold().cyan());
    println!("{}", "=".repeat(60));
    println!("  {}", "Raw output".bold());
    println!("    {}", result.raw_output);
    println!("  {}", "Redacted output".bold());
    println!("    {}", result.redacted_output.green());
    println!();
    println!("  {} {}", "Flagged:   ".bold(), flag_label(result.flagged));
    println!(
        "  {} {}",
        "Redactions:".bold(),
        render_redactions(&result.redactions)
    );
    if !result.incidents.is_empty() {
        println!();
        print_incident_table(&result.incidents);
    }

    let dashboard = console.dashboard();
    if !dashboard.wait_idle(refresh_grace(cfg)) {
        log::warn!("dashboard refresh still running at exit");
    }
    println!();
    print_kpis(&dashboard.metrics_or_zero());

    Ok(())
}

// ---------------------------------------------------------------------------
// guardrail chat
// ---------------------------------------------------------------------------

pub fn run_chat(cfg: &GuardrailConfig, user: Option<&str>, message: &str) -> Result<()> {
    let Some(console) = connect(cfg)? else {
        return Ok(());
    };

    let chat = console.chat();
    let user = user.unwrap_or(chat.user());
    let result = match chat.send_as(user, message) {
        Ok(result) => result,
        Err(ScanError::Validation) => anyhow::bail!("message is empty"),
        Err(err) => return Err(err.into()),
    };

    println!("{} {}", format!("{user}:").bold(), message.trim());
    println!("{} {}", "guardrail:".bold().cyan(), result.answer);
    println!(
        "  {} {}  {} {}",
        "flagged".dimmed(),
        flag_label(result.flagged),
        "redactions".dimmed(),
        render_redactions(&result.redactions)
    );

    // Only does anything when chat refreshes are enabled.
    console.dashboard().wait_idle(refresh_grace(cfg));

    Ok(())
}

// ---------------------------------------------------------------------------
// guardrail dashboard
// ---------------------------------------------------------------------------

pub fn run_dashboard(cfg: &GuardrailConfig, format: OutputFormat) -> Result<()> {
    let Some(console) = connect(cfg)? else {
        return Ok(());
    };

    let dashboard = console.dashboard();
    let failure = dashboard.load().err();
    if let Some(err) = &failure {
        eprintln!("{} {}", "⚠".yellow().bold(), format!("dashboard unavailable: {err}").yellow());
    }

    match format {
        OutputFormat::Json => write_dashboard_json(
            &mut std::io::stdout().lock(),
            dashboard.current(),
            failure.map(|e| e.to_string()),
        )?,
        OutputFormat::Table => match dashboard.current() {
            Some(snapshot) => print_dashboard_table(&snapshot),
            None => print_kpis(&Metrics::default()),
        },
    }

    Ok(())
}

fn print_dashboard_table(snapshot: &DashboardSnapshot) {
    print_kpis(&snapshot.metrics);
    println!();
    if snapshot.incidents.is_empty() {
        println!("{}", "No incidents recorded yet.".dimmed());
    } else {
        print_incident_table(&snapshot.incidents);
    }
}

fn write_dashboard_json(
    out: &mut impl Write,
    snapshot: Option<DashboardSnapshot>,
    error: Option<String>,
) -> Result<()> {
    let value = match snapshot {
        Some(s) => serde_json::json!({
            "metrics": s.metrics,
            "incidents": s.incidents,
            "error": error,
        }),
        None => serde_json::json!({
            "metrics": Metrics::default(),
            "incidents": [],
            "error": error,
        }),
    };
    writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    Ok(())
}

fn print_kpis(metrics: &Metrics) {
    println!("{}", "Guardrail Metrics".bold().cyan());
    println!("{}", "=".repeat(60));
    println!(
        "  {} {:<10} {} {:<10} {} {}",
        "Requests".bold(),
        metrics.total_requests,
        "Flagged".bold(),
        metrics.flagged_count,
        "Flag rate".bold(),
        metrics.flag_rate_percent()
    );
}

fn print_incident_table(incidents: &[IncidentRecord]) {
    println!("{}", "Recent Incidents".bold().cyan());
    println!(
        "  {:>6} {:<20} {:<14} {:<8} Redactions",
        "ID", "Time (UTC)", "Provider", "Flagged"
    );
    println!("  {}", "-".repeat(64));

    for (i, incident) in incidents.iter().enumerate() {
        let line = format!(
            "  {:>6} {:<20} {:<14} {:<8} {}",
            incident.id,
            incident.timestamp.format("%Y-%m-%d %H:%M:%S"),
            truncate(&incident.provider, 14),
            if incident.flagged { "yes" } else { "no" },
            render_redactions(&incident.redactions),
        );
        if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
}

// ---------------------------------------------------------------------------
// guardrail wake
// ---------------------------------------------------------------------------

pub fn run_wake(cfg: &GuardrailConfig) -> Result<()> {
    let Some(console) = connect(cfg)? else {
        return Ok(());
    };

    print!("{} {} ", "Waking".bold(), console.base_url());
    std::io::stdout().flush().ok();

    let wake = console.wake();
    let report = wake.start_observed(&|_, _| {
        print!("{}", ".".dimmed());
        std::io::stdout().flush().ok();
    });
    println!();

    match report.outcome {
        WakeOutcome::Succeeded => println!(
            "{} backend awake after {} probe(s) ({:.1}s)",
            "✓".green().bold(),
            report.probes,
            report.elapsed.as_secs_f64()
        ),
        WakeOutcome::TimedOut => println!(
            "{} backend did not answer within {}s",
            "✗".red().bold(),
            wake.policy().deadline.as_secs()
        ),
        WakeOutcome::AlreadyPolling => println!("{}", "a wake is already in progress".yellow()),
    }

    let dashboard = console.dashboard();
    dashboard.wait_idle(refresh_grace(cfg));
    println!();
    match dashboard.current() {
        Some(snapshot) => print_dashboard_table(&snapshot),
        None => print_kpis(&Metrics::default()),
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// guardrail health
// ---------------------------------------------------------------------------

/// Check config files, the backend URL, and one probe of `GET /`.
pub fn run_health(cfg: &GuardrailConfig) -> Result<()> {
    println!("{}", "Guardrail Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.guardrail/config.toml found"
        } else {
            "not found (run `guardrail config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".guardrail.toml found"
        } else {
            "none (optional)"
        },
    );

    let base = match cfg.backend_target() {
        Ok(BackendTarget::Configured(base)) => {
            print_health_item("Backend URL", true, base.as_str());
            base
        }
        Ok(BackendTarget::Unconfigured) => {
            print_health_item("Backend URL", false, "not configured");
            println!();
            print_unconfigured();
            return Ok(());
        }
        Err(err) => {
            print_health_item("Backend URL", false, &err.to_string());
            return Ok(());
        }
    };

    let Some(console) = connect(cfg)? else {
        return Ok(());
    };
    let probe = Request::get(base.join("/")).with_timeout(cfg.timeouts.probe());
    let started = Instant::now();
    match console.transport().request(&probe) {
        Ok(resp) => print_health_item(
            "Backend",
            true,
            &format!(
                "HTTP {} in {}ms",
                resp.status,
                started.elapsed().as_millis()
            ),
        ),
        Err(err) => print_health_item(
            "Backend",
            false,
            &format!("{err} (try `guardrail wake`)"),
        ),
    }

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<16} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// guardrail config show | init
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective Guardrail Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source(global_exists, "~/.guardrail/config.toml");
    print_source(project_exists, ".guardrail.toml");
    println!(
        "  {} {}",
        "·".dimmed(),
        "GUARDRAIL_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(found: bool, label: &str) {
    if found {
        println!("  {} {}", "✓".green(), label.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{label} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.guardrail/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!(
        "  {}",
        "Set [backend] base_url to point the console at your backend.".dimmed()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn flag_label(flagged: bool) -> colored::ColoredString {
    if flagged {
        "FLAGGED".red().bold()
    } else {
        "clean".green()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
