use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use revwatch_config::{
    RevwatchConfig, Severity, ValidationResult, find_config_file, render_toml,
    validate::{self, semantic_checks},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (file, env, and flags merged) as TOML.
    Show,
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print which config file would be loaded.
    Path,
}

pub fn handle_config(
    action: &ConfigAction,
    config_dir: Option<&Path>,
    effective: &RevwatchConfig,
) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", render_toml(effective)?);
            Ok(())
        },
        ConfigAction::Check { verbose } => check(config_dir, effective, *verbose),
        ConfigAction::Path => {
            match find_config_file(config_dir) {
                Some(path) => println!("{}", path.display()),
                None => {
                    eprintln!("No config file found; defaults are in use.");
                    if let Some(dir) = revwatch_config::config_dir() {
                        eprintln!("Create one at {}", dir.join("revwatch.toml").display());
                    }
                },
            }
            Ok(())
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config_dir: Option<&Path>, effective: &RevwatchConfig, verbose: bool) -> Result<()> {
    let mut result = match find_config_file(config_dir) {
        Some(path) => validate::validate(Some(&path)),
        None => validate::validate(None),
    };
    merge_override_checks(&mut result, effective);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Env and flag overrides can break a config that is valid on disk, so the
/// effective config is checked too. Duplicates of file diagnostics are
/// skipped.
fn merge_override_checks(result: &mut ValidationResult, effective: &RevwatchConfig) {
    for diagnostic in semantic_checks(effective) {
        let duplicate = result
            .diagnostics
            .iter()
            .any(|d| d.path == diagnostic.path && d.message == diagnostic.message);
        if !duplicate {
            result.diagnostics.push(diagnostic);
        }
    }
}
