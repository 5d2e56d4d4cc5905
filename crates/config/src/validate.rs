//! Configuration validation.
//!
//! Checks TOML syntax, flags unknown or misspelled fields, and reports
//! semantic problems (cache bounds that can never evict, an alert with
//! nothing to say).

use std::path::{Path, PathBuf};

use crate::schema::RevwatchConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "semantic", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "cache.evict_batch"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Known keys ──────────────────────────────────────────────────────────────

/// Known fields per section. Sections absent here are unknown at top level.
const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    ("logging", &[
        "strategy",
        "dir",
        "history_file",
        "revocations_file",
    ]),
    ("alert", &["enabled", "text"]),
    ("cache", &["high_water", "evict_batch"]),
    ("client", &["chat_name_timeout_ms"]),
    ("shutdown", &["timeout_secs"]),
    ("whatsapp", &[
        "sidecar_dir",
        "port",
        "auth_dir",
        "browser_path",
        "headless",
        "auto_start",
        "request_timeout_ms",
    ]),
];

/// Edit distance between two strings, used for "did you mean" hints.
fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diag
            } else {
                1 + diag.min(above).min(row[j])
            };
            diag = above;
        }
    }
    row[b_chars.len()]
}

fn closest<'a>(needle: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, edit_distance(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

fn unknown_field(path: String, key: &str, candidates: &[&str]) -> Diagnostic {
    let message = match closest(key, candidates) {
        Some(hint) => format!("unknown field (did you mean \"{hint}\"?)"),
        None => "unknown field".to_string(),
    };
    Diagnostic::new(Severity::Error, "unknown-field", path, message)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at `path`, or the discovered config file when
/// `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(None),
    };

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let is_toml = actual_path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");

    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) if is_toml => validate_toml_str(&crate::env_subst::substitute_env(&content)),
        Ok(_) => match crate::loader::load_config(&actual_path) {
            Ok(config) => ValidationResult {
                diagnostics: semantic_checks(&config),
                config_path: None,
            },
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic::new(
                    Severity::Error,
                    "type-error",
                    "",
                    format!("failed to parse config: {e}"),
                )],
                config_path: None,
            },
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML string without touching the filesystem.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("TOML syntax error: {e}"),
            ));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    if let Some(table) = value.as_table() {
        check_unknown_fields(table, &mut diagnostics);
    }

    match toml::from_str::<RevwatchConfig>(toml_str) {
        Ok(config) => diagnostics.extend(semantic_checks(&config)),
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(table: &toml::Table, diagnostics: &mut Vec<Diagnostic>) {
    let sections: Vec<&str> = KNOWN_SECTIONS.iter().map(|(name, _)| *name).collect();

    for (key, value) in table {
        let Some((_, fields)) = KNOWN_SECTIONS.iter().find(|(name, _)| *name == key.as_str()) else {
            diagnostics.push(unknown_field(key.clone(), key, &sections));
            continue;
        };
        let Some(inner) = value.as_table() else {
            continue;
        };
        for field in inner.keys() {
            if !fields.contains(&field.as_str()) {
                diagnostics.push(unknown_field(format!("{key}.{field}"), field, fields));
            }
        }
    }
}

/// Checks on a successfully parsed config.
#[must_use]
pub fn semantic_checks(config: &RevwatchConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    if config.cache.evict_batch == 0 {
        out.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "cache.evict_batch",
            "evict_batch must be at least 1 or the cache grows without bound",
        ));
    } else if config.cache.evict_batch > config.cache.high_water {
        out.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "cache.evict_batch",
            format!(
                "evict_batch ({}) is larger than high_water ({})",
                config.cache.evict_batch, config.cache.high_water
            ),
        ));
    }

    if config.alert.enabled && config.alert.text.trim().is_empty() {
        out.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "alert.text",
            "alert is enabled but the text is empty",
        ));
    }

    if !config.alert.enabled && config.alert.text != crate::schema::DEFAULT_ALERT_TEXT {
        out.push(Diagnostic::new(
            Severity::Info,
            "semantic",
            "alert.text",
            "custom alert text is set but alerts are disabled",
        ));
    }

    if config.shutdown.timeout_secs == 0 {
        out.push(Diagnostic::new(
            Severity::Warning,
            "semantic",
            "shutdown.timeout_secs",
            "a zero shutdown timeout abandons the client and pending journal writes",
        ));
    }

    if config.logging.history_file == config.logging.revocations_file {
        out.push(Diagnostic::new(
            Severity::Error,
            "semantic",
            "logging.revocations_file",
            "history and revocation streams must use different files",
        ));
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn has(result: &ValidationResult, path: &str, severity: Severity) -> bool {
        result
            .diagnostics
            .iter()
            .any(|d| d.path == path && d.severity == severity)
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("cache", "cache"), 0);
        assert_eq!(edit_distance("cahce", "cache"), 2);
        assert_eq!(edit_distance("aler", "alert"), 1);
    }

    #[test]
    fn empty_config_is_valid() {
        let result = validate_toml_str("");
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn full_valid_config_no_diagnostics() {
        let toml = r#"
            [logging]
            strategy = "all"
            dir = "/var/log/revwatch"

            [alert]
            enabled = true
            text = "seen it"

            [cache]
            high_water = 100
            evict_batch = 10

            [client]
            chat_name_timeout_ms = 2000

            [shutdown]
            timeout_secs = 5

            [whatsapp]
            port = 3100
            headless = false
        "#;
        let result = validate_toml_str(toml);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn unknown_section_with_suggestion() {
        let result = validate_toml_str("[aletr]\nenabled = true\n");
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.path == "aletr")
            .unwrap();
        assert_eq!(diag.category, "unknown-field");
        assert!(diag.message.contains("alert"));
    }

    #[test]
    fn unknown_nested_field_with_suggestion() {
        let result = validate_toml_str("[cache]\nhigh_watr = 10\n");
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.path == "cache.high_watr")
            .unwrap();
        assert!(diag.message.contains("high_water"));
    }

    #[test]
    fn syntax_error_detected() {
        let result = validate_toml_str("[logging\nstrategy = ");
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn bad_strategy_is_type_error() {
        let result = validate_toml_str("[logging]\nstrategy = \"sometimes\"\n");
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.category == "type-error")
        );
    }

    #[test]
    fn evict_batch_bounds_checked() {
        let zero = validate_toml_str("[cache]\nevict_batch = 0\n");
        assert!(has(&zero, "cache.evict_batch", Severity::Error));

        let too_big = validate_toml_str("[cache]\nhigh_water = 10\nevict_batch = 20\n");
        assert!(has(&too_big, "cache.evict_batch", Severity::Error));
    }

    #[test]
    fn enabled_alert_needs_text() {
        let result = validate_toml_str("[alert]\nenabled = true\ntext = \"  \"\n");
        assert!(has(&result, "alert.text", Severity::Error));
    }

    #[test]
    fn disabled_alert_with_custom_text_is_info() {
        let result = validate_toml_str("[alert]\ntext = \"gotcha\"\n");
        assert!(has(&result, "alert.text", Severity::Info));
        assert!(!result.has_errors());
    }

    #[test]
    fn zero_shutdown_timeout_warned() {
        let result = validate_toml_str("[shutdown]\ntimeout_secs = 0\n");
        assert!(has(&result, "shutdown.timeout_secs", Severity::Warning));
    }

    #[test]
    fn shared_stream_file_is_error() {
        let result = validate_toml_str(
            "[logging]\nhistory_file = \"all.jsonl\"\nrevocations_file = \"all.jsonl\"\n",
        );
        assert!(has(&result, "logging.revocations_file", Severity::Error));
    }

    #[test]
    fn validate_reads_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revwatch.toml");
        std::fs::write(&path, "[cache]\nevict_batch = 0\n").unwrap();
        let result = validate(Some(&path));
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
        assert!(result.has_errors());
    }

    #[test]
    fn validate_missing_file_reports_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate(Some(&dir.path().join("nope.toml")));
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "syntax");
    }
}
