//! Process management for the Node.js WhatsApp Web sidecar.
//!
//! The sidecar drives a headless Chromium through whatsapp-web.js and
//! exposes the session over a local WebSocket (see [`crate::types`]).

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    anyhow::{Context, Result, bail},
    revwatch_config::WhatsAppConfig,
    tokio::{
        io::{AsyncBufReadExt, BufReader},
        process::{Child, Command},
    },
    tracing::{debug, error, info, warn},
};

use crate::sidecar::DEFAULT_SIDECAR_PORT;

/// Environment variable pointing at the sidecar directory.
pub const SIDECAR_DIR_ENV: &str = "REVWATCH_SIDECAR_DIR";

const SIDECAR_SUBDIR: &str = "sidecar/whatsapp-web";
const ENTRY_POINT: &str = "index.js";

/// Appended to discovery errors: the sidecar is not bundled with the binary.
const SIDECAR_HINT: &str = "install the sidecar there, or run it yourself and set \
                            `whatsapp.auto_start = false`";

/// How long a stopping sidecar gets before it is killed.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Handle to a running sidecar process.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    #[cfg(test)]
    pub(crate) fn from_child(child: Child, port: u16) -> Self {
        Self { child, port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Ask the sidecar to exit (closing its browser), killing it if it does
    /// not within a few seconds.
    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping WhatsApp sidecar process");

        #[cfg(unix)]
        {
            use nix::{
                sys::signal::{Signal, kill},
                unistd::Pid,
            };

            if let Some(pid) = self.child.id() {
                let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill().await;
        }

        match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "WhatsApp sidecar process exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for sidecar process"),
            Err(_) => {
                warn!("sidecar process did not exit gracefully, killing");
                self.child
                    .kill()
                    .await
                    .context("failed to kill sidecar process")?;
            },
        }

        Ok(())
    }
}

/// Options passed to the sidecar through its environment.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// Directory containing the sidecar's `package.json`.
    pub sidecar_dir: PathBuf,
    pub port: u16,
    /// Session storage, so pairing survives restarts.
    pub auth_dir: Option<PathBuf>,
    /// Chromium binary; the sidecar's bundled browser when unset.
    pub browser_path: Option<PathBuf>,
    pub headless: bool,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            sidecar_dir: PathBuf::new(),
            port: DEFAULT_SIDECAR_PORT,
            auth_dir: None,
            browser_path: None,
            headless: true,
        }
    }
}

impl SidecarConfig {
    pub fn from_config(sidecar_dir: PathBuf, config: &WhatsAppConfig) -> Self {
        Self {
            sidecar_dir,
            port: config.port,
            auth_dir: config.auth_dir.clone(),
            browser_path: config.browser_path.clone(),
            headless: config.headless,
        }
    }

    /// Environment handed to the sidecar process.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("REVWATCH_SIDECAR_PORT", self.port.to_string()),
            ("REVWATCH_HEADLESS", self.headless.to_string()),
        ];
        if let Some(dir) = &self.auth_dir {
            env.push(("REVWATCH_AUTH_DIR", dir.display().to_string()));
        }
        if let Some(path) = &self.browser_path {
            env.push(("REVWATCH_BROWSER_PATH", path.display().to_string()));
        }
        env
    }
}

/// Find the sidecar directory.
///
/// Searches in order:
/// 1. Explicit path if provided
/// 2. `REVWATCH_SIDECAR_DIR`
/// 3. Next to the executable: `../sidecar/whatsapp-web`
/// 4. Relative to the working directory
pub fn find_sidecar_dir(explicit_path: Option<&Path>) -> Result<PathBuf> {
    find_sidecar_dir_with(explicit_path, std::env::var(SIDECAR_DIR_ENV).ok())
}

fn find_sidecar_dir_with(explicit_path: Option<&Path>, env_dir: Option<String>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        if path.join("package.json").exists() {
            return Ok(path.to_path_buf());
        }
        bail!(
            "sidecar directory does not exist or missing package.json: {} ({SIDECAR_HINT})",
            path.display()
        );
    }

    if let Some(dir) = env_dir {
        let path = PathBuf::from(&dir);
        if path.join("package.json").exists() {
            return Ok(path);
        }
        warn!(path = %dir, "{SIDECAR_DIR_ENV} set but package.json not found");
    }

    if let Ok(exe_path) = std::env::current_exe()
        && let Some(exe_dir) = exe_path.parent()
    {
        for prefix in ["..", "../.."] {
            let candidate = exe_dir.join(prefix).join(SIDECAR_SUBDIR);
            if candidate.join("package.json").exists() {
                return Ok(candidate);
            }
        }
    }

    for prefix in [".", "..", "../.."] {
        let path = PathBuf::from(prefix).join(SIDECAR_SUBDIR);
        if path.join("package.json").exists() {
            return Ok(path.canonicalize().unwrap_or(path));
        }
    }

    bail!(
        "WhatsApp sidecar not found. Set {SIDECAR_DIR_ENV} or ensure \
         {SIDECAR_SUBDIR} exists with package.json ({SIDECAR_HINT})"
    )
}

pub fn has_node_modules(sidecar_dir: &Path) -> bool {
    sidecar_dir.join("node_modules").exists()
}

/// Start the sidecar process, installing its dependencies first if needed.
pub async fn start_sidecar(config: SidecarConfig) -> Result<SidecarProcess> {
    let sidecar_dir = &config.sidecar_dir;

    if !sidecar_dir.join(ENTRY_POINT).exists() {
        bail!(
            "WhatsApp sidecar entry point missing: {}",
            sidecar_dir.join(ENTRY_POINT).display()
        );
    }

    if !has_node_modules(sidecar_dir) {
        run_npm_install(sidecar_dir).await?;
    }

    info!(
        path = %sidecar_dir.display(),
        port = config.port,
        headless = config.headless,
        "starting WhatsApp sidecar process"
    );

    let mut cmd = Command::new("node");
    cmd.arg(ENTRY_POINT)
        .current_dir(sidecar_dir)
        .envs(config.env())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("failed to spawn sidecar process")?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                forward_log_line(&line);
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "whatsapp_sidecar", "{}", line);
            }
        });
    }

    // Give the process a moment to fail fast (bad node version, port taken).
    tokio::time::sleep(Duration::from_millis(500)).await;

    match child.try_wait() {
        Ok(Some(status)) => bail!("sidecar process exited immediately with status: {status}"),
        Ok(None) => {},
        Err(e) => bail!("failed to check sidecar process status: {e}"),
    }

    info!(port = config.port, "WhatsApp sidecar process started");

    Ok(SidecarProcess {
        child,
        port: config.port,
    })
}

/// Re-emit one sidecar stdout line through tracing. Pino JSON lines keep
/// their level; anything else is logged at info.
fn forward_log_line(line: &str) {
    let (level, msg) = parse_pino_line(line);
    match level {
        10 | 20 => debug!(target: "whatsapp_sidecar", "{}", msg),
        30 => info!(target: "whatsapp_sidecar", "{}", msg),
        40 => warn!(target: "whatsapp_sidecar", "{}", msg),
        _ => error!(target: "whatsapp_sidecar", "{}", msg),
    }
}

fn parse_pino_line(line: &str) -> (u64, String) {
    if line.starts_with('{')
        && let Ok(log) = serde_json::from_str::<serde_json::Value>(line)
    {
        let level = log
            .get("level")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(30);
        let msg = log
            .get("msg")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(line);
        return (level, msg.to_string());
    }
    (30, line.to_string())
}

async fn run_npm_install(sidecar_dir: &Path) -> Result<()> {
    info!(path = %sidecar_dir.display(), "running npm install for sidecar");

    let output = Command::new("npm")
        .arg("install")
        .arg("--omit=dev")
        .current_dir(sidecar_dir)
        .output()
        .await
        .context("failed to run npm install")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("npm install failed: {stderr}");
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_requires_package_json() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_sidecar_dir_with(Some(dir.path()), None).is_err());

        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        assert_eq!(
            find_sidecar_dir_with(Some(dir.path()), None).unwrap(),
            dir.path()
        );
    }

    #[test]
    fn env_dir_is_used_when_valid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let found =
            find_sidecar_dir_with(None, Some(dir.path().display().to_string())).unwrap();
        assert_eq!(found, dir.path());
    }

    #[test]
    fn env_carries_browser_options() {
        let config = SidecarConfig {
            auth_dir: Some("/data/auth".into()),
            browser_path: Some("/usr/bin/chromium".into()),
            headless: false,
            ..Default::default()
        };
        let env = config.env();
        assert!(env.contains(&("REVWATCH_SIDECAR_PORT", "3017".into())));
        assert!(env.contains(&("REVWATCH_HEADLESS", "false".into())));
        assert!(env.contains(&("REVWATCH_AUTH_DIR", "/data/auth".into())));
        assert!(env.contains(&("REVWATCH_BROWSER_PATH", "/usr/bin/chromium".into())));
    }

    #[test]
    fn pino_lines_keep_their_level() {
        assert_eq!(
            parse_pino_line(r#"{"level":40,"msg":"reconnecting"}"#),
            (40, "reconnecting".into())
        );
        assert_eq!(parse_pino_line("plain output"), (30, "plain output".into()));
        assert_eq!(parse_pino_line("{broken"), (30, "{broken".into()));
    }

    #[tokio::test]
    async fn start_fails_without_entry_point() {
        let dir = tempfile::tempdir().unwrap();
        let config = SidecarConfig {
            sidecar_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let err = start_sidecar(config).await.err().unwrap();
        assert!(err.to_string().contains("entry point missing"));
    }
}
