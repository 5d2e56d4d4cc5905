//! WhatsApp Web chat client for revwatch.
//!
//! Implements `ChatClient` on top of a Node.js sidecar running
//! whatsapp-web.js, which this crate starts, talks to over a local
//! WebSocket, and stops again.
//!
//! The sidecar is not shipped with the binary. With
//! `whatsapp.auto_start = true` (the default) revwatch looks for a directory
//! holding `package.json` and `index.js`: `whatsapp.sidecar_dir`, then
//! `REVWATCH_SIDECAR_DIR`, then `sidecar/whatsapp-web` next to the executable
//! or the working directory. It runs `npm install --omit=dev` when
//! `node_modules` is missing and starts `node index.js` with:
//!
//! - `REVWATCH_SIDECAR_PORT`: port to serve the WebSocket on (127.0.0.1)
//! - `REVWATCH_HEADLESS`: `true` or `false`
//! - `REVWATCH_AUTH_DIR`, `REVWATCH_BROWSER_PATH`: only when configured
//!
//! The sidecar should log pino JSON lines to stdout, exit on SIGTERM after
//! closing its browser, and speak the frames in [`types`]. With
//! `auto_start = false` revwatch only connects to a sidecar already listening
//! on `whatsapp.port`.

pub mod client;
pub mod process;
pub mod sidecar;
pub mod types;

pub use {
    client::WhatsAppClient,
    process::{SidecarConfig, SidecarProcess, find_sidecar_dir, start_sidecar},
    sidecar::{DEFAULT_SIDECAR_PORT, SidecarConnection},
};
