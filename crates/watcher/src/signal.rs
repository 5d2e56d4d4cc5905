//! OS signals and the process-wide panic hook, both mapped onto a
//! [`ShutdownHandle`].

use {
    tokio::task::JoinHandle,
    tracing::{error, warn},
};

use crate::{
    fault::is_supervised,
    lifecycle::{ShutdownHandle, ShutdownReason},
};

/// Wait for SIGINT, SIGTERM, or SIGHUP and return its name.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = hangup.recv() => Ok("SIGHUP"),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}

/// Trigger `handle` on every termination signal until the process exits.
pub fn spawn_signal_listener(handle: ShutdownHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match wait_for_signal().await {
                Ok(name) => handle.trigger(ShutdownReason::Signal(name)),
                Err(e) => {
                    warn!(error = %e, "cannot listen for termination signals");
                    return;
                },
            }
        }
    })
}

/// Route uncaught panics into the shutdown path before the default hook
/// runs. Panics inside supervised event handlers are already contained and
/// only reach the log.
pub fn install_panic_hook(handle: ShutdownHandle) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if is_supervised() {
            return;
        }
        error!(panic = %info, "uncaught panic, shutting down");
        handle.trigger(ShutdownReason::Fault(info.to_string()));
        previous(info);
    }));
}
