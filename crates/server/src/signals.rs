//! OS signal handling.
//!
//! SIGINT, SIGTERM and SIGQUIT request shutdown. SIGHUP triggers an
//! immediate refresh of every registered loop.

use pemvault_common::Lifecycle;
use tracing::{debug, error, info};

use crate::refresh::RefreshHandle;

/// What a received signal asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    /// Refresh now (SIGHUP)
    Reload,
    /// Graceful shutdown (SIGINT, SIGTERM, SIGQUIT)
    Shutdown,
}

/// Apply one signal
pub fn dispatch(signal: SignalType, lifecycle: &Lifecycle, handles: &[RefreshHandle]) {
    match signal {
        SignalType::Reload => {
            for handle in handles {
                debug!(task = handle.name(), "Triggering refresh");
                handle.trigger();
            }
            info!(loops = handles.len(), "Reload requested");
        }
        SignalType::Shutdown => lifecycle.abort("termination signal"),
    }
}

/// Listen for signals until shutdown
#[cfg(unix)]
pub async fn listen(lifecycle: Lifecycle, handles: Vec<RefreshHandle>) {
    use tokio::signal::unix::{signal, SignalKind};

    let streams = (|| {
        Ok::<_, std::io::Error>((
            signal(SignalKind::interrupt())?,
            signal(SignalKind::terminate())?,
            signal(SignalKind::quit())?,
            signal(SignalKind::hangup())?,
        ))
    })();
    let (mut int, mut term, mut quit, mut hup) = match streams {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "Failed to install signal handlers");
            lifecycle.abort("signal handler installation failed");
            return;
        }
    };

    let token = lifecycle.token();
    loop {
        let received = tokio::select! {
            _ = token.cancelled() => return,
            _ = int.recv() => ("SIGINT", SignalType::Shutdown),
            _ = term.recv() => ("SIGTERM", SignalType::Shutdown),
            _ = quit.recv() => ("SIGQUIT", SignalType::Shutdown),
            _ = hup.recv() => ("SIGHUP", SignalType::Reload),
        };
        info!(signal = received.0, "Received signal");
        dispatch(received.1, &lifecycle, &handles);
    }
}

#[cfg(not(unix))]
pub async fn listen(lifecycle: Lifecycle, _handles: Vec<RefreshHandle>) {
    let token = lifecycle.token();
    tokio::select! {
        _ = token.cancelled() => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => dispatch(SignalType::Shutdown, &lifecycle, &[]),
            Err(e) => {
                error!(error = %e, "Failed to listen for ctrl-c");
                lifecycle.abort("signal handler installation failed");
            }
        },
    }
}
