//! Termination signals that should end a run with a cache flush rather than
//! the default kill.
//!
//! Handlers are registered in `install`, so a signal that arrives before the
//! first `recv` is still observed instead of terminating the process.

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
}

impl ShutdownSignal {
    /// Must be called from inside a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for SIGINT or SIGTERM. Returns the signal name.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}
