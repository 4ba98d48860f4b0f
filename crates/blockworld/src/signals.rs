//! Shutdown signal handling.
//!
//! Handlers are installed before the listener binds, so a signal that lands
//! while the world is still starting is not lost.

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// The signals that stop the server.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
}

impl ShutdownSignals {
    /// Registers SIGINT and SIGTERM (Ctrl+C on Windows) with the runtime.
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Waits for the first shutdown signal and returns its name.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::select! {
            _ = self.interrupt.recv() => Ok("SIGINT"),
            _ = self.terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl+C")
    }
}
