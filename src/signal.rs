//! Ctrl+C handling for cooperative cancellation.
//!
//! The analysis pipeline polls a shared `AtomicBool` between images. This
//! module owns that flag and wires it to the process's interrupt signal.
//!
//! # Usage
//!
//! ```rust,no_run
//! use pixeldupe::duplicates::{AnalysisParams, AnalysisPipeline};
//! use pixeldupe::signal::install_handler;
//!
//! let handler = install_handler().unwrap();
//! let pipeline = AnalysisPipeline::new(AnalysisParams::default())
//!     .with_shutdown_flag(handler.get_flag());
//! ```
//!
//! After an interrupt the pipeline returns `PipelineError::Interrupted` and
//! the binary exits with code 130 (128 + SIGINT).

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared cancellation flag set by Ctrl+C or by [`ShutdownHandler::request_shutdown`].
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an interrupt has been received.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation without a signal.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to the pipeline and walker.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag so the handler can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler and return its flag owner.
///
/// The hook can only be registered once per process. Later calls (for example
/// from several `run_app` invocations in the same test binary) get the
/// already-installed handler back with its flag cleared. If another component
/// registered a hook first, an unhooked handler is returned so that manual
/// cancellation still works.
///
/// # Errors
///
/// Currently always succeeds; the `Result` leaves room for platforms where
/// the missing hook should be fatal.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\nInterrupted. Finishing current images...");
        let _ = stderr.flush();
        log::info!("Shutdown signal received");
    });

    match installed {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(GLOBAL_HANDLER.get().cloned().unwrap_or(handler))
        }
        Err(e) => {
            log::debug!("Ctrl+C handler unavailable ({}), using unhooked handler", e);
            let fallback = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone();
            fallback.reset();
            Ok(fallback)
        }
    }
}
