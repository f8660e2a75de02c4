//! SIGINT/SIGTERM handling.
//!
//! The handler only records the signal. Pipeline stages poll [`check`]
//! between steps and unwind with [`ForgeError::Interrupted`], so mount
//! guards and the scratch workspace are released by their destructors.
//! Foreground children receive the signal themselves and exit non-zero.

use std::sync::atomic::{AtomicBool, Ordering};

use ctforge_common::error::{ForgeError, Result};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Installs the process-wide signal handler.
///
/// # Errors
///
/// Returns an error if a handler is already installed.
pub fn install() -> Result<()> {
    ctrlc::set_handler(|| {
        INTERRUPTED.store(true, Ordering::SeqCst);
    })
    .map_err(|e| ForgeError::Config {
        message: format!("failed to install signal handler: {e}"),
    })
}

/// Whether an interrupt has been received.
#[must_use]
pub fn requested() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Fails with [`ForgeError::Interrupted`] once a signal has arrived.
///
/// # Errors
///
/// Returns [`ForgeError::Interrupted`] after SIGINT or SIGTERM.
pub fn check() -> Result<()> {
    if requested() {
        Err(ForgeError::Interrupted)
    } else {
        Ok(())
    }
}
