//! Pause control for the brightness loop.
//!
//! Adjustments are paused while the flag file exists or while a pause was
//! requested over the control socket. Pausing never touches the smoothing
//! or stability state.

use crate::error::PauseError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Polled at the top of every control loop cycle.
#[derive(Debug, Clone)]
pub struct PauseGate {
    flag_path: PathBuf,
    commanded: Arc<AtomicBool>,
}

impl PauseGate {
    pub fn new(flag_path: impl Into<PathBuf>) -> Self {
        Self {
            flag_path: flag_path.into(),
            commanded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn flag_path(&self) -> &Path {
        &self.flag_path
    }

    /// True if either the flag file or a command has paused the loop.
    pub fn is_paused(&self) -> bool {
        self.is_flag_present() || self.commanded.load(Ordering::SeqCst)
    }

    pub fn is_flag_present(&self) -> bool {
        self.flag_path.exists()
    }

    /// Pause by command.
    pub fn pause(&self) {
        self.commanded.store(true, Ordering::SeqCst);
    }

    /// Clear a commanded pause. The flag file, if present, still applies.
    pub fn resume(&self) {
        self.commanded.store(false, Ordering::SeqCst);
    }
}

/// Create the pause flag file.
pub fn create_flag(path: &Path) -> Result<(), PauseError> {
    std::fs::File::create(path).map_err(|e| PauseError::CreateFailed {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

/// Remove the pause flag file.
///
/// Returns `Ok(false)` if there was no flag to remove.
pub fn remove_flag(path: &Path) -> Result<bool, PauseError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(PauseError::RemoveFailed {
            path: path.display().to_string(),
            source: e,
        }),
    }
}
