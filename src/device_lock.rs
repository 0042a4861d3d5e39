//! Advisory per-device lock shared between daemon instances.
//!
//! Wraps `flock(2)` on a lock file so that only one process at a time can
//! run a brightness ramp against a given backlight device.

use crate::error::DeviceError;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Directory holding the per-device lock files.
pub const LOCK_DIR: &str = "/tmp";

/// Lock file guarding ramps on one backlight device.
#[derive(Debug)]
pub struct DeviceLock {
    file: File,
    path: PathBuf,
}

/// Held while a ramp is in flight; unlocks on drop.
#[derive(Debug)]
pub struct DeviceLockGuard<'a> {
    lock: &'a DeviceLock,
}

impl DeviceLock {
    /// Open (creating if needed) the lock file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DeviceError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| DeviceError::LockFailed {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(Self { file, path })
    }

    /// Default lock file for a backlight device name.
    pub fn path_for_device(device_name: &str) -> PathBuf {
        Path::new(LOCK_DIR).join(format!("adaptive-brightness-{}.lock", device_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the exclusive lock is held.
    pub fn lock(&self) -> Result<DeviceLockGuard<'_>, DeviceError> {
        self.flock(libc::LOCK_EX)?;
        Ok(DeviceLockGuard { lock: self })
    }

    /// Take the exclusive lock without waiting.
    ///
    /// Returns `Ok(None)` if another holder has it.
    pub fn try_lock(&self) -> Result<Option<DeviceLockGuard<'_>>, DeviceError> {
        match self.flock(libc::LOCK_EX | libc::LOCK_NB) {
            Ok(()) => Ok(Some(DeviceLockGuard { lock: self })),
            Err(DeviceError::LockFailed { source, .. })
                if source.kind() == std::io::ErrorKind::WouldBlock =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// True if another holder currently has the lock.
    pub fn is_held_elsewhere(&self) -> Result<bool, DeviceError> {
        Ok(self.try_lock()?.is_none())
    }

    fn flock(&self, operation: libc::c_int) -> Result<(), DeviceError> {
        let result = unsafe { libc::flock(self.file.as_raw_fd(), operation) };
        if result != 0 {
            return Err(DeviceError::LockFailed {
                path: self.path.display().to_string(),
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

impl Drop for DeviceLockGuard<'_> {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.lock.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
