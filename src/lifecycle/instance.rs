//! Single-instance guard
//!
//! A second copy of the app must not register a second hotkey or write the
//! same documents. The lock is a named OS object keyed by the application
//! identity and is released when the guard drops.

use std::path::Path;

use tracing::{debug, info};

/// Errors acquiring the instance lock
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("failed to create instance lock: {0}")]
    Create(String),
}

/// Held for the lifetime of the primary instance
pub struct InstanceGuard {
    #[cfg(windows)]
    handle: windows_sys::Win32::Foundation::HANDLE,
    #[cfg(unix)]
    _file: std::fs::File,
}

impl InstanceGuard {
    /// Try to become the primary instance
    ///
    /// `Ok(None)` means another instance already holds the lock.
    #[cfg(windows)]
    pub fn acquire(name: &str, _lock_path: &Path) -> Result<Option<Self>, InstanceError> {
        use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, ERROR_ALREADY_EXISTS};
        use windows_sys::Win32::System::Threading::CreateMutexW;

        let mutex_name: Vec<u16> = format!("Local\\{name}")
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: `mutex_name` is NUL-terminated and outlives the call.
        let handle = unsafe { CreateMutexW(std::ptr::null(), 0, mutex_name.as_ptr()) };
        if handle.is_null() {
            let code = unsafe { GetLastError() };
            return Err(InstanceError::Create(format!("CreateMutexW failed with error {code}")));
        }

        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            unsafe { CloseHandle(handle) };
            debug!(name, "instance mutex already held");
            return Ok(None);
        }

        info!(name, "single-instance lock acquired");
        Ok(Some(Self { handle }))
    }

    /// Try to become the primary instance
    ///
    /// `Ok(None)` means another instance already holds the lock.
    #[cfg(unix)]
    pub fn acquire(name: &str, lock_path: &Path) -> Result<Option<Self>, InstanceError> {
        use std::os::unix::io::AsRawFd;

        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)
            .map_err(|e| InstanceError::Create(format!("{}: {e}", lock_path.display())))?;

        // SAFETY: the descriptor belongs to `file`, which the guard keeps open.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                debug!(name, path = %lock_path.display(), "instance lock already held");
                return Ok(None);
            }
            return Err(InstanceError::Create(err.to_string()));
        }

        info!(name, "single-instance lock acquired");
        Ok(Some(Self { _file: file }))
    }
}

#[cfg(windows)]
impl Drop for InstanceGuard {
    fn drop(&mut self) {
        // SAFETY: the handle came from CreateMutexW and is closed once.
        unsafe {
            windows_sys::Win32::Foundation::CloseHandle(self.handle);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.lock");

        let first = InstanceGuard::acquire("PowerKeysTest", &path).unwrap();
        assert!(first.is_some());
        assert!(InstanceGuard::acquire("PowerKeysTest", &path).unwrap().is_none());

        drop(first);
        assert!(InstanceGuard::acquire("PowerKeysTest", &path).unwrap().is_some());
    }
}
