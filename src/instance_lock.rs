//! Single instance lock using Unix socket.
//!
//! Two daemons driving the same GPIO lines would fight over the opener relay,
//! so the manager refuses to start while another instance holds the lock.
//! A Unix socket is released by the OS when the process dies, avoiding stale
//! lock files after a crash.

use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SOCKET_NAME: &str = "garage-door-manager.sock";

/// Error types for instance lock operations.
#[derive(Debug, Error)]
pub enum InstanceLockError {
    /// Another instance is already running.
    #[error("another instance is already running")]
    AlreadyRunning,

    /// I/O error during lock acquisition.
    #[error("failed to acquire instance lock: {0}")]
    Io(#[from] io::Error),
}

/// Held for the lifetime of the daemon; the socket file is removed on drop.
#[derive(Debug)]
pub struct InstanceLock {
    _listener: UnixListener,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the lock at the default runtime location.
    pub fn acquire() -> Result<Self, InstanceLockError> {
        Self::acquire_at(Self::socket_path())
    }

    pub fn acquire_at(path: PathBuf) -> Result<Self, InstanceLockError> {
        if path.exists() {
            // A live instance accepts the connection; a stale socket refuses it.
            if UnixStream::connect(&path).is_ok() {
                return Err(InstanceLockError::AlreadyRunning);
            }
            let _ = std::fs::remove_file(&path);
        }

        match UnixListener::bind(&path) {
            Ok(listener) => Ok(Self {
                _listener: listener,
                path,
            }),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Err(InstanceLockError::AlreadyRunning),
            Err(e) => Err(InstanceLockError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Socket location: `$XDG_RUNTIME_DIR` when set, `/tmp` otherwise.
    pub fn socket_path() -> PathBuf {
        Self::socket_path_in(std::env::var_os("XDG_RUNTIME_DIR").map(PathBuf::from))
    }

    fn socket_path_in(runtime_dir: Option<PathBuf>) -> PathBuf {
        runtime_dir
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(SOCKET_NAME)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
