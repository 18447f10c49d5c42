//! Character-device (serial port) transport

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tokio::io::unix::AsyncFd;
use tokio::sync::Mutex;
use tracing::info;

use super::Transport;
use crate::{ReachError, Result};

/// Serial device opened as a non-blocking character device.
///
/// Line settings (baud rate, parity, raw mode) are not touched; configure the
/// port beforehand, e.g. with `stty`. The descriptor is registered with the
/// runtime's reactor, so a read that is dropped (on shutdown, say) leaves no
/// pending system call behind and consumes no bytes.
pub struct SerialTransport {
    path: PathBuf,
    fd: AsyncFd<File>,
    // Frames from concurrent writers must not interleave
    write_lock: Mutex<()>,
}

impl SerialTransport {
    /// Open the device at `path` for reading and writing.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(&path)
            .map_err(|e| ReachError::transport_error(format!("open {}", path.display()), e))?;

        Self::from_file(path, file)
    }

    /// Wrap an already open descriptor, switching it to non-blocking mode.
    ///
    /// The descriptor must support readiness polling (ttys, ptys, sockets);
    /// regular files are rejected.
    pub fn from_file(path: impl Into<PathBuf>, file: File) -> Result<Self> {
        let path = path.into();
        let register = |e| ReachError::transport_error(format!("register {}", path.display()), e);

        set_nonblocking(&file).map_err(register)?;
        let fd = AsyncFd::new(file).map_err(register)?;

        info!(path = %path.display(), "Serial transport opened");
        Ok(Self { path, fd, write_lock: Mutex::new(()) })
    }

    /// Path of the opened device.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn set_nonblocking(file: &File) -> io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: `fd` is owned by `file` and stays open for both calls
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK == 0 {
        // SAFETY: as above
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[async_trait::async_trait]
impl Transport for SerialTransport {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.read(buf)
            }) {
                Ok(result) => return result,
                // Spurious readiness; wait again
                Err(_would_block) => continue,
            }
        }
    }

    async fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        let _frame = self.write_lock.lock().await;
        let mut written = 0;

        while written < bytes.len() {
            let mut guard = self.fd.writable().await?;
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.write(&bytes[written..])
            }) {
                Ok(Ok(0)) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(Ok(n)) => written += n,
                Ok(Err(e)) => return Err(e),
                Err(_would_block) => continue,
            }
        }

        Ok(written)
    }
}
