//! Byte transports the session reads from and writes to

use std::io;

#[cfg(unix)]
mod serial;
mod udp;

#[cfg(unix)]
pub use serial::SerialTransport;
pub use udp::UdpTransport;

/// Raw byte link to a device.
///
/// Transports abstract over the physical medium (serial line, UDP socket)
/// so the session is medium-agnostic. Both methods take `&self`: the session
/// reader and any number of writers share one transport concurrently.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Read up to `buf.len()` bytes.
    ///
    /// Returns the number of bytes read. `Ok(0)` means no data was available;
    /// the reader treats it as idle, not as end of stream.
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `bytes` as one unit, returning the number written.
    async fn write(&self, bytes: &[u8]) -> io::Result<usize>;
}
