//! Async client for serial and UDP actuator modules.
//!
//! Reach provides the client side of a packet protocol used by multi-joint
//! manipulators: a COBS + CRC-8 frame codec, a session that keeps the link
//! alive through device heartbeats, and a driver that dispatches incoming
//! packets to per-id handlers and sends one-shot or periodic read requests.
//!
//! # Features
//!
//! - **Transports**: serial character devices and connected UDP sockets
//! - **Resilient decoding**: corrupt frames are dropped, the stream resynchronizes
//! - **Liveness**: connection state derived from heartbeat reports
//! - **Backpressure**: a bounded dispatch queue that slows the reader instead of dropping packets
//!
//! ## Example (UDP)
//!
//! ```rust,no_run
//! use reach::{DriverConfig, PacketId, Reach, UpdateRate, alpha5};
//! use futures::StreamExt;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> reach::Result<()> {
//!     let driver = Reach::udp("192.168.2.3:6789", DriverConfig::default()).await?;
//!     driver.wait_for_connection(Duration::from_secs(5)).await?;
//!
//!     driver.request_at_rate(&[PacketId::POSITION], alpha5::JOINT_A, Duration::from_millis(50))?;
//!     let mut positions = driver.subscribe(PacketId::POSITION, UpdateRate::Max(10));
//!
//!     while let Some(packet) = positions.next().await {
//!         println!("{}: {:?}", packet.device_id(), packet.value::<f32>());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
mod error;
pub mod protocol;
pub mod session;
pub mod stream;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod transport;
pub mod types;

pub use config::DriverConfig;
pub use driver::{Driver, DriverStats, RequestId};
pub use error::*;
pub use session::{ConnectionState, Session};
#[cfg(unix)]
pub use transport::SerialTransport;
pub use transport::{Transport, UdpTransport};
pub use types::*;

#[cfg(unix)]
use std::path::Path;
use tokio::net::ToSocketAddrs;

/// Entry point for driver connections.
///
/// # Examples
///
/// ## Serial
/// ```rust,no_run
/// use reach::{DriverConfig, Reach};
///
/// #[tokio::main]
/// async fn main() -> reach::Result<()> {
///     let driver = Reach::serial("/dev/ttyUSB0", DriverConfig::default()).await?;
///     // Use driver...
///     driver.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Reach;

impl Reach {
    /// Open a serial device and start a driver on it.
    ///
    /// The port must already be configured for the device's baud rate.
    #[cfg(unix)]
    pub async fn serial<P: AsRef<Path>>(path: P, config: DriverConfig) -> Result<Driver> {
        let transport = SerialTransport::open(path).await?;
        Driver::start(transport, config).await
    }

    /// Connect a UDP socket to `remote` and start a driver on it.
    pub async fn udp<A: ToSocketAddrs>(remote: A, config: DriverConfig) -> Result<Driver> {
        let transport = UdpTransport::connect(remote).await?;
        Driver::start(transport, config).await
    }
}
