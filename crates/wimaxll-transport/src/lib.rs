//! Datagram socket layer for wimaxll.
//!
//! Provides the sockets every pipe of a WiMAX handle is built on:
//! - Generic netlink sockets talking to the kernel (Linux)
//! - Loopback datagram sockets, used for tests and demos
//!
//! This is the lowest layer of wimaxll. It knows nothing about frames;
//! everything else builds on top of the [`PipeSocket`] type provided here.

pub mod device;
pub mod error;
pub mod poll;
pub mod socket;

#[cfg(target_os = "linux")]
pub mod netlink;

pub use device::interface_index;
pub use error::{Result, TransportError};
pub use poll::{wait_any_readable, wait_readable};
pub use socket::PipeSocket;

#[cfg(target_os = "linux")]
pub use netlink::NetlinkSocket;
