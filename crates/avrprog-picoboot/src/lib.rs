//! avrprog-picoboot - picoboot bootloader backend
//!
//! This crate drives the picoboot serial bootloader: a tiny (64 byte)
//! resident loader for AVR parts that accepts checksummed 4-byte frames
//! and programs flash page by page. It is the one backend that implements
//! its own wire protocol instead of delegating to a vendor transport.
//!
//! # Protocol Overview
//!
//! Each frame carries two data bytes, an XOR checksum and a command byte;
//! the device answers every frame with a single `0x00` acknowledgement.
//! Data-stage and fill-buffer frames are pipelined in bursts of eight to
//! hide serial round trips; erase and commit frames are strictly
//! synchronous. The host also guards the bootloader's code region and
//! relocates the application's reset vector so both survive flashing.
//!
//! # Example
//!
//! ```no_run
//! use avrprog_core::part::{Memory, MemoryKind, Part};
//! use avrprog_core::programmer::Programmer;
//! use avrprog_picoboot::Picoboot;
//!
//! let part = Part::new("attiny84", [0x1E, 0x93, 0x0C]);
//! let mut image = Memory::from_bytes(MemoryKind::Flash, std::fs::read("app.bin")?);
//!
//! let mut pgm = Picoboot::open("/dev/ttyUSB0", None)?;
//! pgm.initialize(&part)?;
//! pgm.paged_write(&mut image, 64, 0, 64)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod device;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod transport;

// Re-exports
pub use device::Picoboot;
pub use error::{PicobootError, Result};
pub use protocol::{Command, Frame};
pub use transport::serial::SerialTransport;
pub use transport::Transport;

use avrprog_core::programmer::Programmer;

/// Open a picoboot device on a serial port and return a type-erased
/// programmer
///
/// Convenience for callers that select backends at runtime; use
/// [`Picoboot::open`] to keep the concrete type.
pub fn open_picoboot(
    device: &str,
    baud: Option<u32>,
) -> Result<Box<dyn Programmer + Send>> {
    Ok(Box::new(Picoboot::open(device, baud)?))
}
