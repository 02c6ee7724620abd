//! Error types for avrprog-core
//!
//! The core error is deliberately small and `Copy`: backends keep their own
//! richer error types and convert at the capability trait boundary.

use core::fmt;

/// Core error type shared by all programmer backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Transport-level I/O failure (short write, closed port, ...)
    Io,
    /// The device did not respond within the transport timeout
    Timeout,
    /// Unexpected response byte; host and device have desynchronized
    Protocol {
        /// The byte the device actually answered
        response: u8,
    },
    /// A write targeted the reserved bootloader region
    BootloaderBoundary {
        /// Start address of the offending write
        addr: u32,
    },
    /// The image's first word is not a relative-jump reset vector
    MissingResetVector {
        /// The word found at address 0
        found: u16,
    },
    /// The image is too small to carry the reserved bootloader region
    InvalidImage,
    /// The backend cannot program the requested memory class
    UnsupportedMemory,
}

impl Error {
    /// Whether this error must end the programming session.
    ///
    /// Fatal errors mean either the host and device no longer agree on
    /// protocol state, or that continuing would brick the bootloader or
    /// produce an unbootable image. The caller decides how to terminate;
    /// the engine only classifies.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. } | Self::BootloaderBoundary { .. } | Self::MissingResetVector { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "transport I/O error"),
            Self::Timeout => write!(f, "device response timed out"),
            Self::Protocol { response } => {
                write!(f, "protocol error: expected ACK 0x00, got 0x{:02X}", response)
            }
            Self::BootloaderBoundary { addr } => {
                write!(f, "write at 0x{:04X} targets the reserved bootloader region", addr)
            }
            Self::MissingResetVector { found } => {
                write!(f, "no rjmp reset vector at start of image (found 0x{:04X})", found)
            }
            Self::InvalidImage => write!(f, "image too small for the reserved bootloader region"),
            Self::UnsupportedMemory => write!(f, "memory class not supported by this programmer"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
