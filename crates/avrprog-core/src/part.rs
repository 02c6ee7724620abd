//! Target part and memory image types
//!
//! A `Part` describes the device being programmed; a `Memory` is one of its
//! memory spaces together with the host-side image of its contents. The
//! image buffer is owned by the caller and handed to backends by reference;
//! paged writes may rewrite parts of it (reset-vector relocation).

use core::fmt;

/// Memory classes a target part can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Program flash, the only class the bundled backends can write
    Flash,
    /// Data EEPROM
    Eeprom,
    /// Device signature bytes
    Signature,
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flash => write!(f, "flash"),
            Self::Eeprom => write!(f, "eeprom"),
            Self::Signature => write!(f, "signature"),
        }
    }
}

/// A memory space and the host-side image of its contents
#[derive(Debug, Clone)]
pub struct Memory {
    kind: MemoryKind,
    data: Vec<u8>,
}

impl Memory {
    /// Create a memory image of the given size, filled with the erased
    /// state (0xFF)
    pub fn new(kind: MemoryKind, size: usize) -> Self {
        Self {
            kind,
            data: vec![0xFF; size],
        }
    }

    /// Create a memory image from existing contents
    pub fn from_bytes(kind: MemoryKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// The memory class
    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    /// Size of the memory space in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Image contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable image contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Description of the target device
#[derive(Debug, Clone)]
pub struct Part {
    /// Part name, e.g. "attiny85"
    pub name: String,
    /// Expected 3-byte device signature
    pub signature: [u8; 3],
}

impl Part {
    /// Create a part description
    pub fn new(name: &str, signature: [u8; 3]) -> Self {
        Self {
            name: name.to_string(),
            signature,
        }
    }
}
