//! avrprog-core - Programmer capability interface for AVR in-system
//! programming
//!
//! This crate defines what a programmer backend must be able to do; the
//! wire protocols live in per-backend crates. A backend implements
//! [`programmer::Programmer`] and the rest of the toolchain drives it
//! through that trait alone.
//!
//! # Example
//!
//! ```ignore
//! use avrprog_core::part::{Memory, MemoryKind, Part};
//! use avrprog_core::programmer::Programmer;
//!
//! fn flash_image<P: Programmer>(pgm: &mut P, part: &Part, mem: &mut Memory) {
//!     pgm.initialize(part).expect("link sync failed");
//!     // stop short of the reserved bootloader region
//!     let mut addr = 0;
//!     while (addr as usize) < mem.size() - 66 {
//!         match pgm.paged_write(mem, 64, addr, 64) {
//!             Ok(n) => addr += n as u32,
//!             Err(e) if e.is_fatal() => panic!("session lost: {}", e),
//!             Err(e) => eprintln!("page 0x{:04X} failed: {}", addr, e),
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod part;
pub mod programmer;

pub use error::{Error, Result};
