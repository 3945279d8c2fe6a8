//! norprog-core - Core library for SPI NOR flash programming
//!
//! This crate implements the flash lifecycle operations of a host-driven
//! flash programmer: identification, erase, page/sector write, verified
//! read, and quad-mode acceleration. Everything is expressed on top of a
//! single blocking transceiver capability (the [`spi::SpiBus`] trait), so
//! the engine runs unchanged against real hardware or a simulated bus.
//! It is designed to be `no_std` compatible for use in embedded
//! environments.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable heap allocation for the sector map and staging buffer
//!
//! # Example
//!
//! ```ignore
//! use norprog_core::{chip, spi::SpiBus};
//!
//! fn identify<B: SpiBus>(bus: &mut B) {
//!     match chip::probe(bus) {
//!         Ok(dev) => println!("Found: {} {}", dev.vendor, dev.name),
//!         Err(e) => println!("Probe failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod chip;
#[cfg(feature = "alloc")]
pub mod command;
#[cfg(feature = "alloc")]
pub mod engine;
pub mod error;
pub mod layout;
pub mod protocol;
pub mod spi;

pub use error::{Error, Result};
