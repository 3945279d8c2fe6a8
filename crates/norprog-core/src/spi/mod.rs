//! SPI types and the transceiver capability
//!
//! This module provides the transaction value passed over the bus, the
//! bus trait every other component is expressed in terms of, and the
//! standard JEDEC opcodes.

mod bus;
pub mod opcodes;
mod transaction;

pub(crate) use bus::check_mode_supported;
pub use bus::{BusFeatures, BusMode, BusStateGuard, SpiBus};
pub use transaction::SpiTransaction;
