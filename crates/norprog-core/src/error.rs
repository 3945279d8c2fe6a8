//! Error types for norprog-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Bus errors
    /// SPI transfer failed
    SpiTransferFailed,
    /// Requested bus mode is not supported by the transceiver
    BusModeNotSupported,

    // Flash status errors
    /// Busy bit never cleared within the configured poll budget
    BusyTimeout,
    /// Write Enable Latch did not set after WREN
    WriteEnableFailed,
    /// Status register write did not complete (latch still set)
    StatusWriteFailed,
    /// Quad Enable bit stuck set after an explicit clear during reset
    ///
    /// The chip cannot be returned to single-bit mode; nothing is
    /// serviceable until power cycle.
    QuadEnableStuck,

    // Chip errors
    /// Flash chip not found (JEDEC ID read failed or unknown)
    ChipNotFound,

    // Operation errors
    /// Erase operation failed at the given address
    EraseFailed {
        /// Address where the erase was attempted
        addr: u32,
    },
    /// Post-write readback did not match the written data
    VerifyMismatch,

    // Request errors
    /// Transfer request rejected (bad value size, stride, span, or capacity)
    InvalidRequest,
    /// Address range extends beyond the chip
    AddressOutOfBounds,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
            Self::BusModeNotSupported => write!(f, "bus mode not supported by transceiver"),
            Self::BusyTimeout => write!(f, "flash busy bit never cleared"),
            Self::WriteEnableFailed => write!(f, "write enable latch did not set"),
            Self::StatusWriteFailed => write!(f, "status register write did not complete"),
            Self::QuadEnableStuck => write!(f, "quad enable bit stuck set after reset"),
            Self::ChipNotFound => write!(f, "flash chip not found"),
            Self::EraseFailed { addr } => {
                write!(f, "erase failed at address 0x{:06X}", addr)
            }
            Self::VerifyMismatch => write!(f, "verify failed: data mismatch"),
            Self::InvalidRequest => write!(f, "transfer request rejected"),
            Self::AddressOutOfBounds => write!(f, "address out of bounds"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
