//! Standard JEDEC SPI flash opcodes
//!
//! Command opcodes and status register bits for the subset of the SPI25
//! command set this engine issues.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2
pub const RDSR2: u8 = 0x35;
/// Write Status Register 1
pub const WRSR: u8 = 0x01;
/// Write Status Register 2
pub const WRSR2: u8 = 0x31;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;

// ============================================================================
// Read commands
// ============================================================================

/// Read Data (single I/O, 3-byte address)
pub const READ: u8 = 0x03;
/// Dual Output Read (1-1-2)
pub const DOR: u8 = 0x3B;
/// Quad Output Read (1-1-4)
pub const QOR: u8 = 0x6B;

// ============================================================================
// Program commands
// ============================================================================

/// Page Program with 3-byte address
pub const PP: u8 = 0x02;
/// Quad Page Program with 3-byte address
pub const QPP: u8 = 0x32;

// ============================================================================
// Erase commands
// ============================================================================

/// Block Erase 64KB with 3-byte address
pub const BE_D8: u8 = 0xD8;

// ============================================================================
// Software Reset
// ============================================================================

/// Reset Enable
pub const RSTEN: u8 = 0x66;
/// Reset Device
pub const RST: u8 = 0x99;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;

/// Status Register 2: Quad Enable
pub const SR2_QE: u8 = 0x02;
