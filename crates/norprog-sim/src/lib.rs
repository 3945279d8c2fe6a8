//! norprog-sim - In-memory SPI bus and flash emulator for testing
//!
//! This crate provides a simulated transceiver that emulates a NOR flash
//! chip in memory, including the status registers, the quad-enable bit,
//! and the multi-phase exchanges the engine issues under manual
//! chip-select. It additionally tracks the transceiver mode and select
//! state so tests can assert that bus defaults are restored after forced
//! failures, and offers fault injection for the error paths.

use norprog_core::error::{Error, Result};
use norprog_core::layout::SECTOR_SIZE;
use norprog_core::spi::{opcodes, BusFeatures, BusMode, SpiBus, SpiTransaction};

/// Configuration for the simulated flash
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Flash size in bytes
    pub size: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        // W25Q32FV: 64 sectors, keeps full-chip test loops short
        Self {
            manufacturer_id: 0xEF,
            device_id: 0x4016,
            size: 64 * SECTOR_SIZE,
        }
    }
}

/// A flash command started under manual chip-select whose data phase is
/// still outstanding
#[derive(Debug, Clone, Copy)]
enum Pending {
    Read { opcode: u8, addr: u32 },
    Program { addr: u32 },
}

/// Simulated SPI bus with an in-memory flash array behind it
pub struct SimBus {
    config: SimConfig,
    data: Vec<u8>,
    features: BusFeatures,

    sr1: u8,
    sr2: u8,

    mode: BusMode,
    manual_select: bool,
    selected: bool,
    pending: Option<Pending>,

    // Fault injection
    fail_next_data_phase: bool,
    corrupt_addr: Option<u32>,
    fail_erase_addr: Option<u32>,
    stuck_qe: bool,
    force_busy: bool,

    erase_attempts: Vec<u32>,
}

impl SimBus {
    /// Create a simulated bus with the given flash configuration
    pub fn new(config: SimConfig) -> Self {
        let data = vec![0xFF; config.size];
        Self {
            config,
            data,
            features: BusFeatures::DUAL_RX | BusFeatures::QUAD_RX | BusFeatures::QUAD_TX,
            sr1: 0,
            sr2: 0,
            mode: BusMode::Single,
            manual_select: false,
            selected: false,
            pending: None,
            fail_next_data_phase: false,
            corrupt_addr: None,
            fail_erase_addr: None,
            stuck_qe: false,
            force_busy: false,
            erase_attempts: Vec::new(),
        }
    }

    /// Create a simulated bus with the default configuration (W25Q32FV)
    pub fn new_default() -> Self {
        Self::new(SimConfig::default())
    }

    /// Restrict the advertised transceiver capabilities
    pub fn with_features(mut self, features: BusFeatures) -> Self {
        self.features = features;
        self
    }

    /// Flash array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable flash array contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Current transceiver mode
    pub fn mode(&self) -> BusMode {
        self.mode
    }

    /// Whether chip-select is under manual control
    pub fn is_manual_select(&self) -> bool {
        self.manual_select
    }

    /// Whether chip-select is currently asserted
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Quad-enable bit of the emulated status register 2
    pub fn quad_enabled(&self) -> bool {
        self.sr2 & opcodes::SR2_QE != 0
    }

    /// Sector-aligned addresses of every erase command received, in order
    pub fn erase_attempts(&self) -> &[u32] {
        &self.erase_attempts
    }

    /// Fail the next data-phase exchange (the second half of a multi-phase
    /// dual/quad command)
    pub fn fail_next_data_phase(&mut self) {
        self.fail_next_data_phase = true;
    }

    /// Flip the low bit of the byte at `addr` on the next program that
    /// covers it, so a verify readback sees a mismatch
    pub fn corrupt_byte(&mut self, addr: u32) {
        self.corrupt_addr = Some(addr);
    }

    /// Reject erase commands targeting the sector at `sector_addr`
    pub fn fail_erase_at(&mut self, sector_addr: u32) {
        self.fail_erase_addr = Some(sector_addr & !(SECTOR_SIZE as u32 - 1));
    }

    /// Make the quad-enable bit refuse to clear, as a latched-up chip would
    pub fn set_stuck_qe(&mut self) {
        self.stuck_qe = true;
        self.sr2 |= opcodes::SR2_QE;
    }

    /// Make the busy bit read set on every status poll
    pub fn force_busy(&mut self, busy: bool) {
        self.force_busy = busy;
    }

    fn wel(&self) -> bool {
        self.sr1 & opcodes::SR1_WEL != 0
    }

    fn clear_wel(&mut self) {
        self.sr1 &= !opcodes::SR1_WEL;
    }

    fn decode_addr(prologue: &[u8]) -> u32 {
        ((prologue[1] as u32) << 16) | ((prologue[2] as u32) << 8) | (prologue[3] as u32)
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if !self.wel() {
            return Err(Error::SpiTransferFailed);
        }
        let addr = addr as usize;
        if addr + data.len() > self.data.len() {
            return Err(Error::AddressOutOfBounds);
        }

        // Programming can only clear bits (1 -> 0)
        for (i, &byte) in data.iter().enumerate() {
            self.data[addr + i] &= byte;
        }

        if let Some(bad) = self.corrupt_addr {
            let bad = bad as usize;
            if (addr..addr + data.len()).contains(&bad) {
                self.data[bad] ^= 0x01;
                self.corrupt_addr = None;
            }
        }

        self.clear_wel();
        Ok(())
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let addr = addr as usize;
        if addr + buf.len() > self.data.len() {
            return Err(Error::AddressOutOfBounds);
        }
        buf.copy_from_slice(&self.data[addr..addr + buf.len()]);
        Ok(())
    }

    fn erase(&mut self, addr: u32) -> Result<()> {
        let aligned = (addr as usize) & !(SECTOR_SIZE - 1);
        self.erase_attempts.push(aligned as u32);

        if self.fail_erase_addr == Some(aligned as u32) {
            return Err(Error::SpiTransferFailed);
        }
        if !self.wel() {
            return Err(Error::SpiTransferFailed);
        }
        if aligned + SECTOR_SIZE > self.data.len() {
            return Err(Error::AddressOutOfBounds);
        }

        for byte in &mut self.data[aligned..aligned + SECTOR_SIZE] {
            *byte = 0xFF;
        }
        self.clear_wel();
        Ok(())
    }

    /// Second half of a multi-phase command: no prologue, data only
    fn handle_data_phase(&mut self, xfer: &mut SpiTransaction<'_>) -> Result<()> {
        if self.fail_next_data_phase {
            self.fail_next_data_phase = false;
            return Err(Error::SpiTransferFailed);
        }
        if !self.selected {
            return Err(Error::SpiTransferFailed);
        }

        let Some(pending) = self.pending.take() else {
            return Err(Error::SpiTransferFailed);
        };

        match pending {
            Pending::Read { opcode, addr } => {
                let expected = match opcode {
                    opcodes::DOR => BusMode::DualRx,
                    opcodes::QOR => BusMode::QuadRx,
                    _ => return Err(Error::SpiTransferFailed),
                };
                if self.mode != expected {
                    return Err(Error::SpiTransferFailed);
                }
                if opcode == opcodes::QOR && !self.quad_enabled() {
                    return Err(Error::SpiTransferFailed);
                }
                self.read(addr, xfer.read_buf)
            }
            Pending::Program { addr } => {
                if self.mode != BusMode::QuadTx {
                    return Err(Error::SpiTransferFailed);
                }
                if !self.quad_enabled() {
                    return Err(Error::SpiTransferFailed);
                }
                self.program(addr, xfer.write_data)
            }
        }
    }
}

impl SpiBus for SimBus {
    fn features(&self) -> BusFeatures {
        self.features
    }

    fn transceive(&mut self, xfer: &mut SpiTransaction<'_>) -> Result<()> {
        let prologue = xfer.prologue();
        if prologue.is_empty() {
            return self.handle_data_phase(xfer);
        }

        // Ordinary commands are clocked in single-bit mode
        if self.mode != BusMode::Single {
            return Err(Error::SpiTransferFailed);
        }

        let opcode = prologue[0];
        match opcode {
            opcodes::RDID => {
                if xfer.read_buf.len() >= 3 {
                    xfer.read_buf[0] = self.config.manufacturer_id;
                    xfer.read_buf[1] = (self.config.device_id >> 8) as u8;
                    xfer.read_buf[2] = self.config.device_id as u8;
                }
                Ok(())
            }

            opcodes::RDSR => {
                if !xfer.read_buf.is_empty() {
                    xfer.read_buf[0] = if self.force_busy {
                        self.sr1 | opcodes::SR1_WIP
                    } else {
                        self.sr1
                    };
                }
                Ok(())
            }
            opcodes::RDSR2 => {
                if !xfer.read_buf.is_empty() {
                    xfer.read_buf[0] = self.sr2;
                }
                Ok(())
            }

            opcodes::WRSR => {
                if self.wel() {
                    if !xfer.write_data.is_empty() {
                        self.sr1 = xfer.write_data[0] & !opcodes::SR1_WEL;
                    }
                    self.clear_wel();
                }
                Ok(())
            }
            opcodes::WRSR2 => {
                if self.wel() {
                    if !xfer.write_data.is_empty() {
                        self.sr2 = xfer.write_data[0];
                        if self.stuck_qe {
                            self.sr2 |= opcodes::SR2_QE;
                        }
                    }
                    self.clear_wel();
                }
                Ok(())
            }

            opcodes::WREN => {
                self.sr1 |= opcodes::SR1_WEL;
                Ok(())
            }

            opcodes::READ => {
                let addr = Self::decode_addr(prologue);
                self.read(addr, xfer.read_buf)
            }

            opcodes::PP => {
                let addr = Self::decode_addr(prologue);
                self.program(addr, xfer.write_data)
            }

            // Multi-phase commands: remember the header, data phase follows
            opcodes::DOR | opcodes::QOR => {
                if !self.manual_select || !self.selected {
                    return Err(Error::SpiTransferFailed);
                }
                // Header must carry a dummy slot after the address
                if prologue.len() != 5 {
                    return Err(Error::SpiTransferFailed);
                }
                self.pending = Some(Pending::Read {
                    opcode,
                    addr: Self::decode_addr(prologue),
                });
                Ok(())
            }
            opcodes::QPP => {
                if !self.manual_select || !self.selected {
                    return Err(Error::SpiTransferFailed);
                }
                self.pending = Some(Pending::Program {
                    addr: Self::decode_addr(prologue),
                });
                Ok(())
            }

            opcodes::BE_D8 => {
                let addr = Self::decode_addr(prologue);
                self.erase(addr)
            }

            opcodes::RSTEN | opcodes::RST => Ok(()),

            _ => Err(Error::SpiTransferFailed),
        }
    }

    fn set_mode(&mut self, mode: BusMode) -> Result<()> {
        self.mode = mode;
        Ok(())
    }

    fn set_manual_select(&mut self, manual: bool) -> Result<()> {
        self.manual_select = manual;
        if !manual {
            self.pending = None;
        }
        Ok(())
    }

    fn select(&mut self, asserted: bool) -> Result<()> {
        self.selected = asserted;
        if !asserted {
            self.pending = None;
        }
        Ok(())
    }
}
