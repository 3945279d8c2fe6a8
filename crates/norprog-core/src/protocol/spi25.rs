//! SPI25 protocol implementation
//!
//! This module implements the flash command sequences this engine issues:
//! status polling and write-enable handshakes, the software reset sequence,
//! and the mode-specific read/write primitives.
//!
//! Every timeout here is an iteration count rather than a wall-clock
//! duration, so worst-case bus-busy behavior is identical across hosts and
//! tests can shrink the bound to exercise timeout paths quickly.
//!
//! ## Multi-phase sequences
//!
//! A dual/quad transfer clocks its prologue in single-bit mode and only the
//! data phase in dual/quad, so it spans several exchanges under manual
//! chip-select. Those sequences hold a [`BusStateGuard`] for their duration:
//! whatever happens mid-sequence, chip-select is deasserted and the
//! transceiver reverts to single-bit auto-select mode before the primitive
//! returns.

use crate::error::{Error, Result};
use crate::spi::{
    check_mode_supported, opcodes, BusMode, BusStateGuard, SpiBus, SpiTransaction,
};

/// Default bound on busy polls
///
/// Iteration count, not wall-clock; the sole timeout mechanism in the
/// driver.
pub const DEFAULT_BUSY_LIMIT: u32 = 4095;

/// Read the JEDEC ID from a flash chip
///
/// Returns (manufacturer_id, device_id) on success.
pub fn read_jedec_id<B: SpiBus + ?Sized>(bus: &mut B) -> Result<(u8, u16)> {
    let mut buf = [0u8; 3];
    bus.transceive(&mut SpiTransaction::read_reg(opcodes::RDID, &mut buf))?;

    let manufacturer = buf[0];
    let device = ((buf[1] as u16) << 8) | (buf[2] as u16);

    Ok((manufacturer, device))
}

/// Read the status register 1
pub fn read_status1<B: SpiBus + ?Sized>(bus: &mut B) -> Result<u8> {
    let mut buf = [0u8; 1];
    bus.transceive(&mut SpiTransaction::read_reg(opcodes::RDSR, &mut buf))?;
    Ok(buf[0])
}

/// Read the status register 2
pub fn read_status2<B: SpiBus + ?Sized>(bus: &mut B) -> Result<u8> {
    let mut buf = [0u8; 1];
    bus.transceive(&mut SpiTransaction::read_reg(opcodes::RDSR2, &mut buf))?;
    Ok(buf[0])
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// Polls the status register up to `limit` times and returns promptly on
/// the first clear read. Returns [`Error::BusyTimeout`] if the bit never
/// clears within the budget.
pub fn busy_wait<B: SpiBus + ?Sized>(bus: &mut B, limit: u32) -> Result<()> {
    for _ in 0..limit {
        let status = read_status1(bus)?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(());
        }
    }

    Err(Error::BusyTimeout)
}

/// Arm the chip for a write or erase
///
/// Waits not-busy, sends WREN, waits not-busy again, then asserts that the
/// Write Enable Latch actually set. Failure at any step is a hard failure
/// for the caller.
pub fn write_enable<B: SpiBus + ?Sized>(bus: &mut B, limit: u32) -> Result<()> {
    busy_wait(bus, limit)?;
    bus.transceive(&mut SpiTransaction::simple(opcodes::WREN))?;
    busy_wait(bus, limit)?;

    let status = read_status1(bus)?;
    if status & opcodes::SR1_WEL == 0 {
        return Err(Error::WriteEnableFailed);
    }
    Ok(())
}

/// Write the status register 1
///
/// Sends WREN first and verifies the latch cleared once the write
/// completed.
pub fn write_status1<B: SpiBus + ?Sized>(bus: &mut B, value: u8, limit: u32) -> Result<()> {
    write_enable(bus, limit)?;
    let data = [value];
    bus.transceive(&mut SpiTransaction::write_reg(opcodes::WRSR, &data))?;
    busy_wait(bus, limit)?;

    let status = read_status1(bus)?;
    if status & opcodes::SR1_WEL != 0 {
        return Err(Error::StatusWriteFailed);
    }
    Ok(())
}

/// Write the status register 2
///
/// Same WREN/latch-clear handshake as [`write_status1`].
pub fn write_status2<B: SpiBus + ?Sized>(bus: &mut B, value: u8, limit: u32) -> Result<()> {
    write_enable(bus, limit)?;
    let data = [value];
    bus.transceive(&mut SpiTransaction::write_reg(opcodes::WRSR2, &data))?;
    busy_wait(bus, limit)?;

    let status = read_status1(bus)?;
    if status & opcodes::SR1_WEL != 0 {
        return Err(Error::StatusWriteFailed);
    }
    Ok(())
}

/// Software reset sequence
///
/// Issues reset-enable and reset-device back-to-back, spins `reset_spin`
/// iterations to span the chip's minimum reset pulse width (no command is
/// accepted during that interval, so a status poll cannot work), waits
/// not-busy, then explicitly clears status register 2 so a quad-enable bit
/// dangling from a prior failed quad attempt cannot survive the reset.
///
/// Returns [`Error::QuadEnableStuck`] if the quad-enable bit still reads
/// set after the explicit clear. Nothing is recoverable at that point short
/// of a power cycle.
pub fn reset<B: SpiBus + ?Sized>(bus: &mut B, reset_spin: u32, limit: u32) -> Result<()> {
    bus.transceive(&mut SpiTransaction::simple(opcodes::RSTEN))?;
    bus.transceive(&mut SpiTransaction::simple(opcodes::RST))?;

    for _ in 0..reset_spin {
        core::hint::spin_loop();
    }

    busy_wait(bus, limit)?;
    write_status2(bus, 0, limit)?;

    let sr2 = read_status2(bus)?;
    if sr2 & opcodes::SR2_QE != 0 {
        log::error!("quad enable bit stuck set after explicit clear");
        return Err(Error::QuadEnableStuck);
    }
    Ok(())
}

/// Read data in single-bit mode (READ, one 4-byte prologue)
pub fn read_single<B: SpiBus + ?Sized>(
    bus: &mut B,
    addr: u32,
    buf: &mut [u8],
    limit: u32,
) -> Result<()> {
    busy_wait(bus, limit)?;
    bus.transceive(&mut SpiTransaction::read_3b(opcodes::READ, addr, buf))
}

/// Read data in dual output mode (DOR, data phase on two lines)
pub fn read_dual<B: SpiBus + ?Sized>(
    bus: &mut B,
    addr: u32,
    buf: &mut [u8],
    limit: u32,
) -> Result<()> {
    check_mode_supported(BusMode::DualRx, bus.features())?;
    read_multi(bus, opcodes::DOR, BusMode::DualRx, addr, buf, limit)
}

/// Read data in quad output mode (QOR, data phase on four lines)
///
/// Transiently sets the quad-enable bit; it is cleared again before this
/// function returns, on every path.
pub fn read_quad<B: SpiBus + ?Sized>(
    bus: &mut B,
    addr: u32,
    buf: &mut [u8],
    limit: u32,
) -> Result<()> {
    check_mode_supported(BusMode::QuadRx, bus.features())?;
    write_status2(bus, opcodes::SR2_QE, limit)?;
    let result = read_multi(bus, opcodes::QOR, BusMode::QuadRx, addr, buf, limit);
    finish_quad(bus, result, limit)
}

/// Program a page in single-bit mode (PP)
pub fn write_single<B: SpiBus + ?Sized>(
    bus: &mut B,
    addr: u32,
    data: &[u8],
    limit: u32,
) -> Result<()> {
    write_enable(bus, limit)?;
    bus.transceive(&mut SpiTransaction::write_3b(opcodes::PP, addr, data))?;
    busy_wait(bus, limit)
}

/// Program a page in quad mode (QPP, data phase on four lines)
///
/// Prologue goes out in single-bit mode under manual chip-select, the data
/// phase in quad-transmit; both the transceiver mode and the quad-enable
/// bit are reverted unconditionally before returning.
pub fn write_quad<B: SpiBus + ?Sized>(
    bus: &mut B,
    addr: u32,
    data: &[u8],
    limit: u32,
) -> Result<()> {
    check_mode_supported(BusMode::QuadTx, bus.features())?;
    write_status2(bus, opcodes::SR2_QE, limit)?;
    let result = write_quad_inner(bus, addr, data, limit);
    finish_quad(bus, result, limit)
}

/// Erase the 64 KiB block containing `addr`
pub fn erase_sector<B: SpiBus + ?Sized>(bus: &mut B, addr: u32, limit: u32) -> Result<()> {
    let run = |bus: &mut B| -> Result<()> {
        write_enable(bus, limit)?;
        bus.transceive(&mut SpiTransaction::erase_3b(opcodes::BE_D8, addr))?;
        busy_wait(bus, limit)
    };
    run(bus).map_err(|e| {
        log::debug!("sector erase at 0x{:06X} failed: {}", addr, e);
        Error::EraseFailed { addr }
    })
}

/// Prologue in single-bit mode, data phase in `mode`, one dummy byte
/// between address and data per the dual/quad read protocol.
fn read_multi<B: SpiBus + ?Sized>(
    bus: &mut B,
    opcode: u8,
    mode: BusMode,
    addr: u32,
    buf: &mut [u8],
    limit: u32,
) -> Result<()> {
    busy_wait(bus, limit)?;

    let mut guard = BusStateGuard::manual_select(bus)?;
    let bus = guard.bus();
    bus.select(true)?;
    bus.transceive(&mut SpiTransaction::header_3b_dummy(opcode, addr))?;
    bus.set_mode(mode)?;
    bus.transceive(&mut SpiTransaction::receive(buf))?;
    Ok(())
    // guard drop deselects and restores single-bit auto-select mode
}

fn write_quad_inner<B: SpiBus + ?Sized>(
    bus: &mut B,
    addr: u32,
    data: &[u8],
    limit: u32,
) -> Result<()> {
    write_enable(bus, limit)?;

    {
        let mut guard = BusStateGuard::manual_select(&mut *bus)?;
        let bus = guard.bus();
        bus.select(true)?;
        bus.transceive(&mut SpiTransaction::header_3b(opcodes::QPP, addr))?;
        bus.set_mode(BusMode::QuadTx)?;
        bus.transceive(&mut SpiTransaction::transmit(data))?;
    }

    // Programming starts on deselect
    busy_wait(bus, limit)
}

/// Clear the quad-enable bit after a quad transaction, then merge the
/// outcome. The clear runs even when the transaction already failed; QE
/// must never remain set outside an active quad transfer.
fn finish_quad<B: SpiBus + ?Sized>(bus: &mut B, result: Result<()>, limit: u32) -> Result<()> {
    match write_status2(bus, 0, limit) {
        Ok(()) => result,
        Err(e) => {
            log::warn!("failed to clear quad enable after transaction: {}", e);
            result.and(Err(e))
        }
    }
}
