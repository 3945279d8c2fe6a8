//! SPI transaction structure

/// A single blocking SPI exchange
///
/// Describes one transfer: an optional prologue phase (opcode plus encoded
/// 24-bit address and dummy slots), an optional transmit phase, and an
/// optional receive phase. Designed to avoid allocation - uses slices for
/// data, ephemeral by construction.
pub struct SpiTransaction<'a> {
    prologue: [u8; 5],
    prologue_len: usize,

    /// Data to clock out after the prologue
    pub write_data: &'a [u8],

    /// Buffer to clock data into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiTransaction<'a> {
    /// Create a bare command with no address or data (e.g., WREN, RSTEN)
    pub fn simple(opcode: u8) -> Self {
        Self {
            prologue: [opcode, 0, 0, 0, 0],
            prologue_len: 1,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR, RDID)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            prologue: [opcode, 0, 0, 0, 0],
            prologue_len: 1,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a write register command with no address (e.g., WRSR)
    pub fn write_reg(opcode: u8, data: &'a [u8]) -> Self {
        Self {
            prologue: [opcode, 0, 0, 0, 0],
            prologue_len: 1,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create a read command with 3-byte address (e.g., READ)
    pub fn read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            prologue: Self::encode(opcode, addr),
            prologue_len: 4,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a write command with 3-byte address (e.g., PP)
    pub fn write_3b(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            prologue: Self::encode(opcode, addr),
            prologue_len: 4,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create an erase command with 3-byte address
    pub fn erase_3b(opcode: u8, addr: u32) -> Self {
        Self {
            prologue: Self::encode(opcode, addr),
            prologue_len: 4,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a prologue-only exchange: opcode + 3-byte address + one dummy
    /// byte, no data phases. Used as the first half of a multi-phase
    /// dual/quad read under manual chip-select.
    pub fn header_3b_dummy(opcode: u8, addr: u32) -> Self {
        Self {
            prologue: [
                opcode,
                (addr >> 16) as u8,
                (addr >> 8) as u8,
                addr as u8,
                0x00,
            ],
            prologue_len: 5,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a prologue-only exchange without a dummy slot. Used as the
    /// first half of a quad-mode page program under manual chip-select.
    pub fn header_3b(opcode: u8, addr: u32) -> Self {
        Self {
            prologue: Self::encode(opcode, addr),
            prologue_len: 4,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a receive-only exchange (no prologue). The data phase half of
    /// a multi-phase read; chip-select must already be asserted.
    pub fn receive(buf: &'a mut [u8]) -> Self {
        Self {
            prologue: [0; 5],
            prologue_len: 0,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a transmit-only exchange (no prologue). The data phase half
    /// of a multi-phase write; chip-select must already be asserted.
    pub fn transmit(data: &'a [u8]) -> Self {
        Self {
            prologue: [0; 5],
            prologue_len: 0,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// The prologue bytes of this exchange (may be empty)
    pub fn prologue(&self) -> &[u8] {
        &self.prologue[..self.prologue_len]
    }

    /// Returns true if this exchange has a receive phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this exchange has a transmit phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Total number of bytes clocked in both directions
    pub fn total_bytes(&self) -> usize {
        self.prologue_len + self.write_data.len() + self.read_buf.len()
    }

    fn encode(opcode: u8, addr: u32) -> [u8; 5] {
        [
            opcode,
            (addr >> 16) as u8,
            (addr >> 8) as u8,
            addr as u8,
            0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prologue_encodes_24bit_address_big_endian() {
        let t = SpiTransaction::erase_3b(0xD8, 0x12_3456);
        assert_eq!(t.prologue(), &[0xD8, 0x12, 0x34, 0x56]);
    }

    #[test]
    fn header_with_dummy_appends_one_zero_byte() {
        let t = SpiTransaction::header_3b_dummy(0x6B, 0xAB_CDEF);
        assert_eq!(t.prologue(), &[0x6B, 0xAB, 0xCD, 0xEF, 0x00]);
    }

    #[test]
    fn data_only_exchanges_have_no_prologue() {
        let mut buf = [0u8; 4];
        let t = SpiTransaction::receive(&mut buf);
        assert!(t.prologue().is_empty());
        assert!(t.has_read());
        assert!(!t.has_write());
    }
}
