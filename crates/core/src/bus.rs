//! Bus pin decoding.
//!
//! The CPU core hands the trap a raw pin word once per bus cycle. This module
//! turns that word into "which address, which data byte, was it a memory
//! read or write". [`Z80Pins`] follows the pin layout used by the Z80 core:
//!
//! | Bits   | Signal            |
//! |--------|-------------------|
//! | 0–15   | Address bus A0–A15 |
//! | 16–23  | Data bus D0–D7     |
//! | 24     | M1 (opcode fetch)  |
//! | 25     | MREQ               |
//! | 26     | IORQ               |
//! | 27     | RD                 |
//! | 28     | WR                 |

/// Memory access performed during one bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusAccess {
    /// No data memory access this cycle (opcode fetch, I/O, refresh, wait)
    None,
    /// Memory read
    Read,
    /// Memory write
    Write,
}

/// Decoded view of the CPU pins for one cycle.
pub trait BusPins {
    /// Address currently on the address bus.
    fn address(&self) -> u16;
    /// Byte currently on the data bus.
    fn data(&self) -> u8;
    /// Whether this cycle is a data memory read or write.
    fn access(&self) -> BusAccess;

    /// Whether this cycle fetches an opcode byte.
    fn is_opcode_fetch(&self) -> bool {
        false
    }

    /// Whether this cycle is an I/O port read or write.
    fn io_access(&self) -> BusAccess {
        BusAccess::None
    }
}

pub const Z80_M1: u64 = 1 << 24;
pub const Z80_MREQ: u64 = 1 << 25;
pub const Z80_IORQ: u64 = 1 << 26;
pub const Z80_RD: u64 = 1 << 27;
pub const Z80_WR: u64 = 1 << 28;
/// Control pins that take part in access decoding.
pub const Z80_CTRL_PIN_MASK: u64 = Z80_M1 | Z80_MREQ | Z80_IORQ | Z80_RD | Z80_WR;

/// Z80 pin word as produced by the CPU core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Z80Pins(pub u64);

impl Z80Pins {
    /// Build a pin word for a plain memory read of `addr`.
    pub fn mem_read(addr: u16, data: u8) -> Self {
        Z80Pins(Z80_MREQ | Z80_RD | ((data as u64) << 16) | addr as u64)
    }

    /// Build a pin word for a memory write of `data` to `addr`.
    pub fn mem_write(addr: u16, data: u8) -> Self {
        Z80Pins(Z80_MREQ | Z80_WR | ((data as u64) << 16) | addr as u64)
    }

    /// Build a pin word for an opcode fetch at `addr`.
    pub fn opcode_fetch(addr: u16) -> Self {
        Z80Pins(Z80_M1 | Z80_MREQ | Z80_RD | addr as u64)
    }

    /// Build a pin word for an I/O read.
    pub fn io_read(port: u16, data: u8) -> Self {
        Z80Pins(Z80_IORQ | Z80_RD | ((data as u64) << 16) | port as u64)
    }

    /// Build a pin word for an I/O write.
    pub fn io_write(port: u16, data: u8) -> Self {
        Z80Pins(Z80_IORQ | Z80_WR | ((data as u64) << 16) | port as u64)
    }
}

impl BusPins for Z80Pins {
    #[inline(always)]
    fn address(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    #[inline(always)]
    fn data(&self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    #[inline(always)]
    fn access(&self) -> BusAccess {
        // M1 cycles also assert MREQ|RD; masking keeps fetches out of the read count
        match self.0 & Z80_CTRL_PIN_MASK {
            c if c == Z80_MREQ | Z80_RD => BusAccess::Read,
            c if c == Z80_MREQ | Z80_WR => BusAccess::Write,
            _ => BusAccess::None,
        }
    }

    #[inline(always)]
    fn is_opcode_fetch(&self) -> bool {
        self.0 & Z80_CTRL_PIN_MASK == Z80_M1 | Z80_MREQ | Z80_RD
    }

    #[inline(always)]
    fn io_access(&self) -> BusAccess {
        // M1|IORQ is an interrupt acknowledge, not a port access
        match self.0 & Z80_CTRL_PIN_MASK {
            c if c == Z80_IORQ | Z80_RD => BusAccess::Read,
            c if c == Z80_IORQ | Z80_WR => BusAccess::Write,
            _ => BusAccess::None,
        }
    }
}
