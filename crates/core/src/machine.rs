//! Live machine model as seen by the snapshot engine.
//!
//! The emulator core owns registers and RAM; it exposes them through the
//! [`Machine`] trait so frames can be captured and restored without this
//! crate knowing how the core lays its state out internally.
//!
//! Banking follows the Spectrum 128K paging register (port 0x7FFD):
//!
//! | Bit | Meaning                                  |
//! |-----|------------------------------------------|
//! | 0–2 | RAM bank paged at 0xC000                 |
//! | 3   | Screen bank for scanout (0 = 5, 1 = 7)   |
//! | 4   | ROM select (0 = ROM0, 1 = ROM1)          |
//! | 5   | Paging lock                              |

use serde::{Deserialize, Serialize};

use crate::BANK_SIZE;

/// Machine variant, which fixes the number of RAM banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineVariant {
    /// 48K: three fixed banks at 0x4000, 0x8000 and 0xC000
    Spectrum48k,
    /// 128K: eight pageable banks
    Spectrum128k,
}

impl MachineVariant {
    /// Number of 16K RAM banks for this variant.
    pub fn ram_bank_count(self) -> usize {
        match self {
            MachineVariant::Spectrum48k => 3,
            MachineVariant::Spectrum128k => 8,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            MachineVariant::Spectrum48k => 0,
            MachineVariant::Spectrum128k => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MachineVariant::Spectrum48k),
            1 => Some(MachineVariant::Spectrum128k),
            _ => None,
        }
    }
}

/// Z80 register file plus the cycle counter.
///
/// Alternate registers carry a trailing `_alt`. `wz` is the internal MEMPTR
/// register, kept so restored execution is bit-exact with the recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuState {
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub af_alt: u16,
    pub bc_alt: u16,
    pub de_alt: u16,
    pub hl_alt: u16,
    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    pub wz: u16,
    pub i: u8,
    pub r: u8,
    /// Interrupt mode (0, 1 or 2)
    pub im: u8,
    pub iff1: bool,
    pub iff2: bool,
    pub halted: bool,
    /// Monotonic T-state counter
    pub ticks: u64,
}

/// Memory mapping derived from the 128K bank-select register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankMapping {
    /// Raw register value the mapping was derived from
    pub bank_select: u8,
    /// RAM bank used for screen scanout (5 or 7)
    pub display_bank: u8,
    /// RAM bank visible at 0xC000
    pub paged_bank: u8,
    /// ROM visible at 0x0000
    pub rom_bank: u8,
}

impl BankMapping {
    /// Decode a 0x7FFD register value.
    pub fn from_register(value: u8) -> Self {
        BankMapping {
            bank_select: value,
            display_bank: if value & (1 << 3) != 0 { 7 } else { 5 },
            paged_bank: value & 0x07,
            rom_bank: if value & (1 << 4) != 0 { 1 } else { 0 },
        }
    }
}

/// Live machine state that can be captured into and restored from a frame.
pub trait Machine {
    fn variant(&self) -> MachineVariant;

    fn cpu_state(&self) -> CpuState;
    fn set_cpu_state(&mut self, state: &CpuState);

    /// RAM bank `bank` (`0..variant().ram_bank_count()`), [`BANK_SIZE`] bytes.
    fn ram_bank(&self, bank: usize) -> &[u8];
    fn ram_bank_mut(&mut self, bank: usize) -> &mut [u8];

    /// Last value written to the bank-select register (0 on 48K).
    fn bank_select(&self) -> u8;

    /// Reprogram the memory map from a restored bank-select register.
    ///
    /// Only called for variants with paging.
    fn apply_bank_mapping(&mut self, mapping: &BankMapping);

    /// Read a byte through the current memory map, without side effects.
    fn read_byte(&self, addr: u16) -> u8;
}

/// CPU address of the start of RAM bank `bank` on the 48K layout.
pub fn bank_base_48k(bank: u8) -> u16 {
    (BANK_SIZE as u16).wrapping_mul(bank as u16 + 1)
}

/// CPU address at which 128K RAM bank `bank` is visible.
///
/// Banks 5 and 2 are fixed at 0x4000 and 0x8000; every other bank can only
/// appear in the 0xC000 paging window.
pub fn bank_base_128k(bank: u8) -> u16 {
    match bank {
        5 => 0x4000,
        2 => 0x8000,
        _ => 0xC000,
    }
}
