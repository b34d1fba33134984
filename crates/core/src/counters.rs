//! Per-address access tallies.
//!
//! Three flat tables, one slot per address of the 64K space:
//!
//! | Table   | Incremented when                                        |
//! |---------|---------------------------------------------------------|
//! | `exec`  | an instruction whose footprint covers the address runs  |
//! | `read`  | a data memory read targets the address                  |
//! | `write` | a data memory write targets the address                 |
//!
//! Counts saturate at `u32::MAX` so they never decrease between resets.

use crate::ADDRESS_SPACE;

/// Execute/read/write counts for every address.
pub struct AccessCounters {
    exec: Box<[u32]>,
    read: Box<[u32]>,
    write: Box<[u32]>,
}

impl AccessCounters {
    pub fn new() -> Self {
        AccessCounters {
            exec: vec![0; ADDRESS_SPACE].into_boxed_slice(),
            read: vec![0; ADDRESS_SPACE].into_boxed_slice(),
            write: vec![0; ADDRESS_SPACE].into_boxed_slice(),
        }
    }

    /// Count an instruction of `len` bytes at `pc`. The footprint wraps at 0xFFFF.
    #[inline]
    pub fn record_execute(&mut self, pc: u16, len: u8) {
        for i in 0..len.max(1) as u16 {
            let a = pc.wrapping_add(i) as usize;
            self.exec[a] = self.exec[a].saturating_add(1);
        }
    }

    #[inline]
    pub fn record_read(&mut self, addr: u16) {
        let a = addr as usize;
        self.read[a] = self.read[a].saturating_add(1);
    }

    #[inline]
    pub fn record_write(&mut self, addr: u16) {
        let a = addr as usize;
        self.write[a] = self.write[a].saturating_add(1);
    }

    #[inline]
    pub fn exec_count(&self, addr: u16) -> u32 { self.exec[addr as usize] }
    #[inline]
    pub fn read_count(&self, addr: u16) -> u32 { self.read[addr as usize] }
    #[inline]
    pub fn write_count(&self, addr: u16) -> u32 { self.write[addr as usize] }

    /// Zero all three tables.
    pub fn reset(&mut self) {
        self.exec.fill(0);
        self.read.fill(0);
        self.write.fill(0);
    }
}

impl Default for AccessCounters {
    fn default() -> Self { Self::new() }
}
