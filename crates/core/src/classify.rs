//! Memory-use classification.
//!
//! Turns the raw access counters into a run-length partition of the 64K
//! space (code / data / unknown) plus the list of self-modified addresses,
//! i.e. addresses that were both executed and written.
//!
//! Results are a snapshot of the counters at the time [`MemoryAnalysis::analyze`]
//! ran; later execution is not reflected until it is called again.

use crate::counters::AccessCounters;

/// How an address has been used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUse {
    /// Executed at least once
    Code,
    /// Read or written but never executed
    Data,
    /// Never touched
    Unknown,
}

/// A maximal run of addresses with the same use (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBlock {
    pub start: u16,
    pub end: u16,
    pub usage: MemoryUse,
}

impl MemoryBlock {
    /// Number of addresses in the block.
    pub fn size(&self) -> usize { (self.end - self.start) as usize + 1 }
    pub fn contains(&self, addr: u16) -> bool { addr >= self.start && addr <= self.end }
}

/// Classify one address. The flag is set when the address is self-modified.
#[inline]
pub fn classify_address(counters: &AccessCounters, addr: u16) -> (MemoryUse, bool) {
    let exec = counters.exec_count(addr);
    let write = counters.write_count(addr);
    if exec > 0 {
        (MemoryUse::Code, write > 0)
    } else if write > 0 || counters.read_count(addr) > 0 {
        (MemoryUse::Data, false)
    } else {
        (MemoryUse::Unknown, false)
    }
}

/// Block list and self-modified list from the last analysis pass.
#[derive(Debug, Default)]
pub struct MemoryAnalysis {
    blocks: Vec<MemoryBlock>,
    self_modified: Vec<u16>,
}

impl MemoryAnalysis {
    pub fn new() -> Self {
        MemoryAnalysis { blocks: Vec::new(), self_modified: Vec::new() }
    }

    /// Rebuild both lists from `counters` in one pass over the address space.
    pub fn analyze(&mut self, counters: &AccessCounters) {
        self.blocks.clear();
        self.self_modified.clear();

        let (first, smc) = classify_address(counters, 0);
        if smc {
            self.self_modified.push(0);
        }
        let mut current = MemoryBlock { start: 0, end: 0, usage: first };

        for addr in 1..=u16::MAX {
            let (usage, smc) = classify_address(counters, addr);
            if smc {
                self.self_modified.push(addr);
            }
            if usage != current.usage {
                current.end = addr - 1;
                self.blocks.push(current);
                current = MemoryBlock { start: addr, end: addr, usage };
            }
        }
        current.end = u16::MAX;
        self.blocks.push(current);

        log::info!(
            "memory analysis: {} blocks ({} code bytes, {} data bytes), {} self-modified",
            self.blocks.len(),
            self.total(MemoryUse::Code),
            self.total(MemoryUse::Data),
            self.self_modified.len()
        );
    }

    pub fn blocks(&self) -> &[MemoryBlock] { &self.blocks }
    pub fn self_modified(&self) -> &[u16] { &self.self_modified }

    /// Block containing `addr`, if an analysis has been run.
    pub fn block_at(&self, addr: u16) -> Option<&MemoryBlock> {
        let i = self.blocks.partition_point(|b| b.end < addr);
        self.blocks.get(i)
    }

    /// Total addresses classified as `usage`.
    pub fn total(&self, usage: MemoryUse) -> usize {
        self.blocks.iter().filter(|b| b.usage == usage).map(|b| b.size()).sum()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.self_modified.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_partition(blocks: &[MemoryBlock]) {
        assert_eq!(blocks[0].start, 0);
        assert_eq!(blocks[blocks.len() - 1].end, 0xFFFF);
        for w in blocks.windows(2) {
            assert_eq!(w[0].end as u32 + 1, w[1].start as u32);
            assert_ne!(w[0].usage, w[1].usage);
            assert!(w[0].start <= w[0].end);
        }
    }

    #[test]
    fn test_untouched_is_unknown() {
        let c = AccessCounters::new();
        assert_eq!(classify_address(&c, 0x1234), (MemoryUse::Unknown, false));

        let mut a = MemoryAnalysis::new();
        a.analyze(&c);
        assert_eq!(a.blocks(), &[MemoryBlock { start: 0, end: 0xFFFF, usage: MemoryUse::Unknown }]);
        assert!(a.self_modified().is_empty());
    }

    #[test]
    fn test_classify_priority() {
        let mut c = AccessCounters::new();
        c.record_read(0x10);
        c.record_write(0x11);
        c.record_execute(0x12, 1);
        c.record_execute(0x13, 1);
        c.record_write(0x13);
        assert_eq!(classify_address(&c, 0x10), (MemoryUse::Data, false));
        assert_eq!(classify_address(&c, 0x11), (MemoryUse::Data, false));
        assert_eq!(classify_address(&c, 0x12), (MemoryUse::Code, false));
        assert_eq!(classify_address(&c, 0x13), (MemoryUse::Code, true));
    }

    #[test]
    fn test_blocks_partition_and_smc() {
        let mut c = AccessCounters::new();
        c.record_execute(0x0000, 3);
        c.record_write(0x0001);
        c.record_execute(0x8000, 4);
        c.record_write(0x8003);
        c.record_read(0x9000);
        c.record_write(0xFFFF);

        let mut a = MemoryAnalysis::new();
        a.analyze(&c);
        check_partition(a.blocks());
        assert_eq!(a.self_modified(), &[0x0001, 0x8003]);

        assert_eq!(a.blocks()[0], MemoryBlock { start: 0, end: 2, usage: MemoryUse::Code });
        assert_eq!(a.block_at(0x8002).unwrap().usage, MemoryUse::Code);
        assert_eq!(a.block_at(0x9000).unwrap().usage, MemoryUse::Data);
        assert_eq!(a.block_at(0xFFFF).unwrap().usage, MemoryUse::Data);
        assert_eq!(a.total(MemoryUse::Code), 7);

        // idempotent
        let before = a.blocks().to_vec();
        a.analyze(&c);
        assert_eq!(a.blocks(), &before[..]);
    }
}
