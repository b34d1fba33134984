//! Frame summaries for presentation.
//!
//! - **Overview**: collapses an instruction trace into the sequence of
//!   labelled routines that ran, in order
//! - **Diff**: every RAM byte that differs between two frames

use crate::analysis::{AddressRef, CodeInfo, LabelKind};
use crate::machine::{bank_base_128k, bank_base_48k, MachineVariant};
use crate::ring::FrameSnapshot;

/// One routine in a frame overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewItem {
    /// Function label text
    pub label: String,
    /// Nearest code label at or below the traced address, or the function
    /// address when there is none between them
    pub label_address: u16,
    pub function_address: u16,
}

/// A byte that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryDiff {
    /// CPU address the byte is visible at
    pub address: u16,
    /// RAM bank, `None` for diffs against live memory
    pub bank: Option<u8>,
    pub old_value: u8,
    pub new_value: u8,
}

/// Build the overview of `trace` into `out` (cleared first).
pub fn overview<C: CodeInfo + ?Sized>(trace: &[AddressRef], code: &C, out: &mut Vec<OverviewItem>) {
    out.clear();
    for inst in trace {
        let mut code_label: Option<u16> = None;
        for addr in (0..=inst.address).rev() {
            let Some(label) = code.label_at(addr) else { continue };
            match label.kind {
                LabelKind::Code => {
                    code_label.get_or_insert(addr);
                }
                LabelKind::Function => {
                    if out.last().map(|p| p.function_address) != Some(addr) {
                        out.push(OverviewItem {
                            label: label.name.clone(),
                            label_address: code_label.unwrap_or(addr),
                            function_address: addr,
                        });
                    }
                    break;
                }
                LabelKind::Data | LabelKind::Text => {}
            }
        }
    }
}

/// CPU address at which offset 0 of `bank` appears for `variant`.
pub fn bank_base(variant: MachineVariant, bank: u8) -> u16 {
    match variant {
        MachineVariant::Spectrum48k => bank_base_48k(bank),
        MachineVariant::Spectrum128k => bank_base_128k(bank),
    }
}

/// Append every RAM byte that differs between `old` and `new` to `out`
/// (cleared first). Only banks present in both frames are compared.
pub fn diff_frames(old: &FrameSnapshot, new: &FrameSnapshot, out: &mut Vec<MemoryDiff>) {
    out.clear();
    let banks = old.bank_count().min(new.bank_count());
    for bank in 0..banks {
        let (Some(a), Some(b)) = (old.bank(bank), new.bank(bank)) else { continue };
        let base = bank_base(new.variant(), bank as u8);
        for (offset, (&o, &n)) in a.iter().zip(b.iter()).enumerate() {
            if o != n {
                out.push(MemoryDiff {
                    address: base.wrapping_add(offset as u16),
                    bank: Some(bank as u8),
                    old_value: o,
                    new_value: n,
                });
            }
        }
    }
}

/// Compare `snapshot` (a full 64K copy) against `live` from `start` to 0xFFFF.
pub fn diff_memory(snapshot: &[u8], start: u16, live: impl Fn(u16) -> u8, out: &mut Vec<MemoryDiff>) {
    out.clear();
    for addr in start..=u16::MAX {
        let Some(&old) = snapshot.get(addr as usize) else { break };
        let new = live(addr);
        if old != new {
            out.push(MemoryDiff { address: addr, bank: None, old_value: old, new_value: new });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Label;
    use std::collections::HashMap;

    struct Labels(HashMap<u16, Label>);

    impl CodeInfo for Labels {
        fn instruction_len(&self, _pc: u16) -> Option<u8> { Some(1) }
        fn label_at(&self, addr: u16) -> Option<&Label> { self.0.get(&addr) }
    }

    fn labels() -> Labels {
        let mut m = HashMap::new();
        m.insert(0x8000, Label::new("main", LabelKind::Function));
        m.insert(0x8010, Label::new("main_loop", LabelKind::Code));
        m.insert(0x8018, Label::new("scratch", LabelKind::Data));
        m.insert(0x9000, Label::new("draw", LabelKind::Function));
        Labels(m)
    }

    fn trace(addrs: &[u16]) -> Vec<AddressRef> {
        addrs.iter().map(|&a| AddressRef::new(a)).collect()
    }

    #[test]
    fn test_overview_merges_consecutive() {
        let mut out = Vec::new();
        overview(&trace(&[0x8001, 0x8012, 0x8020, 0x9004, 0x9005, 0x8003]), &labels(), &mut out);
        let funcs: Vec<u16> = out.iter().map(|o| o.function_address).collect();
        assert_eq!(funcs, vec![0x8000, 0x9000, 0x8000]);
        assert_eq!(out[0].label, "main");
        assert_eq!(out[0].label_address, 0x8000);
        assert_eq!(out[1].label, "draw");
    }

    #[test]
    fn test_overview_uses_nearest_code_label() {
        let mut out = Vec::new();
        overview(&trace(&[0x8014]), &labels(), &mut out);
        assert_eq!(out, vec![OverviewItem {
            label: "main".into(),
            label_address: 0x8010,
            function_address: 0x8000,
        }]);
    }

    #[test]
    fn test_overview_skips_unlabelled() {
        let mut out = Vec::new();
        overview(&trace(&[0x0100, 0x7FFF]), &labels(), &mut out);
        assert!(out.is_empty());
    }

    fn frame(variant: MachineVariant) -> FrameSnapshot {
        let mut f = FrameSnapshot::new(4, 0);
        f.variant = variant;
        f.bank_count = variant.ram_bank_count();
        f.captured = true;
        f
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let a = frame(MachineVariant::Spectrum48k);
        let b = a.clone();
        let mut out = vec![MemoryDiff { address: 0, bank: None, old_value: 0, new_value: 1 }];
        diff_frames(&a, &b, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_diff_48k_two_bytes() {
        let mut a = frame(MachineVariant::Spectrum48k);
        a.bank_mut(0)[0] = 1; // 0x4000
        a.bank_mut(1)[0] = 9; // 0x8000
        let mut b = a.clone();
        b.bank_mut(0)[0] = 2;
        b.bank_mut(1)[0] = 0;

        let mut out = Vec::new();
        diff_frames(&a, &b, &mut out);
        assert_eq!(out, vec![
            MemoryDiff { address: 0x4000, bank: Some(0), old_value: 1, new_value: 2 },
            MemoryDiff { address: 0x8000, bank: Some(1), old_value: 9, new_value: 0 },
        ]);
    }

    #[test]
    fn test_diff_128k_addresses() {
        let a = frame(MachineVariant::Spectrum128k);
        let mut b = a.clone();
        b.bank_mut(5)[0x10] = 1;
        b.bank_mut(2)[0] = 1;
        b.bank_mut(7)[0x3FFF] = 1;

        let mut out = Vec::new();
        diff_frames(&a, &b, &mut out);
        let addrs: Vec<(u16, Option<u8>)> = out.iter().map(|d| (d.address, d.bank)).collect();
        assert_eq!(addrs, vec![(0x8000, Some(2)), (0x4010, Some(5)), (0xFFFF, Some(7))]);
    }

    #[test]
    fn test_diff_memory_start() {
        let snap = vec![0u8; 0x10000];
        let live = |addr: u16| -> u8 { if addr == 0x4000 || addr == 0x6000 { 1 } else { 0 } };
        let mut out = Vec::new();
        diff_memory(&snap, 0x5C00, live, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].address, 0x6000);
        diff_memory(&snap, 0x4000, live, &mut out);
        assert_eq!(out.len(), 2);
    }
}
