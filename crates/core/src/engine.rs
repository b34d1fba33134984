//! Capture and restore of frames against the live machine.
//!
//! The engine owns the [`FrameTraceRing`] and the live-memory diff snapshot.
//! Once per rendered frame the host calls [`SnapshotEngine::capture`]; while
//! stepping is paused it may scrub back through the ring, inspect per-frame
//! overviews and diffs, restore a frame, or resume execution from one.
//!
//! | Variant | Banks copied | Mapping rebuilt on restore            |
//! |---------|--------------|---------------------------------------|
//! | 48K     | 3            | none (fixed layout)                   |
//! | 128K    | 8            | display, 0xC000 page and ROM from 0x7FFD |

use crate::analysis::{BankObserver, CodeInfo};
use crate::config::TraceConfig;
use crate::error::{Result, TraceError};
use crate::machine::{BankMapping, Machine, MachineVariant};
use crate::recorder::TraceSource;
use crate::ring::{FrameSnapshot, FrameTraceRing};
use crate::savestate;
use crate::summary::{self, MemoryDiff, OverviewItem};
use crate::{ADDRESS_SPACE, BANK_SIZE, MAX_RAM_BANKS};

pub struct SnapshotEngine {
    ring: FrameTraceRing,
    /// Full 64K copy taken by [`SnapshotEngine::take_diff_snapshot`]
    diff_snapshot: Option<Box<[u8]>>,
    live_diff: Vec<MemoryDiff>,
    /// First address compared by the live diff
    pub diff_start: u16,
    /// Number given to the next captured frame; never reused
    frame_counter: u64,
    /// Frame the next capture follows
    last_frame: Option<u64>,
}

impl SnapshotEngine {
    pub fn new(config: &TraceConfig) -> Self {
        SnapshotEngine {
            ring: FrameTraceRing::new(config.capacity, config.frame_pixels(), config.trace_capacity_hint),
            diff_snapshot: None,
            live_diff: Vec::new(),
            diff_start: config.diff_start(),
            frame_counter: 0,
            last_frame: None,
        }
    }

    pub fn ring(&self) -> &FrameTraceRing { &self.ring }
    pub fn frame_counter(&self) -> u64 { self.frame_counter }

    // ─── Capture / restore ──────────────────────────────────────────────────

    /// Capture the frame that just finished into the slot at the cursor and
    /// advance. `traces` is drained. Returns the slot written.
    pub fn capture<M, T>(&mut self, machine: &M, traces: &mut T, image: &[u32]) -> usize
    where
        M: Machine + ?Sized,
        T: TraceSource + ?Sized,
    {
        let slot_idx = self.ring.cursor();
        let frame_number = self.next_frame_number();

        let slot = self.ring.current_mut();

        let n = slot.image.len().min(image.len());
        slot.image[..n].copy_from_slice(&image[..n]);
        slot.image[n..].fill(0);

        slot.instructions.clear();
        traces.drain_instructions(&mut slot.instructions);
        slot.events.clear();
        traces.drain_events(&mut slot.events);
        slot.screen_writes.clear();
        traces.drain_screen_writes(&mut slot.screen_writes);

        slot.cpu = machine.cpu_state();

        let variant = machine.variant();
        let banks = variant.ram_bank_count().min(MAX_RAM_BANKS);
        for bank in 0..banks {
            let src = machine.ram_bank(bank);
            let dst = slot.bank_mut(bank);
            let n = src.len().min(BANK_SIZE);
            dst[..n].copy_from_slice(&src[..n]);
        }
        slot.bank_count = banks;
        slot.bank_select = machine.bank_select();
        slot.variant = variant;
        slot.frame_number = frame_number;
        slot.prev_frame = self.last_frame.replace(frame_number);
        slot.invalidate_caches();
        slot.captured = true;

        self.ring.invalidate_successor_diff(slot_idx);
        self.ring.advance();
        log::debug!(
            "captured frame {} into slot {} ({} instructions)",
            frame_number,
            slot_idx,
            self.ring.slot(slot_idx).map(|s| s.instructions.len()).unwrap_or(0)
        );
        slot_idx
    }

    /// Write the state in ring slot `slot` back into `machine`.
    ///
    /// On 128K the bank-select register is re-applied and `observer` learns
    /// the ROM and 0xC000 bank now mapped. Fails, leaving `machine`
    /// untouched, if the slot was never captured or was taken on another
    /// machine variant.
    pub fn restore<M, O>(&self, slot: usize, machine: &mut M, observer: &mut O) -> Result<()>
    where
        M: Machine + ?Sized,
        O: BankObserver + ?Sized,
    {
        let snap = match self.ring.captured(slot) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("restore rejected: {}", e);
                return Err(e);
            }
        };
        if snap.variant != machine.variant() {
            let e = TraceError::VariantMismatch { snapshot: snap.variant, machine: machine.variant() };
            log::warn!("restore rejected: {}", e);
            return Err(e);
        }

        machine.set_cpu_state(&snap.cpu);
        for bank in 0..snap.bank_count {
            let Some(src) = snap.bank(bank) else { break };
            let dst = machine.ram_bank_mut(bank);
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
        }

        if snap.variant == MachineVariant::Spectrum128k {
            let mapping = BankMapping::from_register(snap.bank_select);
            machine.apply_bank_mapping(&mapping);
            observer.set_rom_bank(mapping.rom_bank);
            observer.set_ram_bank(3, mapping.paged_bank);
        }

        log::info!("restored frame {} from slot {}", snap.frame_number, slot);
        Ok(())
    }

    /// Restore the frame `offset` frames back (clamped). Returns its slot.
    pub fn restore_offset<M, O>(&self, offset: isize, machine: &mut M, observer: &mut O) -> Result<usize>
    where
        M: Machine + ?Sized,
        O: BankObserver + ?Sized,
    {
        let slot = self.ring.slot_for_offset(offset);
        self.restore(slot, machine, observer)?;
        Ok(slot)
    }

    /// Restore the frame `offset` frames back and continue recording from it.
    ///
    /// The restored frame becomes the most recent one: the next capture goes
    /// into the slot after it and follows it. Slots holding later frames are
    /// left in place until they are overwritten. Frame numbers keep counting
    /// up, so new captures never share a number with a frame still held.
    pub fn resume_from<M, O>(&mut self, offset: isize, machine: &mut M, observer: &mut O) -> Result<usize>
    where
        M: Machine + ?Sized,
        O: BankObserver + ?Sized,
    {
        let slot = self.restore_offset(offset, machine, observer)?;
        let frame_number = self.ring.slot(slot)?.frame_number;
        self.ring.set_cursor(slot + 1);
        self.last_frame = Some(frame_number);
        log::info!("resuming after frame {}", frame_number);
        Ok(slot)
    }

    // ─── Inspection ─────────────────────────────────────────────────────────

    /// Captured frame `offset` frames back.
    pub fn frame(&self, offset: isize) -> Result<&FrameSnapshot> {
        self.ring.captured(self.ring.slot_for_offset(offset))
    }

    /// Routine overview of the frame `offset` frames back, cached per slot.
    pub fn frame_overview<C: CodeInfo + ?Sized>(&mut self, offset: isize, code: &C) -> Result<&[OverviewItem]> {
        let slot = self.ring.slot_for_offset(offset);
        self.ring.captured(slot)?;
        let snap = self.ring.slot_mut(slot)?;
        if !snap.overview_valid {
            summary::overview(&snap.instructions, code, &mut snap.overview);
            snap.overview_valid = true;
        }
        Ok(&snap.overview)
    }

    /// Bytes changed during the frame `offset` frames back, relative to the
    /// frame captured just before it. Empty when that frame is no longer held.
    pub fn frame_diff(&mut self, offset: isize) -> Result<&[MemoryDiff]> {
        let slot = self.ring.slot_for_offset(offset);
        if !self.ring.captured(slot)?.diff_valid {
            let mut diff = std::mem::take(&mut self.ring.slot_mut(slot)?.diff);
            match self.ring.predecessor(slot) {
                Some(prev) => summary::diff_frames(self.ring.slot(prev)?, self.ring.slot(slot)?, &mut diff),
                None => diff.clear(),
            }
            let snap = self.ring.slot_mut(slot)?;
            snap.diff = diff;
            snap.diff_valid = true;
        }
        Ok(&self.ring.slot(slot)?.diff)
    }

    // ─── Live memory diff ───────────────────────────────────────────────────

    /// Copy the whole visible 64K of `machine` as the live-diff baseline.
    pub fn take_diff_snapshot<M: Machine + ?Sized>(&mut self, machine: &M) {
        let buf = self
            .diff_snapshot
            .get_or_insert_with(|| vec![0; ADDRESS_SPACE].into_boxed_slice());
        for (addr, byte) in buf.iter_mut().enumerate() {
            *byte = machine.read_byte(addr as u16);
        }
        log::debug!("diff snapshot taken");
    }

    pub fn has_diff_snapshot(&self) -> bool { self.diff_snapshot.is_some() }

    /// Every byte from `diff_start` up that differs between the baseline and
    /// `machine` now.
    pub fn diff_live<M: Machine + ?Sized>(&mut self, machine: &M) -> Result<&[MemoryDiff]> {
        let snap = self.diff_snapshot.as_deref().ok_or(TraceError::NoDiffSnapshot)?;
        summary::diff_memory(snap, self.diff_start, |a| machine.read_byte(a), &mut self.live_diff);
        Ok(&self.live_diff)
    }

    // ─── Export / import ────────────────────────────────────────────────────

    /// Encode the frame `offset` frames back.
    pub fn export_frame(&self, offset: isize) -> Result<Vec<u8>> {
        savestate::encode_frame(self.frame(offset)?)
    }

    /// Decode an exported frame into the cursor slot as a new capture.
    /// Returns the slot written.
    pub fn import_frame(&mut self, data: &[u8]) -> Result<usize> {
        let frame = savestate::decode_frame(data)?;
        let slot_idx = self.ring.cursor();
        let slot = self.ring.current_mut();
        slot.copy_from(&frame);
        let frame_number = self.next_frame_number();
        let slot = self.ring.current_mut();
        slot.frame_number = frame_number;
        slot.prev_frame = self.last_frame.replace(frame_number);
        self.ring.invalidate_successor_diff(slot_idx);
        self.ring.advance();
        log::info!("imported frame into slot {}", slot_idx);
        Ok(slot_idx)
    }

    /// Forget all captured frames and the diff baseline.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.diff_snapshot = None;
        self.live_diff.clear();
        self.frame_counter = 0;
        self.last_frame = None;
    }

    fn next_frame_number(&mut self) -> u64 {
        let n = self.frame_counter;
        self.frame_counter += 1;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AddressRef, Label, LabelKind};
    use crate::machine::CpuState;
    use crate::recorder::FrameRecorder;

    struct Spectrum48 {
        cpu: CpuState,
        ram: Vec<Vec<u8>>,
    }

    impl Spectrum48 {
        fn new() -> Self {
            Spectrum48 { cpu: CpuState::default(), ram: vec![vec![0; BANK_SIZE]; 3] }
        }
    }

    impl Machine for Spectrum48 {
        fn variant(&self) -> MachineVariant { MachineVariant::Spectrum48k }
        fn cpu_state(&self) -> CpuState { self.cpu }
        fn set_cpu_state(&mut self, state: &CpuState) { self.cpu = *state; }
        fn ram_bank(&self, bank: usize) -> &[u8] { &self.ram[bank] }
        fn ram_bank_mut(&mut self, bank: usize) -> &mut [u8] { &mut self.ram[bank] }
        fn bank_select(&self) -> u8 { 0 }
        fn apply_bank_mapping(&mut self, _mapping: &BankMapping) {}
        fn read_byte(&self, addr: u16) -> u8 {
            if addr < 0x4000 { 0xF3 } else { self.ram[(addr as usize - 0x4000) / BANK_SIZE][addr as usize % BANK_SIZE] }
        }
    }

    #[derive(Default)]
    struct Observer(Vec<(u8, u8)>);

    impl BankObserver for Observer {
        fn set_rom_bank(&mut self, bank: u8) { self.0.push((0xFF, bank)); }
        fn set_ram_bank(&mut self, slot: u8, bank: u8) { self.0.push((slot, bank)); }
    }

    struct OneFunction(Label);

    impl CodeInfo for OneFunction {
        fn instruction_len(&self, _pc: u16) -> Option<u8> { Some(1) }
        fn label_at(&self, addr: u16) -> Option<&Label> { (addr == 0x8000).then_some(&self.0) }
    }

    fn engine(capacity: usize) -> SnapshotEngine {
        SnapshotEngine::new(&TraceConfig { capacity, frame_width: 4, frame_height: 2, ..TraceConfig::default() })
    }

    #[test]
    fn test_capture_restore_roundtrip() {
        let mut e = engine(4);
        let mut m = Spectrum48::new();
        let mut rec = FrameRecorder::new();
        m.cpu.pc = 0x8000;
        m.cpu.hl = 0x4000;
        m.ram[0][0] = 0xAA;
        m.ram[2][0x3FFF] = 0x55;
        rec.record_instruction(AddressRef::new(0x8000));

        let slot = e.capture(&m, &mut rec, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(rec.instructions().is_empty());

        let saved_cpu = m.cpu;
        let saved_ram = m.ram.clone();
        m.cpu.pc = 0x1234;
        m.ram[0][0] = 0;
        m.ram[2][0x3FFF] = 0;

        let mut obs = Observer::default();
        e.restore(slot, &mut m, &mut obs).unwrap();
        assert_eq!(m.cpu, saved_cpu);
        assert_eq!(m.ram, saved_ram);
        assert!(obs.0.is_empty());
        assert_eq!(e.frame(0).unwrap().image(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_restore_unwritten_slot_rejected() {
        let e = engine(4);
        let mut m = Spectrum48::new();
        m.cpu.pc = 0x4242;
        let mut obs = Observer::default();
        assert!(matches!(e.restore(2, &mut m, &mut obs), Err(TraceError::SlotNotCaptured { slot: 2 })));
        assert!(matches!(e.restore(9, &mut m, &mut obs), Err(TraceError::SlotOutOfRange { .. })));
        assert_eq!(m.cpu.pc, 0x4242);
    }

    #[test]
    fn test_frame_diff_and_cache() {
        let mut e = engine(4);
        let mut m = Spectrum48::new();
        let mut rec = FrameRecorder::new();
        m.ram[0][0] = 1;
        m.ram[1][0] = 9;
        e.capture(&m, &mut rec, &[]);
        m.ram[0][0] = 2;
        m.ram[1][0] = 0;
        e.capture(&m, &mut rec, &[]);

        let d = e.frame_diff(0).unwrap().to_vec();
        assert_eq!(d, vec![
            MemoryDiff { address: 0x4000, bank: Some(0), old_value: 1, new_value: 2 },
            MemoryDiff { address: 0x8000, bank: Some(1), old_value: 9, new_value: 0 },
        ]);
        // oldest held frame has nothing to compare against
        assert!(e.frame_diff(1).unwrap().is_empty());
        assert_eq!(e.frame_diff(0).unwrap(), &d[..]);
    }

    #[test]
    fn test_frame_overview_cached() {
        let mut e = engine(2);
        let m = Spectrum48::new();
        let mut rec = FrameRecorder::new();
        rec.record_instruction(AddressRef::new(0x8001));
        rec.record_instruction(AddressRef::new(0x8002));
        e.capture(&m, &mut rec, &[]);

        let code = OneFunction(Label::new("main", LabelKind::Function));
        let ov = e.frame_overview(0, &code).unwrap();
        assert_eq!(ov.len(), 1);
        assert_eq!(ov[0].function_address, 0x8000);
        assert!(e.frame_overview(1, &code).is_err());
    }

    #[test]
    fn test_live_diff() {
        let mut e = engine(2);
        let mut m = Spectrum48::new();
        assert!(matches!(e.diff_live(&m), Err(TraceError::NoDiffSnapshot)));

        e.take_diff_snapshot(&m);
        m.ram[0][0x0010] = 7; // 0x4010, video
        m.ram[1][0x0000] = 3; // 0x8000
        let d = e.diff_live(&m).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!((d[0].address, d[0].old_value, d[0].new_value), (0x8000, 0, 3));

        e.diff_start = crate::DIFF_START_WITH_VIDEO;
        assert_eq!(e.diff_live(&m).unwrap().len(), 2);
    }

    #[test]
    fn test_resume_moves_cursor() {
        let mut e = engine(4);
        let mut m = Spectrum48::new();
        let mut rec = FrameRecorder::new();
        for i in 0..3 {
            m.cpu.pc = i;
            e.capture(&m, &mut rec, &[]);
        }
        let mut obs = Observer::default();
        let slot = e.resume_from(2, &mut m, &mut obs).unwrap();
        assert_eq!(slot, 0);
        assert_eq!(m.cpu.pc, 0);
        assert_eq!(e.ring().cursor(), 1);
        assert_eq!(e.frame(0).unwrap().frame_number(), 0);
        assert_eq!(e.frame_counter(), 3);

        m.cpu.pc = 9;
        e.capture(&m, &mut rec, &[]);
        assert_eq!(e.frame(0).unwrap().frame_number(), 3);
        assert_eq!(e.frame(0).unwrap().prev_frame(), Some(0));
    }

    #[test]
    fn test_diff_after_resume_ignores_new_timeline() {
        let mut e = engine(4);
        let mut m = Spectrum48::new();
        let mut rec = FrameRecorder::new();
        for i in 0..4u8 {
            m.ram[0][0] = i;
            e.capture(&m, &mut rec, &[]);
        }
        // frame 2 changed 0x4000 from 1 to 2
        assert_eq!(e.frame_diff(1).unwrap().len(), 1);

        let mut obs = Observer::default();
        e.resume_from(3, &mut m, &mut obs).unwrap();
        m.ram[0][0] = 0xAA;
        e.capture(&m, &mut rec, &[]);

        // new frame diffs against the frame it was resumed from
        assert_eq!(e.frame_diff(0).unwrap(), &[
            MemoryDiff { address: 0x4000, bank: Some(0), old_value: 0, new_value: 0xAA },
        ]);
        // oldest held frame (2) followed frame 1, which was overwritten
        assert_eq!(e.frame(3).unwrap().frame_number(), 2);
        assert!(e.frame_diff(3).unwrap().is_empty());
        // frame 3 still follows frame 2
        assert_eq!(e.frame_diff(2).unwrap().len(), 1);
    }

    #[test]
    fn test_export_import() {
        let mut e = engine(3);
        let mut m = Spectrum48::new();
        let mut rec = FrameRecorder::new();
        m.cpu.pc = 0xBEEF;
        m.ram[1][5] = 0x77;
        e.capture(&m, &mut rec, &[9; 8]);
        let bytes = e.export_frame(0).unwrap();

        let mut other = engine(3);
        let slot = other.import_frame(&bytes).unwrap();
        let mut fresh = Spectrum48::new();
        other.restore(slot, &mut fresh, &mut Observer::default()).unwrap();
        assert_eq!(fresh.cpu.pc, 0xBEEF);
        assert_eq!(fresh.ram[1][5], 0x77);
        assert_eq!(other.frame(0).unwrap().image(), &[9; 8]);
    }
}
