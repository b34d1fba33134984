//! Frame trace ring buffer.
//!
//! Holds the last `capacity` rendered frames, each as a full machine
//! snapshot plus the traces recorded while it ran. All slots are allocated
//! up front and overwritten in place as the write cursor advances, so a
//! steady-state capture performs no allocation.
//!
//! ## Scrubbing
//!
//! ```text
//!   offset K (frames back)  ->  slot (cursor - K - 1) mod N
//!   K = 0                   ->  most recently captured frame
//!   K < 0 / K >= N          ->  clamped to 0 / N-1
//! ```

use serde::{Deserialize, Serialize};

use crate::analysis::AddressRef;
use crate::error::{Result, TraceError};
use crate::machine::{CpuState, MachineVariant};
use crate::recorder::{FrameEvent, ScreenWrite};
use crate::summary::{MemoryDiff, OverviewItem};
use crate::{BANK_SIZE, MAX_RAM_BANKS};

/// One captured frame.
#[derive(Clone, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Rendered frame image, one ARGB pixel per entry
    pub(crate) image: Vec<u32>,
    pub(crate) cpu: CpuState,
    /// RAM banks back to back, `MAX_RAM_BANKS * BANK_SIZE` bytes
    pub(crate) ram: Vec<u8>,
    /// Banks of `ram` in use for this frame's variant
    pub(crate) bank_count: usize,
    pub(crate) bank_select: u8,
    pub(crate) variant: MachineVariant,
    pub(crate) frame_number: u64,
    /// Frame number of the capture this one followed, `None` for the first
    /// frame of a recording
    #[serde(skip)]
    pub(crate) prev_frame: Option<u64>,
    pub(crate) instructions: Vec<AddressRef>,
    pub(crate) events: Vec<FrameEvent>,
    pub(crate) screen_writes: Vec<ScreenWrite>,

    // Lazily derived, valid until the slot is overwritten
    #[serde(skip)]
    pub(crate) overview: Vec<OverviewItem>,
    #[serde(skip)]
    pub(crate) overview_valid: bool,
    #[serde(skip)]
    pub(crate) diff: Vec<MemoryDiff>,
    #[serde(skip)]
    pub(crate) diff_valid: bool,

    #[serde(skip)]
    pub(crate) captured: bool,
}

impl FrameSnapshot {
    pub(crate) fn new(frame_pixels: usize, trace_capacity: usize) -> Self {
        FrameSnapshot {
            image: vec![0; frame_pixels],
            cpu: CpuState::default(),
            ram: vec![0; MAX_RAM_BANKS * BANK_SIZE],
            bank_count: 0,
            bank_select: 0,
            variant: MachineVariant::Spectrum48k,
            frame_number: 0,
            prev_frame: None,
            instructions: Vec::with_capacity(trace_capacity),
            events: Vec::new(),
            screen_writes: Vec::new(),
            overview: Vec::new(),
            overview_valid: false,
            diff: Vec::new(),
            diff_valid: false,
            captured: false,
        }
    }

    pub fn is_captured(&self) -> bool { self.captured }
    pub fn image(&self) -> &[u32] { &self.image }
    pub fn cpu(&self) -> &CpuState { &self.cpu }
    pub fn bank_count(&self) -> usize { self.bank_count }
    pub fn bank_select(&self) -> u8 { self.bank_select }
    pub fn variant(&self) -> MachineVariant { self.variant }
    pub fn frame_number(&self) -> u64 { self.frame_number }
    pub fn prev_frame(&self) -> Option<u64> { self.prev_frame }
    pub fn instructions(&self) -> &[AddressRef] { &self.instructions }
    pub fn events(&self) -> &[FrameEvent] { &self.events }
    pub fn screen_writes(&self) -> &[ScreenWrite] { &self.screen_writes }

    /// Contents of RAM bank `bank`, if the frame's variant has it.
    pub fn bank(&self, bank: usize) -> Option<&[u8]> {
        if bank < self.bank_count {
            Some(&self.ram[bank * BANK_SIZE..(bank + 1) * BANK_SIZE])
        } else {
            None
        }
    }

    pub(crate) fn bank_mut(&mut self, bank: usize) -> &mut [u8] {
        &mut self.ram[bank * BANK_SIZE..(bank + 1) * BANK_SIZE]
    }

    pub(crate) fn invalidate_caches(&mut self) {
        self.overview_valid = false;
        self.diff_valid = false;
    }

    /// Overwrite this slot with `other`, reusing this slot's buffers.
    pub(crate) fn copy_from(&mut self, other: &FrameSnapshot) {
        let n = self.image.len().min(other.image.len());
        self.image[..n].copy_from_slice(&other.image[..n]);
        self.image[n..].fill(0);
        self.cpu = other.cpu;
        let n = self.ram.len().min(other.ram.len());
        self.ram[..n].copy_from_slice(&other.ram[..n]);
        self.bank_count = other.bank_count.min(MAX_RAM_BANKS);
        self.bank_select = other.bank_select;
        self.variant = other.variant;
        self.frame_number = other.frame_number;
        self.prev_frame = other.prev_frame;
        self.instructions.clear();
        self.instructions.extend_from_slice(&other.instructions);
        self.events.clear();
        self.events.extend_from_slice(&other.events);
        self.screen_writes.clear();
        self.screen_writes.extend_from_slice(&other.screen_writes);
        self.invalidate_caches();
        self.captured = true;
    }
}

/// Fixed-capacity circular buffer of frame snapshots.
pub struct FrameTraceRing {
    slots: Vec<FrameSnapshot>,
    /// Next slot to overwrite
    cursor: usize,
}

impl FrameTraceRing {
    /// Allocate `capacity` slots (at least one) sized for `frame_pixels`.
    pub fn new(capacity: usize, frame_pixels: usize, trace_capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(FrameSnapshot::new(frame_pixels, trace_capacity));
        }
        log::info!(
            "frame ring: {} slots, ~{} KiB",
            capacity,
            capacity * (MAX_RAM_BANKS * BANK_SIZE + frame_pixels * 4) / 1024
        );
        FrameTraceRing { slots, cursor: 0 }
    }

    pub fn capacity(&self) -> usize { self.slots.len() }
    pub fn cursor(&self) -> usize { self.cursor }

    /// Number of slots captured at least once.
    pub fn len(&self) -> usize { self.slots.iter().filter(|s| s.captured).count() }
    pub fn is_empty(&self) -> bool { !self.slots.iter().any(|s| s.captured) }

    /// Slot index for "go back `offset` frames", clamped to `[0, N-1]`.
    pub fn slot_for_offset(&self, offset: isize) -> usize {
        let n = self.slots.len();
        let k = offset.clamp(0, n as isize - 1) as usize;
        (self.cursor + n - k - 1) % n
    }

    pub fn slot(&self, slot: usize) -> Result<&FrameSnapshot> {
        let capacity = self.slots.len();
        self.slots.get(slot).ok_or(TraceError::SlotOutOfRange { slot, capacity })
    }

    pub(crate) fn slot_mut(&mut self, slot: usize) -> Result<&mut FrameSnapshot> {
        let capacity = self.slots.len();
        self.slots.get_mut(slot).ok_or(TraceError::SlotOutOfRange { slot, capacity })
    }

    /// Captured slot `slot`, or an error if it is out of range or never written.
    pub fn captured(&self, slot: usize) -> Result<&FrameSnapshot> {
        let s = self.slot(slot)?;
        if s.captured { Ok(s) } else { Err(TraceError::SlotNotCaptured { slot }) }
    }

    /// Slot the next capture writes into.
    pub(crate) fn current_mut(&mut self) -> &mut FrameSnapshot {
        &mut self.slots[self.cursor]
    }

    /// Slot holding the frame captured just before `slot`, if that frame is
    /// still in the ring. A frame left over from before a resume has no
    /// predecessor once the slot before it holds a newer recording.
    pub fn predecessor(&self, slot: usize) -> Option<usize> {
        let n = self.slots.len();
        let cur = self.slots.get(slot)?;
        let prev = (slot + n - 1) % n;
        let p = &self.slots[prev];
        if prev != slot && cur.captured && p.captured && cur.prev_frame == Some(p.frame_number) {
            Some(prev)
        } else {
            None
        }
    }

    /// Drop the cached diff of the slot after `slot`, whose predecessor
    /// `slot` is.
    pub(crate) fn invalidate_successor_diff(&mut self, slot: usize) {
        let n = self.slots.len();
        self.slots[(slot + 1) % n].diff_valid = false;
    }

    pub(crate) fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    /// Make `slot` the next one to be overwritten.
    pub(crate) fn set_cursor(&mut self, slot: usize) {
        self.cursor = slot % self.slots.len();
    }

    /// Forget every captured frame. Buffers are kept.
    pub fn clear(&mut self) {
        for s in self.slots.iter_mut() {
            s.captured = false;
            s.invalidate_caches();
        }
        self.cursor = 0;
    }
}
