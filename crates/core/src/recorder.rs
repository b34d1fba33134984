//! Per-frame trace buffers.
//!
//! While a frame runs, the host (and [`crate::trap::BusTrap`]) append to a
//! [`FrameRecorder`]; at capture time the snapshot engine drains it into the
//! ring slot. Buffers are reserved once and reused, so recording does not
//! allocate until a frame exceeds its reserved size.

use serde::{Deserialize, Serialize};

use crate::analysis::AddressRef;

/// Annotated machine event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameEventKind {
    ScreenPixelWrite,
    ScreenAttributeWrite,
    PortRead,
    PortWrite,
    /// Bank-select register changed
    BankSwitch,
    /// Host-defined event
    Custom(u8),
}

/// One event in a frame's event trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEvent {
    pub kind: FrameEventKind,
    /// Instruction that caused the event
    pub pc: AddressRef,
    /// Memory address or port
    pub address: u16,
    pub value: u8,
    pub ticks: u64,
}

/// A write into screen pixel memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenWrite {
    pub address: u16,
    pub value: u8,
    pub pc: AddressRef,
}

/// Source of the traces accumulated since the last capture.
///
/// Each drain appends to `out` and leaves the source empty.
pub trait TraceSource {
    fn drain_instructions(&mut self, out: &mut Vec<AddressRef>);
    fn drain_events(&mut self, out: &mut Vec<FrameEvent>);
    fn drain_screen_writes(&mut self, out: &mut Vec<ScreenWrite>);
}

/// Growable-but-reused buffers for one frame in progress.
pub struct FrameRecorder {
    instructions: Vec<AddressRef>,
    events: Vec<FrameEvent>,
    screen_writes: Vec<ScreenWrite>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Reserve room for `trace_capacity` instructions per frame.
    pub fn with_capacity(trace_capacity: usize) -> Self {
        FrameRecorder {
            instructions: Vec::with_capacity(trace_capacity),
            events: Vec::with_capacity(trace_capacity / 16),
            screen_writes: Vec::with_capacity(crate::SCREEN_PIXEL_BYTES),
        }
    }

    #[inline]
    pub fn record_instruction(&mut self, pc: AddressRef) {
        self.instructions.push(pc);
    }

    #[inline]
    pub fn record_event(&mut self, event: FrameEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn record_screen_write(&mut self, address: u16, value: u8, pc: AddressRef) {
        self.screen_writes.push(ScreenWrite { address, value, pc });
    }

    pub fn instructions(&self) -> &[AddressRef] { &self.instructions }
    pub fn events(&self) -> &[FrameEvent] { &self.events }
    pub fn screen_writes(&self) -> &[ScreenWrite] { &self.screen_writes }

    /// Drop everything recorded so far, keeping capacity.
    pub fn clear(&mut self) {
        self.instructions.clear();
        self.events.clear();
        self.screen_writes.clear();
    }
}

impl Default for FrameRecorder {
    fn default() -> Self { Self::new() }
}

impl TraceSource for FrameRecorder {
    fn drain_instructions(&mut self, out: &mut Vec<AddressRef>) {
        out.extend_from_slice(&self.instructions);
        self.instructions.clear();
    }

    fn drain_events(&mut self, out: &mut Vec<FrameEvent>) {
        out.extend_from_slice(&self.events);
        self.events.clear();
    }

    fn drain_screen_writes(&mut self, out: &mut Vec<ScreenWrite>) {
        out.extend_from_slice(&self.screen_writes);
        self.screen_writes.clear();
    }
}
