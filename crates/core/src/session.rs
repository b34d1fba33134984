//! Debug session: trap, classifier and snapshot engine behind one owner.
//!
//! Typical host loop:
//!
//! ```text
//! for each bus cycle:   if session.on_cycle(..).is_break() { pause }
//! at end of frame:      session.end_frame(&machine, &framebuffer)
//! user drags slider:    session.scrub(k, ..)  -> pause while k > 0
//! user clicks restore:  session.resume(..)    -> continue from that frame
//! ```

use crate::analysis::{BankObserver, CodeInfo};
use crate::bus::BusPins;
use crate::classify::MemoryAnalysis;
use crate::config::TraceConfig;
use crate::engine::SnapshotEngine;
use crate::error::Result;
use crate::handlers::HandlerRegistry;
use crate::machine::Machine;
use crate::ring::FrameSnapshot;
use crate::summary::{MemoryDiff, OverviewItem};
use crate::trap::{BusTrap, TrapSignal};

/// What the host run loop should do after a scrub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunRequest {
    /// Back at the live frame; keep stepping
    Continue,
    /// Looking at a past frame; hold stepping
    Break,
}

pub struct TraceSession {
    config: TraceConfig,
    trap: BusTrap,
    analysis: MemoryAnalysis,
    engine: SnapshotEngine,
    /// Frames back currently shown (0 = live)
    scrub_offset: isize,
}

impl TraceSession {
    pub fn new(config: TraceConfig) -> Self {
        log::info!(
            "trace session: {} frames, break policy {:?}",
            config.capacity.max(1),
            config.break_policy
        );
        TraceSession {
            trap: BusTrap::new(&config),
            analysis: MemoryAnalysis::new(),
            engine: SnapshotEngine::new(&config),
            scrub_offset: 0,
            config,
        }
    }

    pub fn config(&self) -> &TraceConfig { &self.config }
    pub fn trap(&self) -> &BusTrap { &self.trap }
    pub fn trap_mut(&mut self) -> &mut BusTrap { &mut self.trap }
    pub fn handlers(&self) -> &HandlerRegistry { self.trap.handlers() }
    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry { self.trap.handlers_mut() }
    pub fn analysis(&self) -> &MemoryAnalysis { &self.analysis }
    pub fn engine(&self) -> &SnapshotEngine { &self.engine }
    pub fn engine_mut(&mut self) -> &mut SnapshotEngine { &mut self.engine }
    pub fn scrub_offset(&self) -> isize { self.scrub_offset }

    /// Per-cycle hook; see [`BusTrap::on_cycle`].
    #[inline]
    pub fn on_cycle<P, C>(&mut self, pc: u16, ticks: u64, pins: &P, code: &C) -> TrapSignal
    where
        P: BusPins + ?Sized,
        C: CodeInfo + ?Sized,
    {
        self.trap.on_cycle(pc, ticks, pins, code)
    }

    /// Capture the frame that just finished rendering.
    pub fn end_frame<M: Machine + ?Sized>(&mut self, machine: &M, image: &[u32]) -> usize {
        self.engine.capture(machine, self.trap.recorder_mut(), image)
    }

    /// Rebuild the memory classification from the counters gathered so far.
    pub fn analyze(&mut self) {
        self.analysis.analyze(self.trap.counters());
    }

    /// Select the frame `offset` frames back (clamped to the ring).
    ///
    /// Offset 0 is the live frame and lets the host continue; any other
    /// offset asks it to hold. With `restore_on_scrub` the selected frame is
    /// also written into `machine`, offset 0 included, so returning to the
    /// live view undoes an earlier scrub. The selection only moves once the
    /// restore has succeeded.
    pub fn scrub<M, O>(&mut self, offset: isize, machine: &mut M, observer: &mut O) -> Result<RunRequest>
    where
        M: Machine + ?Sized,
        O: BankObserver + ?Sized,
    {
        let max = self.engine.ring().capacity() as isize - 1;
        let offset = offset.clamp(0, max);
        // nothing recorded yet: the live frame is the machine itself
        let live_only = offset == 0 && self.engine.ring().is_empty();
        if self.config.restore_on_scrub && !live_only {
            self.engine.restore_offset(offset, machine, observer)?;
        }
        self.scrub_offset = offset;
        Ok(if offset == 0 { RunRequest::Continue } else { RunRequest::Break })
    }

    /// Restore the selected frame and continue recording from it.
    pub fn resume<M, O>(&mut self, machine: &mut M, observer: &mut O) -> Result<usize>
    where
        M: Machine + ?Sized,
        O: BankObserver + ?Sized,
    {
        let slot = self.engine.resume_from(self.scrub_offset, machine, observer)?;
        self.scrub_offset = 0;
        self.trap.recorder_mut().clear();
        Ok(slot)
    }

    /// Currently selected frame.
    pub fn selected_frame(&self) -> Result<&FrameSnapshot> {
        self.engine.frame(self.scrub_offset)
    }

    pub fn selected_overview<C: CodeInfo + ?Sized>(&mut self, code: &C) -> Result<&[OverviewItem]> {
        self.engine.frame_overview(self.scrub_offset, code)
    }

    pub fn selected_diff(&mut self) -> Result<&[MemoryDiff]> {
        self.engine.frame_diff(self.scrub_offset)
    }

    /// Drop counters, handler stats, analysis results and recorded frames.
    /// Handlers stay registered.
    pub fn reset(&mut self) {
        self.trap.reset();
        self.analysis.clear();
        self.engine.clear();
        self.scrub_offset = 0;
        log::info!("trace session reset");
    }
}
