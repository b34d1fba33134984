//! Per-cycle bus instrumentation.
//!
//! [`BusTrap::on_cycle`] is called by the CPU core once per bus cycle. It:
//!
//! 1. counts the current instruction's footprint as executed
//! 2. counts the data access (read or write, never both)
//! 3. records opcode fetches, screen writes and port activity for the frame
//! 4. runs the handler registry and reports whether to break
//!
//! Nothing here allocates once the recorder buffers are warm, except a
//! handler seeing a caller for the first time.

use crate::analysis::{AddressRef, CodeInfo};
use crate::bus::{BusAccess, BusPins};
use crate::config::{BreakPolicy, TraceConfig};
use crate::counters::AccessCounters;
use crate::handlers::HandlerRegistry;
use crate::recorder::{FrameEvent, FrameEventKind, FrameRecorder};

/// Result of instrumenting one bus cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapSignal {
    Continue,
    /// Handler `handler` asked the host to stop stepping
    Break { handler: usize },
}

impl TrapSignal {
    pub fn is_break(self) -> bool { matches!(self, TrapSignal::Break { .. }) }
}

/// Counters, handlers and the frame recorder behind one entry point.
pub struct BusTrap {
    counters: AccessCounters,
    handlers: HandlerRegistry,
    recorder: FrameRecorder,
    pub break_policy: BreakPolicy,
    pub record_screen_writes: bool,
    pub record_port_events: bool,
}

impl BusTrap {
    pub fn new(config: &TraceConfig) -> Self {
        BusTrap {
            counters: AccessCounters::new(),
            handlers: HandlerRegistry::new(),
            recorder: FrameRecorder::with_capacity(config.trace_capacity_hint),
            break_policy: config.break_policy,
            record_screen_writes: config.record_screen_writes,
            record_port_events: config.record_port_events,
        }
    }

    /// Instrument one bus cycle executed on behalf of the instruction at `pc`.
    pub fn on_cycle<P, C>(&mut self, pc: u16, ticks: u64, pins: &P, code: &C) -> TrapSignal
    where
        P: BusPins + ?Sized,
        C: CodeInfo + ?Sized,
    {
        let len = code.instruction_len(pc).unwrap_or(1);
        self.counters.record_execute(pc, len);

        let addr = pins.address();
        let value = pins.data();
        let access = pins.access();
        match access {
            BusAccess::Read => self.counters.record_read(addr),
            BusAccess::Write => self.counters.record_write(addr),
            BusAccess::None => {}
        }

        let caller = code.address_ref(pc);

        // Prefixed opcodes fetch again at pc+1; only the first fetch starts an instruction
        if pins.is_opcode_fetch() && addr == pc {
            self.recorder.record_instruction(caller);
        }

        if access == BusAccess::Write && self.record_screen_writes {
            self.record_screen(addr, value, caller, ticks);
        }

        if self.record_port_events {
            self.record_port(pins.io_access(), addr, value, caller, ticks);
        }

        if self.handlers.is_empty() {
            return TrapSignal::Continue;
        }
        match self.handlers.dispatch(pc, caller, access, addr, value, ticks, self.break_policy) {
            Some(handler) => {
                log::debug!("break: handler [{}] at pc 0x{:04X} addr 0x{:04X}", handler, pc, addr);
                TrapSignal::Break { handler }
            }
            None => TrapSignal::Continue,
        }
    }

    #[inline]
    fn record_screen(&mut self, addr: u16, value: u8, pc: AddressRef, ticks: u64) {
        match addr {
            crate::SCREEN_PIXEL_START..=crate::SCREEN_PIXEL_END => {
                self.recorder.record_screen_write(addr, value, pc);
            }
            crate::SCREEN_ATTR_START..=crate::SCREEN_ATTR_END => {
                self.recorder.record_event(FrameEvent {
                    kind: FrameEventKind::ScreenAttributeWrite,
                    pc,
                    address: addr,
                    value,
                    ticks,
                });
            }
            _ => {}
        }
    }

    #[inline]
    fn record_port(&mut self, access: BusAccess, port: u16, value: u8, pc: AddressRef, ticks: u64) {
        let kind = match access {
            BusAccess::None => return,
            BusAccess::Read => FrameEventKind::PortRead,
            BusAccess::Write if port & crate::BANK_PORT_MASK == 0 => FrameEventKind::BankSwitch,
            BusAccess::Write => FrameEventKind::PortWrite,
        };
        self.recorder.record_event(FrameEvent { kind, pc, address: port, value, ticks });
    }

    pub fn counters(&self) -> &AccessCounters { &self.counters }
    pub fn handlers(&self) -> &HandlerRegistry { &self.handlers }
    pub fn handlers_mut(&mut self) -> &mut HandlerRegistry { &mut self.handlers }
    pub fn recorder(&self) -> &FrameRecorder { &self.recorder }
    pub fn recorder_mut(&mut self) -> &mut FrameRecorder { &mut self.recorder }

    /// Zero access counts and handler statistics and drop the frame in progress.
    pub fn reset(&mut self) {
        self.counters.reset();
        self.handlers.reset_stats();
        self.recorder.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Label;
    use crate::bus::Z80Pins;
    use crate::handlers::HandlerKind;

    /// Reports the same instruction length at every address.
    struct Fixed(Option<u8>);

    impl CodeInfo for Fixed {
        fn instruction_len(&self, _pc: u16) -> Option<u8> { self.0 }
        fn label_at(&self, _addr: u16) -> Option<&Label> { None }
    }

    fn trap() -> BusTrap {
        BusTrap::new(&TraceConfig::default())
    }

    #[test]
    fn test_counts_footprint_and_access() {
        let mut t = trap();
        let code = Fixed(Some(3));
        t.on_cycle(0x8000, 0, &Z80Pins::mem_write(0x9000, 1), &code);
        t.on_cycle(0x8000, 4, &Z80Pins::mem_read(0x9001, 1), &code);

        let c = t.counters();
        assert_eq!(c.exec_count(0x8000), 2);
        assert_eq!(c.exec_count(0x8002), 2);
        assert_eq!(c.exec_count(0x8003), 0);
        assert_eq!((c.read_count(0x9000), c.write_count(0x9000)), (0, 1));
        assert_eq!((c.read_count(0x9001), c.write_count(0x9001)), (1, 0));
    }

    #[test]
    fn test_unknown_length_counts_one_byte() {
        let mut t = trap();
        t.on_cycle(0x8000, 0, &Z80Pins(0), &Fixed(None));
        assert_eq!(t.counters().exec_count(0x8000), 1);
        assert_eq!(t.counters().exec_count(0x8001), 0);
    }

    #[test]
    fn test_opcode_fetch_is_not_a_read() {
        let mut t = trap();
        let code = Fixed(Some(1));
        t.on_cycle(0x8000, 0, &Z80Pins::opcode_fetch(0x8000), &code);
        t.on_cycle(0x8000, 2, &Z80Pins::opcode_fetch(0x8001), &code);
        assert_eq!(t.counters().read_count(0x8000), 0);
        assert_eq!(t.recorder().instructions(), &[AddressRef::new(0x8000)]);
    }

    #[test]
    fn test_execute_handler_breaks() {
        let mut t = trap();
        let code = Fixed(Some(1));
        let h = t.handlers_mut().add("loop", 0x8000, 0x8010, HandlerKind::Execute).unwrap();
        t.handlers_mut().set_break(h, true).unwrap();

        let sig = t.on_cycle(0x8005, 0, &Z80Pins::mem_read(0x1234, 0), &code);
        assert_eq!(sig, TrapSignal::Break { handler: h });
        let sig = t.on_cycle(0x7000, 0, &Z80Pins::mem_read(0x8005, 0), &code);
        assert_eq!(sig, TrapSignal::Continue);
        assert_eq!(t.handlers().get(h).unwrap().total_count, 1);
    }

    #[test]
    fn test_screen_writes_and_ports() {
        let mut t = trap();
        let code = Fixed(Some(1));
        t.on_cycle(0x8000, 0, &Z80Pins::mem_write(0x4000, 0xFF), &code);
        t.on_cycle(0x8000, 0, &Z80Pins::mem_write(0x5800, 0x38), &code);
        t.on_cycle(0x8000, 0, &Z80Pins::mem_write(0x5B00, 0x00), &code);
        t.on_cycle(0x8001, 0, &Z80Pins::io_write(0x7FFD, 0x11), &code);
        t.on_cycle(0x8002, 0, &Z80Pins::io_write(0x00FE, 0x02), &code);

        let rec = t.recorder();
        assert_eq!(rec.screen_writes().len(), 1);
        assert_eq!(rec.screen_writes()[0].value, 0xFF);
        let kinds: Vec<_> = rec.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![
            FrameEventKind::ScreenAttributeWrite,
            FrameEventKind::BankSwitch,
            FrameEventKind::PortWrite,
        ]);
    }

    #[test]
    fn test_recording_disabled() {
        let mut t = BusTrap::new(&TraceConfig {
            record_screen_writes: false,
            record_port_events: false,
            ..TraceConfig::default()
        });
        let code = Fixed(Some(1));
        t.on_cycle(0x8000, 0, &Z80Pins::mem_write(0x4000, 0xFF), &code);
        t.on_cycle(0x8001, 0, &Z80Pins::io_write(0x7FFD, 0x11), &code);
        assert!(t.recorder().screen_writes().is_empty());
        assert!(t.recorder().events().is_empty());
        assert_eq!(t.counters().write_count(0x4000), 1);
    }
}
