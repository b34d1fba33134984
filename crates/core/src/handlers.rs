//! Range-based access handlers.
//!
//! A handler watches an inclusive address range for one kind of activity:
//!
//! - **Execute**: the program counter lies in the range
//! - **Read**: a data memory read targets the range
//! - **Write**: a data memory write targets the range
//!
//! Handlers are evaluated in registration order on every bus cycle by
//! [`crate::trap::BusTrap`]. A firing handler bumps its hit count, remembers
//! which code address triggered it, runs its optional [`AccessHook`] and, when
//! `break_on_hit` is set, asks the host to stop stepping.

use std::collections::HashSet;
use std::fmt;

use crate::analysis::AddressRef;
use crate::bus::BusAccess;
use crate::config::BreakPolicy;
use crate::error::{Result, TraceError};

/// What a handler watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Program counter inside the range
    Execute,
    /// Memory read inside the range
    Read,
    /// Memory write inside the range
    Write,
}

impl HandlerKind {
    #[inline]
    fn matches(self, pc: u16, access: BusAccess, addr: u16, start: u16, end: u16) -> bool {
        match self {
            HandlerKind::Execute => pc >= start && pc <= end,
            HandlerKind::Read => access == BusAccess::Read && addr >= start && addr <= end,
            HandlerKind::Write => access == BusAccess::Write && addr >= start && addr <= end,
        }
    }
}

/// Details of one handler firing, passed to its hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerHit {
    /// Registry index of the handler that fired
    pub handler: usize,
    /// Program counter of the triggering instruction
    pub pc: u16,
    /// Address on the bus this cycle
    pub address: u16,
    /// Kind of the firing handler
    pub kind: HandlerKind,
    /// Byte on the data bus
    pub value: u8,
    /// CPU cycle count
    pub ticks: u64,
}

/// Side effect run whenever a handler fires.
pub trait AccessHook {
    fn on_hit(&mut self, hit: &HandlerHit);
}

impl<F: FnMut(&HandlerHit)> AccessHook for F {
    fn on_hit(&mut self, hit: &HandlerHit) {
        self(hit)
    }
}

/// A watched address range with live statistics.
pub struct AccessHandler {
    pub name: String,
    /// First address in range (inclusive)
    pub start: u16,
    /// Last address in range (inclusive)
    pub end: u16,
    pub kind: HandlerKind,
    pub enabled: bool,
    /// Signal a trap when this handler fires
    pub break_on_hit: bool,
    /// Number of times the handler fired since the last stats reset
    pub total_count: u64,
    /// Code addresses that triggered the handler
    pub callers: HashSet<AddressRef>,
    hook: Option<Box<dyn AccessHook>>,
}

impl AccessHandler {
    pub fn has_hook(&self) -> bool { self.hook.is_some() }

    /// Whether `addr` lies in the handler's range.
    pub fn contains(&self, addr: u16) -> bool { addr >= self.start && addr <= self.end }
}

impl fmt::Debug for AccessHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessHandler")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("kind", &self.kind)
            .field("enabled", &self.enabled)
            .field("break_on_hit", &self.break_on_hit)
            .field("total_count", &self.total_count)
            .field("callers", &self.callers.len())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// Ordered set of handlers.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: Vec<AccessHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        HandlerRegistry { handlers: Vec::new() }
    }

    /// Register a handler, enabled and not breaking. Returns its index.
    pub fn add(&mut self, name: impl Into<String>, start: u16, end: u16, kind: HandlerKind) -> Result<usize> {
        if start > end {
            log::warn!("rejected handler range 0x{:04X}-0x{:04X}", start, end);
            return Err(TraceError::InvalidRange { start, end });
        }
        let idx = self.handlers.len();
        let name = name.into();
        log::debug!("handler [{}] {} {:?} 0x{:04X}-0x{:04X}", idx, name, kind, start, end);
        self.handlers.push(AccessHandler {
            name,
            start,
            end,
            kind,
            enabled: true,
            break_on_hit: false,
            total_count: 0,
            callers: HashSet::new(),
            hook: None,
        });
        Ok(idx)
    }

    /// Remove a handler. Later handlers shift down by one index.
    pub fn remove(&mut self, idx: usize) -> Result<AccessHandler> {
        if idx < self.handlers.len() {
            Ok(self.handlers.remove(idx))
        } else {
            Err(TraceError::UnknownHandler(idx))
        }
    }

    pub fn set_enabled(&mut self, idx: usize, enabled: bool) -> Result<()> {
        self.get_mut(idx)?.enabled = enabled;
        Ok(())
    }

    pub fn set_break(&mut self, idx: usize, break_on_hit: bool) -> Result<()> {
        self.get_mut(idx)?.break_on_hit = break_on_hit;
        Ok(())
    }

    /// Attach (or replace) the hook run when handler `idx` fires.
    pub fn set_hook(&mut self, idx: usize, hook: impl AccessHook + 'static) -> Result<()> {
        self.get_mut(idx)?.hook = Some(Box::new(hook));
        Ok(())
    }

    pub fn clear_hook(&mut self, idx: usize) -> Result<()> {
        self.get_mut(idx)?.hook = None;
        Ok(())
    }

    pub fn get(&self, idx: usize) -> Option<&AccessHandler> { self.handlers.get(idx) }

    fn get_mut(&mut self, idx: usize) -> Result<&mut AccessHandler> {
        self.handlers.get_mut(idx).ok_or(TraceError::UnknownHandler(idx))
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.handlers.iter().position(|h| h.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessHandler> { self.handlers.iter() }
    pub fn len(&self) -> usize { self.handlers.len() }
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }

    /// Zero hit counts and forget callers, keeping the handlers themselves.
    pub fn reset_stats(&mut self) {
        for h in self.handlers.iter_mut() {
            h.total_count = 0;
            h.callers.clear();
        }
    }

    /// Run every enabled handler against one bus cycle.
    ///
    /// Returns the index of the first handler that requested a break. Under
    /// [`BreakPolicy::StopAtFirst`] handlers after it are not evaluated.
    #[inline]
    #[allow(clippy::too_many_arguments)]
    pub fn dispatch(
        &mut self,
        pc: u16,
        caller: AddressRef,
        access: BusAccess,
        addr: u16,
        value: u8,
        ticks: u64,
        policy: BreakPolicy,
    ) -> Option<usize> {
        let mut first_break = None;
        for (i, h) in self.handlers.iter_mut().enumerate() {
            if !h.enabled || !h.kind.matches(pc, access, addr, h.start, h.end) {
                continue;
            }
            h.total_count += 1;
            h.callers.insert(caller);
            if let Some(hook) = h.hook.as_mut() {
                hook.on_hit(&HandlerHit { handler: i, pc, address: addr, kind: h.kind, value, ticks });
            }
            if h.break_on_hit && first_break.is_none() {
                first_break = Some(i);
                if policy == BreakPolicy::StopAtFirst {
                    break;
                }
            }
        }
        first_break
    }
}
