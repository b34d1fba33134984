//! Session configuration.
//!
//! `TraceConfig` is plain serde data so the host can embed it in whatever
//! settings file it already persists. Nothing here touches the filesystem.

use serde::{Deserialize, Serialize};

/// Default number of frames kept in the rewind ring.
pub const DEFAULT_CAPACITY: usize = 300;
/// Default captured frame image size (Spectrum display plus border).
pub const DEFAULT_FRAME_WIDTH: usize = 320;
pub const DEFAULT_FRAME_HEIGHT: usize = 256;
/// Instructions pre-reserved per frame trace.
pub const DEFAULT_TRACE_CAPACITY: usize = 80_000;

/// What happens to handler dispatch once a handler asks for a break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BreakPolicy {
    /// Stop evaluating handlers at the first break
    #[default]
    StopAtFirst,
    /// Keep evaluating so every matching handler records the hit; the first
    /// breaking handler is still the one reported
    AccumulateAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Frames held in the ring
    pub capacity: usize,
    pub frame_width: usize,
    pub frame_height: usize,
    pub break_policy: BreakPolicy,
    /// Log pixel/attribute writes per frame
    pub record_screen_writes: bool,
    /// Log port reads/writes and bank switches as frame events
    pub record_port_events: bool,
    /// Restore machine state immediately while scrubbing, rather than only
    /// when resuming
    pub restore_on_scrub: bool,
    /// Live diff starts at the screen (0x4000) instead of after it (0x5C00)
    pub diff_include_video: bool,
    /// Per-frame instruction trace capacity reserved up front
    pub trace_capacity_hint: usize,
}

impl TraceConfig {
    /// Pixels per captured frame image.
    pub fn frame_pixels(&self) -> usize { self.frame_width * self.frame_height }

    /// First address compared by the live memory diff.
    pub fn diff_start(&self) -> u16 {
        if self.diff_include_video { crate::DIFF_START_WITH_VIDEO } else { crate::DIFF_START_NO_VIDEO }
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            capacity: DEFAULT_CAPACITY,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            break_policy: BreakPolicy::StopAtFirst,
            record_screen_writes: true,
            record_port_events: true,
            restore_on_scrub: false,
            diff_include_video: false,
            trace_capacity_hint: DEFAULT_TRACE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = TraceConfig::default();
        assert_eq!(c.capacity, 300);
        assert_eq!(c.frame_pixels(), 320 * 256);
        assert_eq!(c.break_policy, BreakPolicy::StopAtFirst);
        assert_eq!(c.diff_start(), 0x5C00);
    }

    #[test]
    fn test_bincode_roundtrip() {
        let c = TraceConfig {
            capacity: 10,
            diff_include_video: true,
            break_policy: BreakPolicy::AccumulateAll,
            ..TraceConfig::default()
        };
        let bytes = bincode::serialize(&c).unwrap();
        let back: TraceConfig = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, c);
        assert_eq!(back.diff_start(), 0x4000);
    }
}
