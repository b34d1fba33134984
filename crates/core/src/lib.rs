//! # frametrace-core
//!
//! Retrospective analysis and rewind debugging for an emulated ZX Spectrum
//! (48K and 128K banking models).
//!
//! Two jobs, both fed by the CPU core's bus traffic:
//!
//! 1. **Classification**: tally execute/read/write per address and turn the
//!    tallies into a code/data/unknown map with self-modifying code flagged.
//! 2. **Rewind**: keep a ring of full machine snapshots, one per rendered
//!    frame, with the instructions, events and screen writes of that frame,
//!    so the user can scrub back, inspect what changed and resume from there.
//!
//! ## Architecture
//!
//! - [`trap::BusTrap`]: Per-cycle entry point feeding counters, recorder and handlers
//! - [`counters::AccessCounters`]: Execute/read/write count per address
//! - [`handlers::HandlerRegistry`]: Range watch handlers with hooks and break flags
//! - [`classify::MemoryAnalysis`]: Run-length block map and self-modified list
//! - [`ring::FrameTraceRing`]: Pre-allocated ring of [`ring::FrameSnapshot`]s
//! - [`engine::SnapshotEngine`]: Capture, restore, scrub, per-frame overview/diff, live diff
//! - [`summary`]: Routine overview and memory diff builders
//! - [`savestate`]: Compressed, versioned export of a single frame
//! - [`session::TraceSession`]: Everything above behind one owner
//!
//! The emulator core plugs in through [`bus::BusPins`] and [`machine::Machine`];
//! the code analyser through [`analysis::CodeInfo`] and [`analysis::BankObserver`].
//!
//! The crate logs through the `log` facade and never installs a logger.

pub mod analysis;
pub mod bus;
pub mod classify;
pub mod config;
pub mod counters;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod machine;
pub mod recorder;
pub mod ring;
pub mod savestate;
pub mod session;
pub mod summary;
pub mod trap;

pub use analysis::{AddressRef, BankObserver, CodeInfo, Label, LabelKind};
pub use bus::{BusAccess, BusPins, Z80Pins};
pub use config::{BreakPolicy, TraceConfig};
pub use engine::SnapshotEngine;
pub use error::{Result, TraceError};
pub use machine::{CpuState, Machine, MachineVariant};
pub use session::{RunRequest, TraceSession};
pub use trap::{BusTrap, TrapSignal};

/// Size of the CPU address space
pub const ADDRESS_SPACE: usize = 0x10000;
/// RAM bank size: 16 KB
pub const BANK_SIZE: usize = 0x4000;
/// Most RAM banks any supported variant has (128K)
pub const MAX_RAM_BANKS: usize = 8;

// Spectrum screen layout
/// Bitmap area start
pub const SCREEN_PIXEL_START: u16 = 0x4000;
/// Bitmap area end (inclusive)
pub const SCREEN_PIXEL_END: u16 = 0x57FF;
/// Bitmap size in bytes (256×192 at 1 bpp)
pub const SCREEN_PIXEL_BYTES: usize = 0x1800;
/// Attribute area start
pub const SCREEN_ATTR_START: u16 = 0x5800;
/// Attribute area end (inclusive, 32×24 cells)
pub const SCREEN_ATTR_END: u16 = 0x5AFF;

/// Live diff start when screen memory is included
pub const DIFF_START_WITH_VIDEO: u16 = 0x4000;
/// Live diff start skipping screen memory and the printer buffer
pub const DIFF_START_NO_VIDEO: u16 = 0x5C00;

/// A port write is a 128K bank switch when none of these address bits are set
pub const BANK_PORT_MASK: u16 = 0x8002;
