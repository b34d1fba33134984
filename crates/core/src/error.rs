//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

use crate::machine::MachineVariant;

/// Everything that can go wrong while registering handlers, inspecting or
/// restoring recorded frames, or decoding an exported snapshot.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("invalid handler range 0x{start:04X}-0x{end:04X} (start > end)")]
    InvalidRange { start: u16, end: u16 },

    #[error("no handler with index {0}")]
    UnknownHandler(usize),

    #[error("frame slot {slot} out of range (capacity {capacity})")]
    SlotOutOfRange { slot: usize, capacity: usize },

    #[error("frame slot {slot} has never been captured")]
    SlotNotCaptured { slot: usize },

    #[error("snapshot was taken on {snapshot:?} but the machine is {machine:?}")]
    VariantMismatch {
        snapshot: MachineVariant,
        machine: MachineVariant,
    },

    #[error("no diff snapshot has been taken")]
    NoDiffSnapshot,

    #[error("snapshot data too small ({0} bytes)")]
    TooShort(usize),

    #[error("not a frame snapshot (bad magic)")]
    BadMagic,

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("unknown machine variant tag {0}")]
    UnknownVariant(u8),

    #[error("snapshot serialization failed: {0}")]
    Encode(#[from] bincode::Error),

    #[error("snapshot decompression failed: {0}")]
    Decompress(String),
}

pub type Result<T> = std::result::Result<T, TraceError>;
