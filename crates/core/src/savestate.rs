//! Binary export / import of a single captured frame.
//!
//! A frame is serialized with bincode and deflate-compressed, behind a small
//! header so foreign or stale data is rejected before decoding.
//!
//! ## Format
//!
//! ```text
//! +------------------+
//! | Magic "FTRC"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | Machine variant  |  u8 (0 = 48K, 1 = 128K)
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```
//!
//! Derived overview/diff caches are not stored; they are rebuilt on demand.

use crate::error::{Result, TraceError};
use crate::machine::MachineVariant;
use crate::ring::FrameSnapshot;

/// Magic bytes identifying an exported frame.
const MAGIC: &[u8; 4] = b"FTRC";
/// Current frame export format version.
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 9;
/// Deflate level used for the payload.
const COMPRESSION_LEVEL: u8 = 6;

/// Serialize a captured frame.
pub fn encode_frame(frame: &FrameSnapshot) -> Result<Vec<u8>> {
    let payload = bincode::serialize(frame)?;
    let compressed = miniz_oxide::deflate::compress_to_vec(&payload, COMPRESSION_LEVEL);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(frame.variant().tag());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Read the machine variant from an exported frame's header without decoding it.
pub fn peek_variant(data: &[u8]) -> Result<MachineVariant> {
    check_header(data)?;
    MachineVariant::from_tag(data[8]).ok_or(TraceError::UnknownVariant(data[8]))
}

fn check_header(data: &[u8]) -> Result<()> {
    if data.len() < HEADER_LEN {
        return Err(TraceError::TooShort(data.len()));
    }
    if &data[0..4] != MAGIC {
        return Err(TraceError::BadMagic);
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != FORMAT_VERSION {
        return Err(TraceError::UnsupportedVersion { found: version, expected: FORMAT_VERSION });
    }
    Ok(())
}

/// Decode an exported frame, verifying magic, version and variant.
pub fn decode_frame(data: &[u8]) -> Result<FrameSnapshot> {
    let variant = peek_variant(data)?;

    let decompressed = miniz_oxide::inflate::decompress_to_vec(&data[HEADER_LEN..])
        .map_err(|e| TraceError::Decompress(format!("{:?}", e)))?;

    let mut frame: FrameSnapshot = bincode::deserialize(&decompressed)?;
    if frame.variant != variant {
        return Err(TraceError::VariantMismatch { snapshot: frame.variant, machine: variant });
    }
    frame.bank_count = variant.ram_bank_count();
    frame.ram.resize(crate::MAX_RAM_BANKS * crate::BANK_SIZE, 0);
    frame.captured = true;
    Ok(frame)
}
