//! Fixed, versioned, little-endian wire types for block and edge messages.
//!
//! Every message is a [`WireHdr`] followed by `count` little-endian `u32`
//! labels. Decoders check version, kind and exact length; a mismatch is a
//! fatal configuration error on the sending or receiving side.

use crate::percolate_error::PercolateError;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Message kinds carried in [`WireHdr::kind`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum WireKind {
    /// Full block including halo, coordinator → worker.
    Scatter = 1,
    /// Full block including halo, worker → coordinator.
    Gather = 2,
    /// One halo line, worker → worker.
    Edge = 3,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16, // = WIRE_VERSION.to_le()
    pub kind_le: u16,
    pub count_le: u32, // number of u32 labels that follow
}

const_assert_eq!(size_of::<WireHdr>(), 8);

impl WireHdr {
    pub fn new(kind: WireKind, count: usize) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: (kind as u16).to_le(),
            count_le: (count as u32).to_le(),
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
    pub fn count(&self) -> usize {
        u32::from_le(self.count_le) as usize
    }
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), PercolateError> {
    if actual == expected {
        Ok(())
    } else {
        Err(PercolateError::BufferLength { expected, actual })
    }
}

/// Byte length of a message carrying `count` labels.
pub const fn message_len(count: usize) -> usize {
    size_of::<WireHdr>() + count * size_of::<u32>()
}

/// Encode `labels` as a `kind` message.
pub fn encode_labels(kind: WireKind, labels: &[u32]) -> Vec<u8> {
    let hdr = WireHdr::new(kind, labels.len());
    let mut out = Vec::with_capacity(message_len(labels.len()));
    out.extend_from_slice(bytemuck::bytes_of(&hdr));
    let le: Vec<u32> = labels.iter().map(|v| v.to_le()).collect();
    out.extend_from_slice(bytemuck::cast_slice(&le));
    out
}

/// Decode a `kind` message that must carry exactly `expected` labels.
pub fn decode_labels(
    kind: WireKind,
    bytes: &[u8],
    expected: usize,
) -> Result<Vec<u32>, PercolateError> {
    let hdr_len = size_of::<WireHdr>();
    if bytes.len() < hdr_len {
        return Err(PercolateError::Wire(format!(
            "message of {} bytes is shorter than its header",
            bytes.len()
        )));
    }
    let hdr: WireHdr = bytemuck::pod_read_unaligned(&bytes[..hdr_len]);
    if hdr.version() != WIRE_VERSION {
        return Err(PercolateError::Wire(format!(
            "unsupported wire version {}",
            hdr.version()
        )));
    }
    if hdr.kind() != kind as u16 {
        return Err(PercolateError::Wire(format!(
            "expected {kind:?} message, got kind {}",
            hdr.kind()
        )));
    }
    expect_exact_len(hdr.count(), expected)?;
    let body = &bytes[hdr_len..];
    expect_exact_len(body.len() / size_of::<u32>(), expected)?;
    // The body may sit at any offset inside a Vec<u8>, so read unaligned.
    Ok(body
        .chunks_exact(size_of::<u32>())
        .map(|c| u32::from_le(bytemuck::pod_read_unaligned(c)))
        .collect())
}
