//! Field-descriptor driven packing.
//!
//! A frame is described as a slice of [`Field`]s (for encoding) or
//! [`FieldKind`]s (for decoding). One routine walks the slice and accumulates
//! the offset, so every frame layout in the protocol is expressed as data.
//!
//! Numeric fields use the host's native byte order. The simulator only ships
//! on little-endian hosts and sends its own frames in that order.

use crate::error::{CodecError, CodecResult};

/// Fixed-width field kinds that can be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    I32,
    F32,
    F64,
}

impl FieldKind {
    /// Encoded width in bytes.
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::U16 => 2,
            FieldKind::U32 | FieldKind::I32 | FieldKind::F32 => 4,
            FieldKind::F64 => 8,
        }
    }
}

/// One field of a frame.
///
/// `Bytes` is written verbatim; `CStr` is written followed by a single NUL.
/// Decoding only ever produces the fixed-width variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    U8(u8),
    U16(u16),
    U32(u32),
    I32(i32),
    F32(f32),
    F64(f64),
    Bytes(&'a [u8]),
    CStr(&'a str),
}

impl Field<'_> {
    /// Number of bytes this field occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        match self {
            Field::Bytes(bytes) => bytes.len(),
            Field::CStr(s) => s.len().saturating_add(1),
            other => other.kind().map_or(0, FieldKind::width),
        }
    }

    /// Kind of a fixed-width field, `None` for strings.
    pub fn kind(&self) -> Option<FieldKind> {
        match self {
            Field::U8(_) => Some(FieldKind::U8),
            Field::U16(_) => Some(FieldKind::U16),
            Field::U32(_) => Some(FieldKind::U32),
            Field::I32(_) => Some(FieldKind::I32),
            Field::F32(_) => Some(FieldKind::F32),
            Field::F64(_) => Some(FieldKind::F64),
            Field::Bytes(_) | Field::CStr(_) => None,
        }
    }
}

/// Exact number of bytes `encode` writes for `fields`.
pub fn encoded_size(fields: &[Field<'_>]) -> usize {
    fields
        .iter()
        .fold(0usize, |acc, field| acc.saturating_add(field.encoded_len()))
}

/// Write `fields` left-to-right into `buf` starting at `offset`.
///
/// Returns the offset one past the last byte written.
///
/// # Errors
///
/// Returns [`CodecError::BufferTooSmall`] if a field does not fit. Fields
/// before the failing one may already have been written.
pub fn encode(buf: &mut [u8], offset: usize, fields: &[Field<'_>]) -> CodecResult<usize> {
    let available = buf.len();
    let mut cursor = offset;
    for field in fields {
        let end = cursor
            .checked_add(field.encoded_len())
            .ok_or(CodecError::buffer_too_small(usize::MAX, available))?;
        let dst = buf
            .get_mut(cursor..end)
            .ok_or(CodecError::buffer_too_small(end, available))?;
        write_field(dst, field);
        cursor = end;
    }
    Ok(cursor)
}

/// Read one field per entry of `kinds` from `buf` starting at `offset`.
///
/// `out` is cleared first so callers can reuse it across frames. Returns the
/// offset one past the last byte read.
///
/// # Errors
///
/// Returns [`CodecError::TruncatedFrame`] if fewer bytes remain than required.
pub fn decode(
    buf: &[u8],
    offset: usize,
    kinds: &[FieldKind],
    out: &mut Vec<Field<'static>>,
) -> CodecResult<usize> {
    out.clear();
    let available = buf.len();
    let mut cursor = offset;
    for &kind in kinds {
        let end = cursor
            .checked_add(kind.width())
            .ok_or(CodecError::truncated(usize::MAX, available))?;
        let src = buf
            .get(cursor..end)
            .ok_or(CodecError::truncated(end, available))?;
        out.push(read_field(kind, src));
        cursor = end;
    }
    Ok(cursor)
}

fn write_field(dst: &mut [u8], field: &Field<'_>) {
    match *field {
        Field::U8(v) => dst.copy_from_slice(&v.to_ne_bytes()),
        Field::U16(v) => dst.copy_from_slice(&v.to_ne_bytes()),
        Field::U32(v) => dst.copy_from_slice(&v.to_ne_bytes()),
        Field::I32(v) => dst.copy_from_slice(&v.to_ne_bytes()),
        Field::F32(v) => dst.copy_from_slice(&v.to_ne_bytes()),
        Field::F64(v) => dst.copy_from_slice(&v.to_ne_bytes()),
        Field::Bytes(bytes) => dst.copy_from_slice(bytes),
        Field::CStr(s) => {
            let (body, nul) = dst.split_at_mut(s.len());
            body.copy_from_slice(s.as_bytes());
            nul.fill(0);
        }
    }
}

// `src` is exactly `kind.width()` bytes long.
fn read_field(kind: FieldKind, src: &[u8]) -> Field<'static> {
    match kind {
        FieldKind::U8 => Field::U8(u8::from_ne_bytes(fixed(src))),
        FieldKind::U16 => Field::U16(u16::from_ne_bytes(fixed(src))),
        FieldKind::U32 => Field::U32(u32::from_ne_bytes(fixed(src))),
        FieldKind::I32 => Field::I32(i32::from_ne_bytes(fixed(src))),
        FieldKind::F32 => Field::F32(f32::from_ne_bytes(fixed(src))),
        FieldKind::F64 => Field::F64(f64::from_ne_bytes(fixed(src))),
    }
}

fn fixed<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    for (dst, byte) in bytes.iter_mut().zip(src) {
        *dst = *byte;
    }
    bytes
}
