//! Frame tags, classification and the dataref get/set frames.
//!
//! | Frame | Layout after the 5-byte tag |
//! |-------|-----------------------------|
//! | `RREF` request  | `frequency:i32, slot:i32, name[400]` |
//! | `RREF` response | `{slot:i32, value:f32}*` |
//! | `DREF`          | `value:f32, name[500]` |
//! | `RPOS` request  | ASCII frequency + NUL |

use crate::codec::{Field, FieldKind, decode, encode, encoded_size};
use crate::error::{CodecError, CodecResult};

/// Length of every frame tag: four ASCII letters and a NUL.
pub const HEADER_LEN: usize = 5;

pub const DATAREF_GET_TAG: [u8; HEADER_LEN] = *b"RREF\0";
pub const DATAREF_SET_TAG: [u8; HEADER_LEN] = *b"DREF\0";
pub const POSE_TAG: [u8; HEADER_LEN] = *b"RPOS\0";
pub const BEACON_TAG: [u8; HEADER_LEN] = *b"BECN\0";

/// NUL-padded name field of an `RREF` request.
pub const RREF_NAME_LEN: usize = 400;
/// Total length of an `RREF` request.
pub const RREF_FRAME_LEN: usize = HEADER_LEN + 4 + 4 + RREF_NAME_LEN;
/// One `{slot, value}` pair in an `RREF` response.
pub const RREF_PAIR_LEN: usize = 8;

/// NUL-padded name field of a `DREF` frame.
pub const DREF_NAME_LEN: usize = 500;
/// Total length of a `DREF` frame.
pub const DREF_FRAME_LEN: usize = HEADER_LEN + 4 + DREF_NAME_LEN;

const RREF_PAIR_LAYOUT: [FieldKind; 2] = [FieldKind::I32, FieldKind::F32];

/// Frame families distinguished by their tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// `RREF`: dataref subscription request and periodic value response.
    DatarefGet,
    /// `DREF`: dataref write.
    DatarefSet,
    /// `RPOS`: pose query and response.
    Pose,
    /// `BECN`: multicast discovery beacon.
    Beacon,
}

impl FrameKind {
    /// Classify a datagram by its first four bytes.
    ///
    /// Returns `None` for unknown tags and for datagrams shorter than a tag.
    pub fn classify(data: &[u8]) -> Option<Self> {
        let tag = data.get(..4)?;
        [
            FrameKind::DatarefGet,
            FrameKind::DatarefSet,
            FrameKind::Pose,
            FrameKind::Beacon,
        ]
        .into_iter()
        .find(|kind| kind.tag().get(..4) == Some(tag))
    }

    /// Full 5-byte tag for this frame family.
    pub const fn tag(self) -> &'static [u8; HEADER_LEN] {
        match self {
            FrameKind::DatarefGet => &DATAREF_GET_TAG,
            FrameKind::DatarefSet => &DATAREF_SET_TAG,
            FrameKind::Pose => &POSE_TAG,
            FrameKind::Beacon => &BEACON_TAG,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FrameKind::DatarefGet => "RREF",
            FrameKind::DatarefSet => "DREF",
            FrameKind::Pose => "RPOS",
            FrameKind::Beacon => "BECN",
        }
    }
}

/// Build an `RREF` request asking for `name` at `frequency` Hz, answered on `slot`.
///
/// Writes exactly [`RREF_FRAME_LEN`] bytes with the name NUL-padded.
/// A frequency of zero asks the simulator to stop sending.
///
/// # Errors
///
/// Returns [`CodecError::BufferTooSmall`] if `buf` is shorter than a full frame
/// or the name plus its terminator exceeds [`RREF_NAME_LEN`].
pub fn encode_dataref_request(
    buf: &mut [u8],
    frequency: i32,
    slot: i32,
    name: &str,
) -> CodecResult<usize> {
    let fields = [
        Field::Bytes(&DATAREF_GET_TAG),
        Field::I32(frequency),
        Field::I32(slot),
        Field::CStr(name),
    ];
    encode_padded(buf, RREF_FRAME_LEN, &fields)
}

/// Build a `DREF` frame assigning `value` to `name`.
///
/// # Errors
///
/// Returns [`CodecError::BufferTooSmall`] if `buf` is shorter than
/// [`DREF_FRAME_LEN`] or the name plus terminator exceeds [`DREF_NAME_LEN`].
pub fn encode_dataref_set(buf: &mut [u8], value: f32, name: &str) -> CodecResult<usize> {
    let fields = [
        Field::Bytes(&DATAREF_SET_TAG),
        Field::F32(value),
        Field::CStr(name),
    ];
    encode_padded(buf, DREF_FRAME_LEN, &fields)
}

/// Length of the `RPOS` request for `frequency`.
pub fn pose_request_len(frequency: i32) -> usize {
    let digits = frequency.to_string();
    encoded_size(&[Field::Bytes(&POSE_TAG), Field::CStr(&digits)])
}

/// Build an `RPOS` request: the tag followed by the frequency as ASCII text.
///
/// # Errors
///
/// Returns [`CodecError::BufferTooSmall`] if `buf` is shorter than
/// [`pose_request_len`].
pub fn encode_pose_request(buf: &mut [u8], frequency: i32) -> CodecResult<usize> {
    let digits = frequency.to_string();
    encode(buf, 0, &[Field::Bytes(&POSE_TAG), Field::CStr(&digits)])
}

/// Frequency and slot carried by an `RREF` request, with its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatarefRequest {
    pub frequency: i32,
    pub slot: i32,
    pub name: String,
}

/// Parse an outbound `RREF` request. Used by simulator fakes and capture tools.
///
/// # Errors
///
/// Returns an error if the tag is not `RREF`, the frame is truncated, or the
/// name field has no terminator.
pub fn parse_dataref_request(data: &[u8]) -> CodecResult<DatarefRequest> {
    if FrameKind::classify(data) != Some(FrameKind::DatarefGet) {
        return Err(CodecError::unexpected_tag("RREF", data));
    }
    let mut fields = Vec::with_capacity(2);
    let end = decode(data, HEADER_LEN, &[FieldKind::I32, FieldKind::I32], &mut fields)?;
    let name = read_cstr(data, end).ok_or(CodecError::invalid_length("RREF", data.len()))?;
    match fields.as_slice() {
        [Field::I32(frequency), Field::I32(slot)] => Ok(DatarefRequest {
            frequency: *frequency,
            slot: *slot,
            name,
        }),
        _ => Err(CodecError::invalid_length("RREF", data.len())),
    }
}

/// One value carried by an `RREF` response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatarefUpdate {
    pub slot: i32,
    pub value: f32,
}

/// Iterator over the `{slot, value}` pairs of an `RREF` response.
#[derive(Debug)]
pub struct DatarefUpdates<'a> {
    pairs: std::slice::ChunksExact<'a, u8>,
    scratch: Vec<Field<'static>>,
}

impl Iterator for DatarefUpdates<'_> {
    type Item = DatarefUpdate;

    fn next(&mut self) -> Option<Self::Item> {
        let pair = self.pairs.next()?;
        decode(pair, 0, &RREF_PAIR_LAYOUT, &mut self.scratch).ok()?;
        match self.scratch.as_slice() {
            [Field::I32(slot), Field::F32(value)] => Some(DatarefUpdate {
                slot: *slot,
                value: *value,
            }),
            _ => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pairs.size_hint()
    }
}

/// Parse an inbound `RREF` response.
///
/// # Errors
///
/// Returns an error if the tag is not `RREF` or the payload is not a whole
/// number of 8-byte pairs.
pub fn parse_dataref_response(data: &[u8]) -> CodecResult<DatarefUpdates<'_>> {
    if FrameKind::classify(data) != Some(FrameKind::DatarefGet) {
        return Err(CodecError::unexpected_tag("RREF", data));
    }
    let payload = data
        .get(HEADER_LEN..)
        .ok_or(CodecError::truncated(HEADER_LEN, data.len()))?;
    if payload.len() % RREF_PAIR_LEN != 0 {
        return Err(CodecError::invalid_length("RREF", data.len()));
    }
    Ok(DatarefUpdates {
        pairs: payload.chunks_exact(RREF_PAIR_LEN),
        scratch: Vec::with_capacity(RREF_PAIR_LAYOUT.len()),
    })
}

/// Build an `RREF` response from `(slot, value)` pairs. Used by simulator fakes.
///
/// # Errors
///
/// Returns [`CodecError::BufferTooSmall`] if `buf` cannot hold every pair.
pub fn encode_dataref_response(buf: &mut [u8], updates: &[DatarefUpdate]) -> CodecResult<usize> {
    let mut end = encode(buf, 0, &[Field::Bytes(&DATAREF_GET_TAG)])?;
    for update in updates {
        end = encode(buf, end, &[Field::I32(update.slot), Field::F32(update.value)])?;
    }
    Ok(end)
}

/// Encode `fields` into the first `frame_len` bytes of `buf` and zero the rest
/// of the frame.
fn encode_padded(buf: &mut [u8], frame_len: usize, fields: &[Field<'_>]) -> CodecResult<usize> {
    let available = buf.len();
    let frame = buf
        .get_mut(..frame_len)
        .ok_or(CodecError::buffer_too_small(frame_len, available))?;
    let end = encode(frame, 0, fields)?;
    if let Some(padding) = frame.get_mut(end..) {
        padding.fill(0);
    }
    Ok(frame_len)
}

/// Read a NUL-terminated string starting at `offset`.
pub(crate) fn read_cstr(data: &[u8], offset: usize) -> Option<String> {
    let rest = data.get(offset..)?;
    let len = rest.iter().position(|&b| b == 0)?;
    let bytes = rest.get(..len)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}
