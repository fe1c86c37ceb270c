//! `RPOS` pose response.

use crate::codec::{Field, FieldKind, decode, encode};
use crate::error::{CodecError, CodecResult};
use crate::frame::{FrameKind, HEADER_LEN, POSE_TAG};

/// Wire size of one pose record.
pub const POSE_RECORD_LEN: usize = 64;

const POSE_LAYOUT: [FieldKind; 13] = [
    FieldKind::F64,
    FieldKind::F64,
    FieldKind::F64,
    FieldKind::F32,
    FieldKind::F32,
    FieldKind::F32,
    FieldKind::F32,
    FieldKind::F32,
    FieldKind::F32,
    FieldKind::F32,
    FieldKind::F32,
    FieldKind::F32,
    FieldKind::F32,
];

/// Aircraft position, attitude and rates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseRecord {
    /// Longitude, degrees.
    pub longitude: f64,
    /// Latitude, degrees.
    pub latitude: f64,
    /// Elevation above MSL, meters.
    pub elevation: f64,
    /// Height above ground, meters.
    pub agl: f32,
    /// Pitch, degrees.
    pub pitch: f32,
    /// True heading, degrees.
    pub track: f32,
    /// Roll, degrees.
    pub roll: f32,
    /// Local velocity, m/s (OpenGL axes).
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    /// Body rates, rad/s.
    pub roll_rate: f32,
    pub pitch_rate: f32,
    pub yaw_rate: f32,
}

impl PoseRecord {
    fn fields(&self) -> [Field<'static>; 13] {
        [
            Field::F64(self.longitude),
            Field::F64(self.latitude),
            Field::F64(self.elevation),
            Field::F32(self.agl),
            Field::F32(self.pitch),
            Field::F32(self.track),
            Field::F32(self.roll),
            Field::F32(self.vx),
            Field::F32(self.vy),
            Field::F32(self.vz),
            Field::F32(self.roll_rate),
            Field::F32(self.pitch_rate),
            Field::F32(self.yaw_rate),
        ]
    }

    /// Encode as a full `RPOS` response. Used by simulator fakes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::BufferTooSmall`] if `buf` is shorter than
    /// `5 + 64` bytes.
    pub fn encode_response(&self, buf: &mut [u8]) -> CodecResult<usize> {
        let end = encode(buf, 0, &[Field::Bytes(&POSE_TAG)])?;
        encode(buf, end, &self.fields())
    }
}

/// Parse an `RPOS` response.
///
/// The payload must be a whole, non-empty number of 64-byte records; only the
/// first record is used.
///
/// # Errors
///
/// Returns an error for a wrong tag or a length that is not `5 + 64k`.
pub fn parse_pose_response(data: &[u8]) -> CodecResult<PoseRecord> {
    if FrameKind::classify(data) != Some(FrameKind::Pose) {
        return Err(CodecError::unexpected_tag("RPOS", data));
    }
    let payload_len = data.len().saturating_sub(HEADER_LEN);
    if data.len() <= HEADER_LEN + 1 || payload_len % POSE_RECORD_LEN != 0 {
        return Err(CodecError::invalid_length("RPOS", data.len()));
    }

    let mut fields = Vec::with_capacity(POSE_LAYOUT.len());
    decode(data, HEADER_LEN, &POSE_LAYOUT, &mut fields)?;
    match fields.as_slice() {
        [
            Field::F64(longitude),
            Field::F64(latitude),
            Field::F64(elevation),
            Field::F32(agl),
            Field::F32(pitch),
            Field::F32(track),
            Field::F32(roll),
            Field::F32(vx),
            Field::F32(vy),
            Field::F32(vz),
            Field::F32(roll_rate),
            Field::F32(pitch_rate),
            Field::F32(yaw_rate),
        ] => Ok(PoseRecord {
            longitude: *longitude,
            latitude: *latitude,
            elevation: *elevation,
            agl: *agl,
            pitch: *pitch,
            track: *track,
            roll: *roll,
            vx: *vx,
            vy: *vy,
            vz: *vz,
            roll_rate: *roll_rate,
            pitch_rate: *pitch_rate,
            yaw_rate: *yaw_rate,
        }),
        _ => Err(CodecError::invalid_length("RPOS", data.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn sample() -> PoseRecord {
        PoseRecord {
            longitude: 8.5475,
            latitude: 47.4581,
            elevation: 432.0,
            agl: 1.5,
            pitch: 2.0,
            track: 283.0,
            roll: -0.5,
            vx: 1.0,
            vy: 0.0,
            vz: -3.0,
            roll_rate: 0.01,
            pitch_rate: 0.02,
            yaw_rate: 0.03,
        }
    }

    #[test]
    fn test_record_layout_is_64_bytes() {
        let size: usize = POSE_LAYOUT.iter().map(|kind| kind.width()).sum();
        assert_eq!(size, POSE_RECORD_LEN);
    }

    #[test]
    fn test_parse_single_record() -> TestResult {
        let mut buf = vec![0u8; HEADER_LEN + POSE_RECORD_LEN];
        sample().encode_response(&mut buf)?;
        assert_eq!(parse_pose_response(&buf)?, sample());
        Ok(())
    }

    #[test]
    fn test_parse_uses_first_of_several_records() -> TestResult {
        let mut buf = vec![0u8; HEADER_LEN + POSE_RECORD_LEN];
        sample().encode_response(&mut buf)?;
        buf.extend_from_slice(&[0xFFu8; POSE_RECORD_LEN]);
        assert_eq!(parse_pose_response(&buf)?, sample());
        Ok(())
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert!(parse_pose_response(b"RPOS\0").is_err());
        assert!(parse_pose_response(b"RPOS\0\x01").is_err());
        let mut data = b"RPOS\0".to_vec();
        data.extend_from_slice(&[0u8; POSE_RECORD_LEN - 1]);
        assert!(matches!(
            parse_pose_response(&data),
            Err(CodecError::InvalidLength { .. })
        ));
    }
}
