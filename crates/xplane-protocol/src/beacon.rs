//! `BECN` discovery beacon.
//!
//! The simulator multicasts a beacon about once per second on
//! [`MULTICAST_GROUP`]:[`MULTICAST_PORT`]. After the 5-byte tag:
//!
//! | Field          | Offset | Type |
//! |----------------|--------|------|
//! | major version  | 5      | u8   |
//! | minor version  | 6      | u8   |
//! | host app id    | 7      | i32  |
//! | version number | 11     | i32  |
//! | role           | 15     | u32  |
//! | port           | 19     | u16  |
//! | computer name  | 21     | NUL-terminated, optional |

use std::fmt;
use std::net::Ipv4Addr;

use crate::codec::{Field, FieldKind, decode, encode, encoded_size};
use crate::error::{CodecError, CodecResult};
use crate::frame::{BEACON_TAG, FrameKind, HEADER_LEN, read_cstr};

/// Well-known multicast group the simulator announces itself on.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 1, 1);
/// Well-known beacon port.
pub const MULTICAST_PORT: u16 = 49707;
/// Bytes up to and including the announced port.
pub const BEACON_FIXED_LEN: usize = HEADER_LEN + 16;

const BEACON_LAYOUT: [FieldKind; 6] = [
    FieldKind::U8,
    FieldKind::U8,
    FieldKind::I32,
    FieldKind::I32,
    FieldKind::U32,
    FieldKind::U16,
];

/// Application sending the beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostApplication {
    XPlane,
    PlaneMaker,
    Unknown(i32),
}

impl HostApplication {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => HostApplication::XPlane,
            2 => HostApplication::PlaneMaker,
            other => HostApplication::Unknown(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            HostApplication::XPlane => 1,
            HostApplication::PlaneMaker => 2,
            HostApplication::Unknown(other) => other,
        }
    }
}

impl fmt::Display for HostApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostApplication::XPlane => write!(f, "X-Plane"),
            HostApplication::PlaneMaker => write!(f, "PlaneMaker"),
            HostApplication::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// Role of the announcing simulator instance in a multi-machine setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeaconRole {
    Master,
    ExternalVisual,
    Ios,
    Unknown(u32),
}

impl BeaconRole {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => BeaconRole::Master,
            2 => BeaconRole::ExternalVisual,
            3 => BeaconRole::Ios,
            other => BeaconRole::Unknown(other),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            BeaconRole::Master => 1,
            BeaconRole::ExternalVisual => 2,
            BeaconRole::Ios => 3,
            BeaconRole::Unknown(other) => other,
        }
    }
}

impl fmt::Display for BeaconRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeaconRole::Master => write!(f, "master"),
            BeaconRole::ExternalVisual => write!(f, "external visual"),
            BeaconRole::Ios => write!(f, "IOS"),
            BeaconRole::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// Decoded beacon contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconInfo {
    pub major_version: u8,
    pub minor_version: u8,
    pub host: HostApplication,
    /// Simulator version, e.g. `120100` for 12.1.0.
    pub version: i32,
    pub role: BeaconRole,
    /// UDP port the simulator listens on for requests.
    pub port: u16,
    pub computer_name: Option<String>,
}

impl BeaconInfo {
    /// Beacon for an X-Plane master instance listening on `port`.
    pub fn xplane(version: i32, port: u16) -> Self {
        Self {
            major_version: 1,
            minor_version: 2,
            host: HostApplication::XPlane,
            version,
            role: BeaconRole::Master,
            port,
            computer_name: None,
        }
    }

    pub fn with_computer_name(mut self, name: impl Into<String>) -> Self {
        self.computer_name = Some(name.into());
        self
    }

    fn fields(&self) -> [Field<'_>; 7] {
        [
            Field::Bytes(&BEACON_TAG),
            Field::U8(self.major_version),
            Field::U8(self.minor_version),
            Field::I32(self.host.raw()),
            Field::I32(self.version),
            Field::U32(self.role.raw()),
            Field::U16(self.port),
        ]
    }

    /// Encoded length, including the computer name when present.
    pub fn encoded_len(&self) -> usize {
        let name_len = self
            .computer_name
            .as_deref()
            .map_or(0, |name| Field::CStr(name).encoded_len());
        encoded_size(&self.fields()).saturating_add(name_len)
    }

    /// Encode the beacon. Used by simulator fakes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::BufferTooSmall`] if `buf` is shorter than
    /// [`BeaconInfo::encoded_len`].
    pub fn encode(&self, buf: &mut [u8]) -> CodecResult<usize> {
        let end = encode(buf, 0, &self.fields())?;
        match self.computer_name.as_deref() {
            Some(name) => encode(buf, end, &[Field::CStr(name)]),
            None => Ok(end),
        }
    }

    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let mut buf = vec![0u8; self.encoded_len()];
        self.encode(&mut buf)?;
        Ok(buf)
    }
}

/// Parse a `BECN` datagram.
///
/// # Errors
///
/// Returns an error if the tag is not `BECN` or the fixed part is truncated.
pub fn parse_beacon(data: &[u8]) -> CodecResult<BeaconInfo> {
    if FrameKind::classify(data) != Some(FrameKind::Beacon) {
        return Err(CodecError::unexpected_tag("BECN", data));
    }
    let mut fields = Vec::with_capacity(BEACON_LAYOUT.len());
    let end = decode(data, HEADER_LEN, &BEACON_LAYOUT, &mut fields)?;
    let computer_name = read_cstr(data, end).filter(|name| !name.is_empty());
    match fields.as_slice() {
        [
            Field::U8(major_version),
            Field::U8(minor_version),
            Field::I32(host),
            Field::I32(version),
            Field::U32(role),
            Field::U16(port),
        ] => Ok(BeaconInfo {
            major_version: *major_version,
            minor_version: *minor_version,
            host: HostApplication::from_raw(*host),
            version: *version,
            role: BeaconRole::from_raw(*role),
            port: *port,
            computer_name,
        }),
        _ => Err(CodecError::invalid_length("BECN", data.len())),
    }
}
