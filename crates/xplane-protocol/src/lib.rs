//! X-Plane UDP protocol: frame encoding and parsing.
//!
//! This crate is I/O-free. It provides the field-descriptor codec and the
//! handful of frames a dataref client needs:
//!
//! - `RREF` subscribe requests and periodic value responses
//! - `DREF` dataref writes
//! - `RPOS` pose queries and responses
//! - `BECN` multicast discovery beacons
//!
//! Every frame starts with a 5-byte tag (four ASCII letters and a NUL);
//! [`FrameKind::classify`] looks only at the first four bytes.
//!
//! ```
//! use xplane_udp_protocol::{RREF_FRAME_LEN, encode_dataref_request, parse_dataref_request};
//!
//! let mut buf = vec![0u8; RREF_FRAME_LEN];
//! encode_dataref_request(&mut buf, 10, 0, "sim/flightmodel/position/latitude")?;
//! assert_eq!(parse_dataref_request(&buf)?.frequency, 10);
//! # Ok::<(), xplane_udp_protocol::CodecError>(())
//! ```

#![deny(static_mut_refs)]

pub mod beacon;
pub mod codec;
pub mod error;
pub mod frame;
pub mod pose;

pub use beacon::{
    BEACON_FIXED_LEN, BeaconInfo, BeaconRole, HostApplication, MULTICAST_GROUP, MULTICAST_PORT,
    parse_beacon,
};
pub use codec::{Field, FieldKind, decode, encode, encoded_size};
pub use error::{CodecError, CodecResult};
pub use frame::{
    BEACON_TAG, DATAREF_GET_TAG, DATAREF_SET_TAG, DREF_FRAME_LEN, DREF_NAME_LEN, DatarefRequest,
    DatarefUpdate, DatarefUpdates, FrameKind, HEADER_LEN, POSE_TAG, RREF_FRAME_LEN, RREF_NAME_LEN,
    RREF_PAIR_LEN, encode_dataref_request, encode_dataref_response, encode_dataref_set,
    encode_pose_request, parse_dataref_request, parse_dataref_response, pose_request_len,
};
pub use pose::{POSE_RECORD_LEN, PoseRecord, parse_pose_response};
