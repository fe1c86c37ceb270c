//! Property tests for the field codec and frame parsers.

use proptest::prelude::*;
use xplane_udp_protocol::{
    BeaconInfo, DatarefUpdate, Field, FieldKind, HEADER_LEN, PoseRecord, RREF_FRAME_LEN,
    RREF_NAME_LEN, RREF_PAIR_LEN, decode, encode, encode_dataref_request,
    encode_dataref_response, encoded_size, parse_beacon, parse_dataref_request,
    parse_dataref_response, parse_pose_response,
};

fn numeric_field() -> impl Strategy<Value = Field<'static>> {
    prop_oneof![
        any::<u8>().prop_map(Field::U8),
        any::<u16>().prop_map(Field::U16),
        any::<u32>().prop_map(Field::U32),
        any::<i32>().prop_map(Field::I32),
        (-1.0e6f32..1.0e6f32).prop_map(Field::F32),
        (-1.0e12f64..1.0e12f64).prop_map(Field::F64),
    ]
}

proptest! {
    #[test]
    fn numeric_fields_round_trip(
        fields in proptest::collection::vec(numeric_field(), 0..24),
        offset in 0usize..16,
    ) {
        let mut buf = vec![0u8; offset + encoded_size(&fields)];
        let end = encode(&mut buf, offset, &fields)
            .map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        prop_assert_eq!(end - offset, encoded_size(&fields));
        prop_assert_eq!(end, buf.len());

        let kinds: Vec<FieldKind> = fields.iter().filter_map(Field::kind).collect();
        let mut decoded = Vec::new();
        decode(&buf, offset, &kinds, &mut decoded)
            .map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        prop_assert_eq!(decoded, fields);
    }

    #[test]
    fn encode_into_short_buffer_fails(
        fields in proptest::collection::vec(numeric_field(), 1..12),
        shortfall in 1usize..8,
    ) {
        let size = encoded_size(&fields);
        let mut buf = vec![0u8; size.saturating_sub(shortfall)];
        prop_assert!(encode(&mut buf, 0, &fields).is_err());
    }

    #[test]
    fn dataref_request_round_trip(
        frequency in 0i32..1000,
        slot in 0i32..100_000,
        name in "[a-z_/]{1,120}(\\[[0-9]{1,2}\\])?",
    ) {
        let mut buf = vec![0u8; RREF_FRAME_LEN];
        let len = encode_dataref_request(&mut buf, frequency, slot, &name)
            .map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        prop_assert_eq!(len, RREF_FRAME_LEN);
        let request = parse_dataref_request(&buf)
            .map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        prop_assert_eq!(request.frequency, frequency);
        prop_assert_eq!(request.slot, slot);
        prop_assert_eq!(request.name, name);
    }

    #[test]
    fn oversized_names_are_rejected(extra in 0usize..64) {
        let mut buf = vec![0u8; RREF_FRAME_LEN];
        let name = "n".repeat(RREF_NAME_LEN + extra);
        prop_assert!(encode_dataref_request(&mut buf, 1, 0, &name).is_err());
    }

    #[test]
    fn dataref_response_yields_every_pair(
        pairs in proptest::collection::vec((0i32..4096, -1.0e6f32..1.0e6f32), 0..32),
    ) {
        let updates: Vec<DatarefUpdate> = pairs
            .iter()
            .map(|&(slot, value)| DatarefUpdate { slot, value })
            .collect();
        let mut buf = vec![0u8; HEADER_LEN + RREF_PAIR_LEN * updates.len()];
        encode_dataref_response(&mut buf, &updates)
            .map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        let parsed: Vec<DatarefUpdate> = parse_dataref_response(&buf)
            .map_err(|e| TestCaseError::fail(format!("{e:?}")))?
            .collect();
        prop_assert_eq!(parsed, updates);
    }

    #[test]
    fn beacon_round_trip(version in any::<i32>(), port in any::<u16>()) {
        let beacon = BeaconInfo::xplane(version, port);
        let bytes = beacon.to_bytes().map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        let parsed = parse_beacon(&bytes).map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        prop_assert_eq!(parsed, beacon);
    }

    #[test]
    fn parsers_never_panic_on_arbitrary_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..600)
    ) {
        let _beacon = parse_beacon(&data).is_ok();
        let _pose = parse_pose_response(&data).is_ok();
        let _request = parse_dataref_request(&data).is_ok();
        if let Ok(updates) = parse_dataref_response(&data) {
            prop_assert!(updates.count() <= data.len() / RREF_PAIR_LEN);
        }
    }

    #[test]
    fn tagged_garbage_never_panics(
        tag in prop_oneof![Just(*b"RREF\0"), Just(*b"RPOS\0"), Just(*b"BECN\0")],
        body in proptest::collection::vec(any::<u8>(), 0..300),
    ) {
        let mut data = tag.to_vec();
        data.extend_from_slice(&body);
        let _beacon = parse_beacon(&data).is_ok();
        let _pose = parse_pose_response(&data).is_ok();
        if let Ok(updates) = parse_dataref_response(&data) {
            prop_assert_eq!(updates.count(), body.len() / RREF_PAIR_LEN);
        }
    }

    #[test]
    fn pose_round_trip(lon in -180.0f64..180.0, lat in -90.0f64..90.0, track in 0.0f32..360.0) {
        let pose = PoseRecord { longitude: lon, latitude: lat, track, ..PoseRecord::default() };
        let mut buf = vec![0u8; HEADER_LEN + 64];
        pose.encode_response(&mut buf).map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        let parsed = parse_pose_response(&buf).map_err(|e| TestCaseError::fail(format!("{e:?}")))?;
        prop_assert_eq!(parsed, pose);
    }
}
