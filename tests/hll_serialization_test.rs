// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use googletest::assert_that;
use googletest::prelude::contains_substring;
use streamsketches::error::ErrorKind;
use streamsketches::hll::{HllSketch, HllType};

fn coupon_checksum(sketch: &HllSketch) -> u64 {
    sketch.coupons().iter().map(|c| *c as u64).sum()
}

/// Observable-state equivalence: configuration, mode flags, registers,
/// and estimator output all match.
fn assert_equivalent(restored: &HllSketch, original: &HllSketch) {
    assert_eq!(restored.lg_config_k(), original.lg_config_k());
    assert_eq!(restored.target_type(), original.target_type());
    assert_eq!(restored.is_empty(), original.is_empty());
    assert_eq!(restored.out_of_order(), original.out_of_order());
    assert_eq!(coupon_checksum(restored), coupon_checksum(original));
    assert_eq!(restored.estimate().to_bits(), original.estimate().to_bits());
}

fn sketch_with(lg_k: u8, target: HllType, count: u64) -> HllSketch {
    let mut sketch = HllSketch::new(lg_k, target).unwrap();
    for i in 0..count {
        sketch.update(i).unwrap();
    }
    sketch
}

#[test]
fn test_empty_round_trip() {
    for target in [HllType::Hll4, HllType::Hll6, HllType::Hll8] {
        let sketch = HllSketch::new(12, target).unwrap();

        let compact = sketch.serialize_compact();
        assert_eq!(compact.len(), 8);
        assert_equivalent(&HllSketch::deserialize(&compact).unwrap(), &sketch);

        let updatable = sketch.serialize_updatable();
        assert_equivalent(&HllSketch::deserialize(&updatable).unwrap(), &sketch);
    }
}

#[test]
fn test_list_mode_round_trip() {
    let sketch = sketch_with(12, HllType::Hll4, 5);

    let compact = sketch.serialize_compact();
    assert_equivalent(&HllSketch::deserialize(&compact).unwrap(), &sketch);

    let updatable = sketch.serialize_updatable();
    let restored = HllSketch::deserialize(&updatable).unwrap();
    assert_equivalent(&restored, &sketch);
    // The updatable image is stable through a round trip.
    assert_eq!(restored.serialize_updatable(), updatable);
}

#[test]
fn test_set_mode_round_trip() {
    let sketch = sketch_with(14, HllType::Hll6, 200);

    let compact = sketch.serialize_compact();
    assert_equivalent(&HllSketch::deserialize(&compact).unwrap(), &sketch);

    let updatable = sketch.serialize_updatable();
    let restored = HllSketch::deserialize(&updatable).unwrap();
    assert_equivalent(&restored, &sketch);
    assert_eq!(restored.serialize_updatable(), updatable);
}

#[test]
fn test_dense_round_trip_every_variant() {
    for target in [HllType::Hll4, HllType::Hll6, HllType::Hll8] {
        let sketch = sketch_with(12, target, 100_000);

        let compact = sketch.serialize_compact();
        assert_equivalent(&HllSketch::deserialize(&compact).unwrap(), &sketch);

        let updatable = sketch.serialize_updatable();
        let restored = HllSketch::deserialize(&updatable).unwrap();
        assert_equivalent(&restored, &sketch);
        assert_eq!(restored.serialize_updatable(), updatable, "{target:?}");
    }
}

#[test]
fn test_hll4_wide_value_range_round_trip() {
    // Few registers, many items: values spread far past cur_min, which
    // exercises the nibble shift protocol and, at the tail, the aux map.
    let sketch = sketch_with(7, HllType::Hll4, 500_000);

    let compact = sketch.serialize_compact();
    assert_equivalent(&HllSketch::deserialize(&compact).unwrap(), &sketch);

    let updatable = sketch.serialize_updatable();
    let restored = HllSketch::deserialize(&updatable).unwrap();
    assert_equivalent(&restored, &sketch);
    assert_eq!(restored.serialize_updatable(), updatable);
}

#[test]
fn test_too_short_rejected() {
    let err = HllSketch::deserialize(&[0u8; 4]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("insufficient data"));
}

#[test]
fn test_wrong_family_rejected() {
    let mut bytes = sketch_with(12, HllType::Hll8, 5).serialize_compact();
    bytes[2] = 10;
    let err = HllSketch::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid family"));
}

#[test]
fn test_wrong_serial_version_rejected() {
    let mut bytes = sketch_with(12, HllType::Hll8, 5).serialize_compact();
    bytes[1] = 9;
    let err = HllSketch::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("serial version"));
}

#[test]
fn test_wrong_preamble_ints_rejected() {
    let mut bytes = sketch_with(12, HllType::Hll8, 5).serialize_compact();
    bytes[0] = 10; // claims a dense preamble while in list mode
    let err = HllSketch::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("preamble"));
}

#[test]
fn test_empty_flag_with_dense_mode_rejected() {
    let mut bytes = sketch_with(12, HllType::Hll8, 100_000).serialize_compact();
    bytes[5] |= 4; // empty flag on an hll-mode sketch
    let err = HllSketch::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("empty flag"));
}

#[test]
fn test_truncated_register_payload_rejected() {
    let bytes = sketch_with(12, HllType::Hll8, 100_000).serialize_compact();
    let err = HllSketch::deserialize(&bytes[..bytes.len() / 2]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_lg_k_out_of_range_rejected() {
    let mut bytes = sketch_with(12, HllType::Hll8, 5).serialize_compact();
    bytes[3] = 25;
    let err = HllSketch::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("lg_config_k"));
}
