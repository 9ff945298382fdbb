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
use streamsketches::frequencies::{ItemsSketch, LongsSketch, StringSerde};

fn longs_fixture() -> LongsSketch {
    let mut sketch = LongsSketch::new(64).unwrap();
    sketch.update_with_count(-1, 20).unwrap();
    for item in 0..30i64 {
        sketch.update_with_count(item, item + 1).unwrap();
    }
    sketch
}

fn assert_longs_equivalent(restored: &LongsSketch, original: &LongsSketch) {
    assert_eq!(restored.get_total_weight(), original.get_total_weight());
    assert_eq!(restored.get_maximum_error(), original.get_maximum_error());
    assert_eq!(
        restored.get_num_active_items(),
        original.get_num_active_items()
    );
    assert_eq!(restored.get_lg_max_map_size(), original.get_lg_max_map_size());
    assert_eq!(restored.get_lg_cur_map_size(), original.get_lg_cur_map_size());
    for item in -1..31i64 {
        assert_eq!(restored.get_estimate(item), original.get_estimate(item));
        assert_eq!(restored.get_lower_bound(item), original.get_lower_bound(item));
    }
}

#[test]
fn test_longs_empty_round_trip() {
    let sketch = LongsSketch::new(64).unwrap();
    let bytes = sketch.serialize();
    assert_eq!(bytes.len(), 8);

    let restored = LongsSketch::deserialize(&bytes).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.get_lg_max_map_size(), 6);
}

#[test]
fn test_longs_round_trip() {
    let sketch = longs_fixture();
    let restored = LongsSketch::deserialize(&sketch.serialize()).unwrap();
    assert_longs_equivalent(&restored, &sketch);
}

#[test]
fn test_longs_string_round_trip() {
    let sketch = longs_fixture();
    let restored = LongsSketch::deserialize_from_string(&sketch.serialize_to_string()).unwrap();
    assert_longs_equivalent(&restored, &sketch);
}

#[test]
fn test_items_round_trip_with_string_serde() {
    let mut sketch = ItemsSketch::<String>::new(64).unwrap();
    sketch.update_with_count("heavy".to_string(), 25).unwrap();
    for i in 0..20 {
        sketch.update(format!("item{i}")).unwrap();
    }

    let bytes = sketch.serialize_with(&StringSerde);
    let restored = ItemsSketch::<String>::deserialize_with(&bytes, &StringSerde).unwrap();

    assert_eq!(restored.get_total_weight(), sketch.get_total_weight());
    assert_eq!(restored.get_maximum_error(), sketch.get_maximum_error());
    assert_eq!(
        restored.get_num_active_items(),
        sketch.get_num_active_items()
    );
    assert_eq!(restored.get_estimate(&"heavy".to_string()), 25);
    for i in 0..20 {
        let item = format!("item{i}");
        assert_eq!(restored.get_estimate(&item), sketch.get_estimate(&item));
    }
}

#[test]
fn test_items_empty_round_trip() {
    let sketch = ItemsSketch::<String>::new(32).unwrap();
    let bytes = sketch.serialize_with(&StringSerde);
    assert_eq!(bytes.len(), 8);
    let restored = ItemsSketch::<String>::deserialize_with(&bytes, &StringSerde).unwrap();
    assert!(restored.is_empty());
}

#[test]
fn test_truncated_preamble_rejected() {
    let err = LongsSketch::deserialize(&[1, 1, 10]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_wrong_family_rejected() {
    let mut bytes = longs_fixture().serialize();
    bytes[2] = 7;
    let err = LongsSketch::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid family"));
}

#[test]
fn test_empty_flag_contradiction_rejected() {
    let mut bytes = longs_fixture().serialize();
    // Claim empty while keeping the non-empty preamble size.
    bytes[5] |= 4;
    let err = LongsSketch::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("preamble"));
}

#[test]
fn test_truncated_keys_rejected() {
    let bytes = longs_fixture().serialize();
    let err = LongsSketch::deserialize(&bytes[..bytes.len() - 4]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_malformed_string_tokens_rejected() {
    assert!(LongsSketch::deserialize_from_string("1,10").is_err());
    assert!(LongsSketch::deserialize_from_string("1,10,6,3,1,5,0,abc,1").is_err());
    // Token count disagrees with the declared active count.
    assert!(LongsSketch::deserialize_from_string("1,10,6,3,2,5,0,3,1").is_err());
    // Wrong family id.
    assert!(LongsSketch::deserialize_from_string("1,7,6,3,0,0,0").is_err());
}
