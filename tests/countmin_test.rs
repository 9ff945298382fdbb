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

use streamsketches::countmin::CountMinSketch;
use streamsketches::error::ErrorKind;

#[test]
fn test_parameter_suggestions() {
    assert_eq!(CountMinSketch::suggest_num_buckets(0.2).unwrap(), 14);
    assert_eq!(CountMinSketch::suggest_num_buckets(0.1).unwrap(), 28);
    assert_eq!(CountMinSketch::suggest_num_buckets(0.05).unwrap(), 55);
    assert_eq!(CountMinSketch::suggest_num_buckets(0.01).unwrap(), 272);

    assert_eq!(CountMinSketch::suggest_num_hashes(0.682689492).unwrap(), 2);
    assert_eq!(CountMinSketch::suggest_num_hashes(0.954499736).unwrap(), 4);
    assert_eq!(CountMinSketch::suggest_num_hashes(0.997300204).unwrap(), 6);

    let buckets = CountMinSketch::suggest_num_buckets(0.1).unwrap();
    let sketch = CountMinSketch::new(3, buckets).unwrap();
    assert!(sketch.relative_error() <= 0.1);
}

#[test]
fn test_suggestion_range_validation() {
    assert_eq!(
        CountMinSketch::suggest_num_buckets(0.0).unwrap_err().kind(),
        ErrorKind::ConfigOutOfRange
    );
    assert_eq!(
        CountMinSketch::suggest_num_hashes(1.0).unwrap_err().kind(),
        ErrorKind::ConfigOutOfRange
    );
    assert_eq!(
        CountMinSketch::suggest_num_hashes(-0.5).unwrap_err().kind(),
        ErrorKind::ConfigOutOfRange
    );
}

#[test]
fn test_signed_weight_scenario() {
    let mut sketch = CountMinSketch::with_seed(1, 5, 1234567).unwrap();
    sketch.update_with_weight("x", 1);
    sketch.update_with_weight("y", -1);

    assert_eq!(sketch.total_weight(), 2);
    assert_eq!(sketch.estimate("x"), 1);
    assert_eq!(sketch.estimate("y"), -1);
}

#[test]
fn test_never_underestimates_positive_streams() {
    let num_buckets = CountMinSketch::suggest_num_buckets(0.05).unwrap();
    let num_hashes = CountMinSketch::suggest_num_hashes(0.95).unwrap();
    let mut sketch = CountMinSketch::new(num_hashes, num_buckets).unwrap();

    let mut truth = std::collections::HashMap::new();
    for i in 0..2_000u32 {
        let key = (i * i) % 157;
        sketch.update(key.to_le_bytes());
        *truth.entry(key).or_insert(0i64) += 1;
    }

    let allowance = (sketch.relative_error() * sketch.total_weight() as f64) as i64;
    let mut overshoots = 0usize;
    for (key, count) in &truth {
        let estimate = sketch.estimate(key.to_le_bytes());
        assert!(estimate >= *count, "estimate {estimate} under {count}");
        assert!(sketch.lower_bound(key.to_le_bytes()) <= *count);
        assert!(sketch.upper_bound(key.to_le_bytes()) >= *count);
        if estimate > count + allowance {
            overshoots += 1;
        }
    }
    // The epsilon overshoot probability is bounded by 1 - confidence.
    assert!(
        overshoots * 20 <= truth.len(),
        "{overshoots} of {} keys exceeded the error allowance",
        truth.len()
    );
}

#[test]
fn test_merge_adds_counters() {
    let mut a = CountMinSketch::with_seed(4, 64, 99).unwrap();
    let mut b = CountMinSketch::with_seed(4, 64, 99).unwrap();
    for i in 0..100u32 {
        a.update(i.to_le_bytes());
        b.update_with_weight(i.to_le_bytes(), 2);
    }

    a.merge(&b).unwrap();
    assert_eq!(a.total_weight(), 300);
    for i in 0..100u32 {
        assert!(a.estimate(i.to_le_bytes()) >= 3);
    }
}

#[test]
fn test_merge_shape_mismatch() {
    let mut a = CountMinSketch::new(3, 32).unwrap();
    let b = CountMinSketch::new(4, 32).unwrap();
    assert_eq!(
        a.merge(&b).unwrap_err().kind(),
        ErrorKind::IncompatibleMerge
    );
}
