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

use crate::codec::{Family, SketchBytes, SketchSlice};
use crate::common::random::{RandomSource, XorShift64};
use crate::countmin::serialization::*;
use crate::error::Error;
use crate::hash::compute_seed_hash;

const DEFAULT_SEED: u64 = 9001;

// d * w must stay under 2^30 counters.
const MAX_TABLE_ENTRIES: u64 = 1 << 30;

/// A Count-Min sketch with signed 64-bit counters.
///
/// The table is a depth-by-width matrix of counters; each row hashes the
/// item with its own seed drawn deterministically from the sketch seed.
/// For non-negative weight streams the estimate never undercounts.
#[derive(Debug, Clone, PartialEq)]
pub struct CountMinSketch {
    num_hashes: u8,
    num_buckets: u32,
    seed: u64,
    row_seeds: Vec<u64>,
    counters: Vec<i64>,
    total_weight: i64,
}

impl CountMinSketch {
    /// Creates a sketch with `num_hashes` rows of `num_buckets` counters
    /// and the default seed.
    pub fn new(num_hashes: u8, num_buckets: u32) -> Result<Self, Error> {
        Self::with_seed(num_hashes, num_buckets, DEFAULT_SEED)
    }

    /// Creates a sketch with an explicit seed.
    pub fn with_seed(num_hashes: u8, num_buckets: u32, seed: u64) -> Result<Self, Error> {
        if num_hashes == 0 {
            return Err(Error::config("num_hashes must be at least 1"));
        }
        if num_buckets < 3 {
            return Err(Error::config(format!(
                "num_buckets must be at least 3, got {num_buckets}"
            )));
        }
        let entries = num_hashes as u64 * num_buckets as u64;
        if entries >= MAX_TABLE_ENTRIES {
            return Err(Error::config(format!(
                "table of {num_hashes} x {num_buckets} counters exceeds the size limit"
            )));
        }

        // Per-row hash seeds come from a PRNG seeded by the sketch seed,
        // so the same seed always rebuilds the same rows.
        let mut rng = XorShift64::seeded(seed);
        let row_seeds = (0..num_hashes).map(|_| rng.next_u64()).collect();

        Ok(Self {
            num_hashes,
            num_buckets,
            seed,
            row_seeds,
            counters: vec![0; entries as usize],
            total_weight: 0,
        })
    }

    /// Suggests the number of buckets for a target relative error.
    pub fn suggest_num_buckets(relative_error: f64) -> Result<u32, Error> {
        if relative_error <= 0.0 || !relative_error.is_finite() {
            return Err(Error::config(format!(
                "relative_error must be positive, got {relative_error}"
            )));
        }
        Ok((std::f64::consts::E / relative_error).ceil() as u32)
    }

    /// Suggests the number of hash rows for a target confidence in [0, 1).
    pub fn suggest_num_hashes(confidence: f64) -> Result<u8, Error> {
        if !(0.0..1.0).contains(&confidence) {
            return Err(Error::config(format!(
                "confidence must be in [0, 1), got {confidence}"
            )));
        }
        Ok((1.0 / (1.0 - confidence)).ln().ceil() as u8)
    }

    pub fn num_hashes(&self) -> u8 {
        self.num_hashes
    }

    pub fn num_buckets(&self) -> u32 {
        self.num_buckets
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Total absolute weight presented to the sketch.
    pub fn total_weight(&self) -> i64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight == 0
    }

    /// The relative error guarantee, `e / num_buckets`.
    pub fn relative_error(&self) -> f64 {
        std::f64::consts::E / self.num_buckets as f64
    }

    /// Updates an item with weight one.
    pub fn update<B: AsRef<[u8]>>(&mut self, item: B) {
        self.update_with_weight(item, 1);
    }

    /// Updates an item with a signed weight.
    pub fn update_with_weight<B: AsRef<[u8]>>(&mut self, item: B, weight: i64) {
        let bytes = item.as_ref();
        self.total_weight += weight.abs();
        for row in 0..self.num_hashes as usize {
            let bucket = self.bucket_for(bytes, row);
            self.counters[row * self.num_buckets as usize + bucket] += weight;
        }
    }

    /// Estimated frequency: the minimum counter across rows.
    pub fn estimate<B: AsRef<[u8]>>(&self, item: B) -> i64 {
        let bytes = item.as_ref();
        let mut min = i64::MAX;
        for row in 0..self.num_hashes as usize {
            let bucket = self.bucket_for(bytes, row);
            min = min.min(self.counters[row * self.num_buckets as usize + bucket]);
        }
        min
    }

    /// Upper bound: the estimate plus the table-wide error allowance.
    pub fn upper_bound<B: AsRef<[u8]>>(&self, item: B) -> i64 {
        self.estimate(item) + (self.relative_error() * self.total_weight as f64) as i64
    }

    /// Lower bound: the estimate itself.
    pub fn lower_bound<B: AsRef<[u8]>>(&self, item: B) -> i64 {
        self.estimate(item)
    }

    /// Merges another sketch of identical shape and seed into this one.
    pub fn merge(&mut self, other: &Self) -> Result<(), Error> {
        if self.num_hashes != other.num_hashes
            || self.num_buckets != other.num_buckets
            || self.seed != other.seed
        {
            return Err(Error::incompatible_merge(format!(
                "incompatible sketches: {}x{} seed {} vs {}x{} seed {}",
                self.num_hashes,
                self.num_buckets,
                self.seed,
                other.num_hashes,
                other.num_buckets,
                other.seed
            )));
        }
        for (dst, src) in self.counters.iter_mut().zip(&other.counters) {
            *dst += src;
        }
        self.total_weight += other.total_weight;
        Ok(())
    }

    /// Serializes this sketch into a byte vector.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = SketchBytes::with_capacity(16 + 8 + self.counters.len() * 8);
        out.write_u8(PREAMBLE_LONGS_SHORT);
        out.write_u8(SERIAL_VERSION);
        out.write_u8(Family::COUNTMIN.id);
        out.write_u8(if self.is_empty() { FLAGS_IS_EMPTY } else { 0 });
        out.write_u32_le(0);
        out.write_i32_le(self.num_buckets as i32);
        out.write_u8(self.num_hashes);
        out.write_u16_le(compute_seed_hash(self.seed));
        out.write_u8(0);

        if !self.is_empty() {
            out.write_i64_le(self.total_weight);
            for counter in &self.counters {
                out.write_i64_le(*counter);
            }
        }
        out.into_bytes()
    }

    /// Reconstructs a sketch. The caller supplies the seed; the preamble
    /// only stores its 16-bit hash, which must match.
    pub fn deserialize_with_seed(bytes: &[u8], seed: u64) -> Result<Self, Error> {
        if bytes.len() < 16 {
            return Err(Error::insufficient_data_of(
                "countmin preamble",
                format!("expected at least 16 bytes, got {}", bytes.len()),
            ));
        }

        let mut slice = SketchSlice::new(bytes);
        let read_err = |e| Error::insufficient_data_of("countmin preamble", e);
        let pre_longs = slice.read_u8().map_err(read_err)? & 0x3F;
        let ser_ver = slice.read_u8().map_err(read_err)?;
        let family = slice.read_u8().map_err(read_err)?;
        let flags = slice.read_u8().map_err(read_err)?;
        let _unused = slice.read_u32_le().map_err(read_err)?;
        let num_buckets = slice.read_i32_le().map_err(read_err)?;
        let num_hashes = slice.read_u8().map_err(read_err)?;
        let seed_hash = slice.read_u16_le().map_err(read_err)?;
        let _unused8 = slice.read_u8().map_err(read_err)?;

        if pre_longs != PREAMBLE_LONGS_SHORT {
            return Err(Error::invalid_preamble_ints(PREAMBLE_LONGS_SHORT, pre_longs));
        }
        if ser_ver != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(SERIAL_VERSION, ser_ver));
        }
        Family::COUNTMIN.validate_id(family)?;
        if seed_hash != compute_seed_hash(seed) {
            return Err(Error::deserial(format!(
                "incompatible seed hash: stored {seed_hash:#06x}"
            )));
        }
        if num_buckets < 0 {
            return Err(Error::deserial(format!(
                "negative num_buckets {num_buckets}"
            )));
        }

        let mut sketch = Self::with_seed(num_hashes, num_buckets as u32, seed)
            .map_err(|e| Error::deserial(e.message().to_string()))?;

        let is_empty = flags & FLAGS_IS_EMPTY != 0;
        if is_empty {
            return Ok(sketch);
        }

        let body_err = |e| Error::insufficient_data_of("countmin counters", e);
        sketch.total_weight = slice.read_i64_le().map_err(body_err)?;
        for counter in sketch.counters.iter_mut() {
            *counter = slice.read_i64_le().map_err(body_err)?;
        }
        Ok(sketch)
    }

    #[inline]
    fn bucket_for(&self, bytes: &[u8], row: usize) -> usize {
        let (h1, _) = mur3::murmurhash3_x64_128(bytes, self.row_seeds[row] as u32);
        (h1 % self.num_buckets as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_defaults() {
        let sketch = CountMinSketch::new(3, 5).unwrap();
        assert_eq!(sketch.num_hashes(), 3);
        assert_eq!(sketch.num_buckets(), 5);
        assert_eq!(sketch.seed(), 9001);
        assert!(sketch.is_empty());
        assert_eq!(sketch.total_weight(), 0);
        assert_eq!(sketch.estimate("missing"), 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(CountMinSketch::new(0, 5).is_err());
        assert!(CountMinSketch::new(3, 2).is_err());
        assert!(CountMinSketch::new(255, 1 << 23).is_err());
    }

    #[test]
    fn test_row_seeds_are_deterministic() {
        let a = CountMinSketch::with_seed(4, 32, 42).unwrap();
        let b = CountMinSketch::with_seed(4, 32, 42).unwrap();
        assert_eq!(a.row_seeds, b.row_seeds);

        let c = CountMinSketch::with_seed(4, 32, 43).unwrap();
        assert_ne!(a.row_seeds, c.row_seeds);
    }

    #[test]
    fn test_update_and_bounds() {
        let mut sketch = CountMinSketch::with_seed(3, 128, 123).unwrap();
        sketch.update("x");
        sketch.update_with_weight("x", 9);
        assert_eq!(sketch.estimate("x"), 10);
        assert_eq!(sketch.total_weight(), 10);
        let estimate = sketch.estimate("x");
        assert!(sketch.lower_bound("x") <= estimate);
        assert!(estimate <= sketch.upper_bound("x"));
    }

    #[test]
    fn test_never_underestimates() {
        let mut sketch = CountMinSketch::new(5, 64).unwrap();
        for i in 0..500u32 {
            sketch.update_with_weight(i.to_le_bytes(), (i % 7 + 1) as i64);
        }
        for i in 0..500u32 {
            let truth = (i % 7 + 1) as i64;
            assert!(sketch.estimate(i.to_le_bytes()) >= truth);
        }
    }

    #[test]
    fn test_merge_compatible() {
        let mut a = CountMinSketch::with_seed(3, 32, 7).unwrap();
        let mut b = CountMinSketch::with_seed(3, 32, 7).unwrap();
        a.update_with_weight("x", 2);
        b.update_with_weight("x", 3);
        b.update("y");

        a.merge(&b).unwrap();
        assert_eq!(a.total_weight(), 6);
        assert!(a.estimate("x") >= 5);
        assert!(a.estimate("y") >= 1);
    }

    #[test]
    fn test_merge_incompatible() {
        let mut a = CountMinSketch::with_seed(3, 32, 7).unwrap();
        let b = CountMinSketch::with_seed(3, 64, 7).unwrap();
        let c = CountMinSketch::with_seed(3, 32, 8).unwrap();
        assert!(a.merge(&b).is_err());
        assert!(a.merge(&c).is_err());
    }
}
