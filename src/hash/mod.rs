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

//! MurmurHash3 wrappers shared by the sketch families.

use std::hash::Hash;
use std::hash::Hasher;

/// Hashes an arbitrary `Hash` item into the two 64-bit MurmurHash3 lanes.
pub(crate) fn murmur128_of<H: Hash>(item: H, seed: u32) -> (u64, u64) {
    let mut hasher = mur3::Hasher128::with_seed(seed);
    item.hash(&mut hasher);
    hasher.finish128()
}

/// Computes the 16-bit hash of a seed, written into preambles in place of
/// the seed itself.
pub(crate) fn compute_seed_hash(seed: u64) -> u16 {
    let (h1, _) = mur3::murmurhash3_x64_128(&seed.to_le_bytes(), 0);
    (h1 & 0xffff) as u16
}

/// MurmurHash3 finalization mix, used as a standalone hash for i64 keys.
#[inline]
pub(crate) fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51afd7ed558ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ceb9fe1a85ec53);
    k ^ (k >> 33)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur_reference_vectors() {
        // remainder > 8
        let key = "The quick brown fox jumps over the lazy dog";
        let (h1, h2) = mur3::murmurhash3_x64_128(key.as_bytes(), 0);
        assert_eq!(h1, 0xe34bbc7bbc071b6c);
        assert_eq!(h2, 0x7a433ca9c49a9347);

        // remainder = 0
        let key = "The quick brown fox jumps over t";
        let (h1, h2) = mur3::murmurhash3_x64_128(key.as_bytes(), 0);
        assert_eq!(h1, 0xdf6af91bb29bdacf);
        assert_eq!(h2, 0x91a341c58df1f3a6);
    }

    #[test]
    fn test_seed_hash_is_stable() {
        let first = compute_seed_hash(9001);
        let second = compute_seed_hash(9001);
        assert_eq!(first, second);
        assert_ne!(compute_seed_hash(9001), compute_seed_hash(9002));
    }

    #[test]
    fn test_fmix64_avalanche() {
        assert_ne!(fmix64(1), fmix64(2));
        assert_eq!(fmix64(0), 0);
    }
}
