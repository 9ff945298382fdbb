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

//! Reverse purge hash map for i64 keys.
//!
//! Open addressing with linear probing over parallel key/value/state
//! arrays. A state of zero marks an empty slot; otherwise the state is
//! the probe distance plus one, which lets deletion back-fill holes
//! without breaking any probe chain.

use crate::error::Error;
use crate::hash::fmix64;

const LOAD_FACTOR: f64 = 0.75;
const DRIFT_LIMIT: usize = 1024;
const MAX_SAMPLE_SIZE: usize = 1024;

#[derive(Debug, Clone)]
pub struct ReversePurgeLongHashMap {
    lg_length: u8,
    load_threshold: usize,
    keys: Vec<i64>,
    values: Vec<i64>,
    states: Vec<u16>,
    num_active: usize,
}

impl ReversePurgeLongHashMap {
    pub fn new(map_size: usize) -> Result<Self, Error> {
        if !map_size.is_power_of_two() {
            return Err(Error::config(format!(
                "map_size must be a power of 2, got {map_size}"
            )));
        }
        let lg_length = map_size.trailing_zeros() as u8;
        let load_threshold = (map_size as f64 * LOAD_FACTOR) as usize;
        Ok(Self {
            lg_length,
            load_threshold,
            keys: vec![0; map_size],
            values: vec![0; map_size],
            states: vec![0; map_size],
            num_active: 0,
        })
    }

    /// Returns the stored value for a key, or 0 when absent.
    pub fn get(&self, key: i64) -> i64 {
        let probe = self.hash_probe(key);
        if self.states[probe] > 0 {
            return self.values[probe];
        }
        0
    }

    /// Adds `adjust_amount` to the key's value, inserting it if absent.
    pub fn adjust_or_put_value(&mut self, key: i64, adjust_amount: i64) -> Result<(), Error> {
        let mask = self.keys.len() - 1;
        let mut probe = (hash_long(key) as usize) & mask;
        let mut drift: usize = 1;
        while self.states[probe] != 0 && self.keys[probe] != key {
            probe = (probe + 1) & mask;
            drift += 1;
            if drift >= DRIFT_LIMIT {
                return Err(Error::invariant("hash map drift limit exceeded"));
            }
        }
        if self.states[probe] == 0 {
            self.keys[probe] = key;
            self.values[probe] = adjust_amount;
            self.states[probe] = drift as u16;
            self.num_active += 1;
        } else {
            self.values[probe] += adjust_amount;
        }
        Ok(())
    }

    /// Deletes every non-positive entry while preserving probe chains.
    ///
    /// Deletion runs backwards in two passes split at the first empty
    /// slot found from the back, so the wrap-around cluster at the start
    /// of the table is swept as well.
    pub fn keep_only_positive_counts(&mut self) {
        let len = self.keys.len();
        let mut first_probe = len - 1;
        while self.states[first_probe] > 0 {
            first_probe -= 1;
        }
        for probe in (0..first_probe).rev() {
            if self.states[probe] > 0 && self.values[probe] <= 0 {
                self.hash_delete(probe);
                self.num_active -= 1;
            }
        }
        for probe in (first_probe..len).rev() {
            if self.states[probe] > 0 && self.values[probe] <= 0 {
                self.hash_delete(probe);
                self.num_active -= 1;
            }
        }
    }

    pub fn adjust_all_values_by(&mut self, adjust_amount: i64) {
        for value in &mut self.values {
            *value += adjust_amount;
        }
    }

    /// Subtracts a sampled lower-median from every value, prunes the
    /// non-positive remainder, and returns the subtracted amount.
    pub fn purge(&mut self, sample_size: usize) -> i64 {
        let limit = sample_size.min(self.num_active).min(MAX_SAMPLE_SIZE);
        if limit == 0 {
            return 0;
        }
        let mut samples = Vec::with_capacity(limit);
        let mut i = 0usize;
        while samples.len() < limit {
            if self.is_active(i) {
                samples.push(self.values[i]);
            }
            i += 1;
        }
        let mid = (samples.len() - 1) / 2;
        samples.select_nth_unstable(mid);
        let median = samples[mid];
        self.adjust_all_values_by(-median);
        self.keep_only_positive_counts();
        median
    }

    /// Grows to `new_size`, reinserting every active triple.
    pub fn resize(&mut self, new_size: usize) -> Result<(), Error> {
        if !new_size.is_power_of_two() {
            return Err(Error::config(format!(
                "new_size must be a power of 2, got {new_size}"
            )));
        }
        let old_keys = std::mem::take(&mut self.keys);
        let old_values = std::mem::take(&mut self.values);
        let old_states = std::mem::take(&mut self.states);
        self.keys = vec![0; new_size];
        self.values = vec![0; new_size];
        self.states = vec![0; new_size];
        self.lg_length = new_size.trailing_zeros() as u8;
        self.load_threshold = (new_size as f64 * LOAD_FACTOR) as usize;
        self.num_active = 0;
        for i in 0..old_keys.len() {
            if old_states[i] > 0 {
                self.adjust_or_put_value(old_keys[i], old_values[i])?;
            }
        }
        Ok(())
    }

    pub fn get_length(&self) -> usize {
        self.keys.len()
    }

    pub fn get_lg_length(&self) -> u8 {
        self.lg_length
    }

    pub fn get_capacity(&self) -> usize {
        self.load_threshold
    }

    pub fn get_num_active(&self) -> usize {
        self.num_active
    }

    /// Active keys in slot order, paired positionally with
    /// [`Self::get_active_values`].
    pub fn get_active_keys(&self) -> Vec<i64> {
        let mut keys = Vec::with_capacity(self.num_active);
        for i in 0..self.keys.len() {
            if self.states[i] > 0 {
                keys.push(self.keys[i]);
            }
        }
        keys
    }

    /// Active values in slot order.
    pub fn get_active_values(&self) -> Vec<i64> {
        let mut values = Vec::with_capacity(self.num_active);
        for i in 0..self.values.len() {
            if self.states[i] > 0 {
                values.push(self.values[i]);
            }
        }
        values
    }

    pub fn iter(&self) -> ReversePurgeLongIter<'_> {
        ReversePurgeLongIter::new(self)
    }

    fn is_active(&self, probe: usize) -> bool {
        self.states[probe] > 0
    }

    fn hash_probe(&self, key: i64) -> usize {
        let mask = self.keys.len() - 1;
        let mut probe = (hash_long(key) as usize) & mask;
        while self.states[probe] > 0 && self.keys[probe] != key {
            probe = (probe + 1) & mask;
        }
        probe
    }

    /// Deletes the entry at `delete_probe` and walks the rest of the
    /// chain, back-filling the hole with the first entry whose drift
    /// exceeds the step so every survivor remains reachable.
    fn hash_delete(&mut self, mut delete_probe: usize) {
        self.states[delete_probe] = 0;
        let mut drift: usize = 1;
        let mask = self.keys.len() - 1;
        let mut probe = (delete_probe + drift) & mask;
        while self.states[probe] != 0 {
            if self.states[probe] as usize > drift {
                self.keys[delete_probe] = self.keys[probe];
                self.values[delete_probe] = self.values[probe];
                self.states[delete_probe] = self.states[probe] - drift as u16;
                self.states[probe] = 0;
                drift = 0;
                delete_probe = probe;
            }
            probe = (probe + 1) & mask;
            drift += 1;
            debug_assert!(drift < DRIFT_LIMIT, "drift limit exceeded");
        }
    }
}

pub struct ReversePurgeLongIter<'a> {
    map: &'a ReversePurgeLongHashMap,
    index: usize,
    count: usize,
    stride: usize,
    mask: usize,
}

impl<'a> ReversePurgeLongIter<'a> {
    fn new(map: &'a ReversePurgeLongHashMap) -> Self {
        let size = map.keys.len();
        // Golden-ratio stride, forced odd so it is co-prime with the
        // power-of-two capacity.
        let stride = ((size as f64 * 0.6180339887498949) as usize) | 1;
        let mask = size - 1;
        let index = 0usize.wrapping_sub(stride);
        Self {
            map,
            index,
            count: 0,
            stride,
            mask,
        }
    }
}

impl<'a> Iterator for ReversePurgeLongIter<'a> {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.count >= self.map.num_active {
            return None;
        }
        loop {
            self.index = self.index.wrapping_add(self.stride) & self.mask;
            if self.map.states[self.index] > 0 {
                self.count += 1;
                return Some((self.map.keys[self.index], self.map.values[self.index]));
            }
        }
    }
}

#[inline]
fn hash_long(key: i64) -> u64 {
    fmix64(key as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_adjust_get() {
        let mut map = ReversePurgeLongHashMap::new(8).unwrap();
        map.adjust_or_put_value(17, 3).unwrap();
        map.adjust_or_put_value(17, 2).unwrap();
        map.adjust_or_put_value(42, 1).unwrap();
        assert_eq!(map.get(17), 5);
        assert_eq!(map.get(42), 1);
        assert_eq!(map.get(99), 0);
        assert_eq!(map.get_num_active(), 2);
    }

    #[test]
    fn test_resize_preserves_entries() {
        let mut map = ReversePurgeLongHashMap::new(8).unwrap();
        for key in 0..6i64 {
            map.adjust_or_put_value(key, key + 1).unwrap();
        }
        map.resize(32).unwrap();
        assert_eq!(map.get_length(), 32);
        assert_eq!(map.get_num_active(), 6);
        for key in 0..6i64 {
            assert_eq!(map.get(key), key + 1);
        }
    }

    #[test]
    fn test_purge_subtracts_median_and_prunes() {
        let mut map = ReversePurgeLongHashMap::new(16).unwrap();
        // Heavy hitter plus unit-count noise.
        map.adjust_or_put_value(1000, 50).unwrap();
        for key in 0..8i64 {
            map.adjust_or_put_value(key, 1).unwrap();
        }
        let median = map.purge(16);
        assert_eq!(median, 1);
        assert_eq!(map.get(1000), 49);
        for key in 0..8i64 {
            assert_eq!(map.get(key), 0);
        }
        assert_eq!(map.get_num_active(), 1);
    }

    #[test]
    fn test_chain_preserved_after_deletes() {
        // Force collisions into a small table, then purge and verify
        // every surviving key is still reachable.
        let mut map = ReversePurgeLongHashMap::new(16).unwrap();
        for key in 0..12i64 {
            let count = if key % 3 == 0 { 10 } else { 1 };
            map.adjust_or_put_value(key, count).unwrap();
        }
        let median = map.purge(16);
        assert!(median >= 1);
        for key in 0..12i64 {
            if key % 3 == 0 {
                assert_eq!(map.get(key), 10 - median);
            } else {
                assert_eq!(map.get(key), 0);
            }
        }
    }

    #[test]
    fn test_iterator_visits_every_active_slot_once() {
        let mut map = ReversePurgeLongHashMap::new(32).unwrap();
        for key in 0..20i64 {
            map.adjust_or_put_value(key, key + 1).unwrap();
        }
        let mut seen: Vec<i64> = map.iter().map(|(k, _)| k).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..20i64).collect::<Vec<_>>());
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        assert!(ReversePurgeLongHashMap::new(12).is_err());
    }
}
