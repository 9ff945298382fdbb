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

//! Auxiliary exceptions map for the 4-bit register array.
//!
//! Stores the true register value for slots whose nibble carries the
//! 0xF sentinel. Open addressing over packed (slot, value) pairs with a
//! stride derived from the slot bits above the table size.

use crate::error::Error;
use crate::hll::{RESIZE_DENOM, RESIZE_NUMER, get_slot, get_value, pack_coupon};

// Initial aux table size in log2 ints, indexed by lg_config_k.
const LG_AUX_ARR_INTS: [u8; 22] = [
    0, 2, 2, 2, 2, 2, 2, 3, 3, 3, 4, 4, 5, 5, 6, 7, 8, 9, 10, 11, 12, 13,
];

const EMPTY_PAIR: u32 = 0;

#[derive(Debug, Clone)]
pub(crate) struct AuxMap {
    lg_config_k: u8,
    lg_aux_arr_ints: u8,
    pairs: Box<[u32]>,
    num_active: usize,
}

impl AuxMap {
    pub fn new(lg_config_k: u8) -> Self {
        let lg_aux_arr_ints = LG_AUX_ARR_INTS[lg_config_k as usize];
        Self::with_lg_size(lg_config_k, lg_aux_arr_ints)
    }

    fn with_lg_size(lg_config_k: u8, lg_aux_arr_ints: u8) -> Self {
        Self {
            lg_config_k,
            lg_aux_arr_ints,
            pairs: vec![EMPTY_PAIR; 1 << lg_aux_arr_ints].into_boxed_slice(),
            num_active: 0,
        }
    }

    /// Rebuilds an aux map from serialized (slot, value) pairs.
    pub fn from_pairs(
        lg_config_k: u8,
        pairs: impl Iterator<Item = u32>,
    ) -> Result<Self, Error> {
        let mut map = Self::new(lg_config_k);
        for pair in pairs {
            if pair == EMPTY_PAIR {
                continue;
            }
            map.must_add(get_slot(pair), get_value(pair))?;
        }
        Ok(map)
    }

    /// Adopts a raw pair array as-is, preserving its probe layout
    /// (updatable deserialization).
    pub fn from_raw(lg_config_k: u8, lg_aux_arr_ints: u8, pairs: Box<[u32]>) -> Self {
        let num_active = pairs.iter().filter(|p| **p != EMPTY_PAIR).count();
        Self {
            lg_config_k,
            lg_aux_arr_ints,
            pairs,
            num_active,
        }
    }

    pub fn num_active(&self) -> usize {
        self.num_active
    }

    pub fn is_empty(&self) -> bool {
        self.num_active == 0
    }

    pub fn lg_aux_arr_ints(&self) -> u8 {
        self.lg_aux_arr_ints
    }

    /// Raw pair array, including empty slots (updatable serialization).
    pub fn raw_pairs(&self) -> &[u32] {
        &self.pairs
    }

    /// Iterates the active (slot, value) entries in table order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.pairs
            .iter()
            .filter(|pair| **pair != EMPTY_PAIR)
            .map(|pair| (get_slot(*pair), get_value(*pair)))
    }

    /// Looks up the true value stored for a slot, if present.
    pub fn get(&self, slot: u32) -> Option<u8> {
        match self.find(slot) {
            Ok(idx) => Some(get_value(self.pairs[idx])),
            Err(_) => None,
        }
    }

    /// Inserts a slot that must not already be present.
    pub fn must_add(&mut self, slot: u32, value: u8) -> Result<(), Error> {
        match self.find(slot) {
            Ok(_) => Err(Error::invariant(format!(
                "aux map add: slot {slot} already present"
            ))),
            Err(idx) => {
                self.pairs[idx] = pack_coupon(slot, value);
                self.num_active += 1;
                self.grow_if_needed();
                Ok(())
            }
        }
    }

    /// Replaces the value of a slot that must already be present.
    pub fn must_replace(&mut self, slot: u32, value: u8) -> Result<(), Error> {
        match self.find(slot) {
            Ok(idx) => {
                self.pairs[idx] = pack_coupon(slot, value);
                Ok(())
            }
            Err(_) => Err(Error::invariant(format!(
                "aux map replace: slot {slot} not found"
            ))),
        }
    }

    /// Returns the value for a slot that must be present.
    pub fn must_find_value_for(&self, slot: u32) -> Result<u8, Error> {
        match self.find(slot) {
            Ok(idx) => Ok(get_value(self.pairs[idx])),
            Err(_) => Err(Error::invariant(format!(
                "aux map find: slot {slot} not found"
            ))),
        }
    }

    /// Probes for a slot. `Ok` holds the index of the matching pair,
    /// `Err` the index of the empty slot that terminated the probe.
    fn find(&self, slot: u32) -> Result<usize, usize> {
        let mask = (1usize << self.lg_aux_arr_ints) - 1;
        let config_k_mask = (1u32 << self.lg_config_k) - 1;
        let stride = ((slot >> self.lg_aux_arr_ints) | 1) as usize;
        let mut probe = slot as usize & mask;

        loop {
            let pair = self.pairs[probe];
            if pair == EMPTY_PAIR {
                return Err(probe);
            }
            if get_slot(pair) & config_k_mask == slot & config_k_mask {
                return Ok(probe);
            }
            probe = (probe + stride) & mask;
        }
    }

    fn grow_if_needed(&mut self) {
        let capacity = self.pairs.len();
        if self.num_active * RESIZE_DENOM as usize <= capacity * RESIZE_NUMER as usize {
            return;
        }
        let mut grown = Self::with_lg_size(self.lg_config_k, self.lg_aux_arr_ints + 1);
        for pair in self.pairs.iter().filter(|p| **p != EMPTY_PAIR) {
            match grown.find(get_slot(*pair)) {
                Ok(_) => unreachable!("duplicate slot while growing aux map"),
                Err(idx) => {
                    grown.pairs[idx] = *pair;
                    grown.num_active += 1;
                }
            }
        }
        *self = grown;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_get_replace() {
        let mut aux = AuxMap::new(10);
        aux.must_add(17, 20).unwrap();
        aux.must_add(900, 16).unwrap();

        assert_eq!(aux.get(17), Some(20));
        assert_eq!(aux.must_find_value_for(900).unwrap(), 16);
        assert_eq!(aux.get(5), None);

        aux.must_replace(17, 23).unwrap();
        assert_eq!(aux.get(17), Some(23));
        assert_eq!(aux.num_active(), 2);
    }

    #[test]
    fn test_must_add_duplicate_is_invariant_violation() {
        let mut aux = AuxMap::new(10);
        aux.must_add(17, 20).unwrap();
        assert!(aux.must_add(17, 21).is_err());
    }

    #[test]
    fn test_must_replace_missing_is_invariant_violation() {
        let mut aux = AuxMap::new(10);
        assert!(aux.must_replace(17, 20).is_err());
    }

    #[test]
    fn test_growth_preserves_entries() {
        // lg_config_k = 10 starts with a 16-int table.
        let mut aux = AuxMap::new(10);
        for slot in 0..100u32 {
            aux.must_add(slot, ((slot % 40) + 16) as u8).unwrap();
        }
        assert_eq!(aux.num_active(), 100);
        assert!(aux.lg_aux_arr_ints() > 4);
        for slot in 0..100u32 {
            assert_eq!(aux.get(slot), Some(((slot % 40) + 16) as u8));
        }
    }

    #[test]
    fn test_round_trip_through_pairs() {
        let mut aux = AuxMap::new(12);
        for slot in [1u32, 77, 2048, 4000] {
            aux.must_add(slot, 20).unwrap();
        }
        let rebuilt =
            AuxMap::from_pairs(12, aux.iter().map(|(s, v)| pack_coupon(s, v))).unwrap();
        assert_eq!(rebuilt.num_active(), 4);
        for slot in [1u32, 77, 2048, 4000] {
            assert_eq!(rebuilt.get(slot), Some(20));
        }
    }
}
