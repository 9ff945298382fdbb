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

//! Frequent items sketches (Misra-Gries / SpaceSaving with reverse purge).

use std::hash::Hash;

use crate::codec::{Family, SketchBytes, SketchSlice};
use crate::error::Error;
use crate::frequencies::reverse_purge_item_hash_map::ReversePurgeItemHashMap;
use crate::frequencies::reverse_purge_long_hash_map::ReversePurgeLongHashMap;
use crate::frequencies::serde::ItemsSerde;
use crate::frequencies::serialization::*;

const LG_MIN_MAP_SIZE: u8 = 3;
const MAX_LG_MAP_SIZE: u8 = 26;
const SAMPLE_SIZE: usize = 1024;
const EPSILON_FACTOR: f64 = 3.5;
const LOAD_FACTOR_NUMERATOR: usize = 3;
const LOAD_FACTOR_DENOMINATOR: usize = 4;

/// Error guarantees for frequent item queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Include items whose upper bound reaches the threshold (no false negatives).
    NoFalseNegatives,
    /// Include items whose lower bound reaches the threshold (no false positives).
    NoFalsePositives,
}

/// Result row for frequent item queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<T> {
    item: T,
    estimate: i64,
    upper_bound: i64,
    lower_bound: i64,
}

impl<T> Row<T> {
    /// Returns the item value.
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Returns the estimated frequency.
    pub fn estimate(&self) -> i64 {
        self.estimate
    }

    /// Returns the upper bound for the frequency.
    pub fn upper_bound(&self) -> i64 {
        self.upper_bound
    }

    /// Returns the lower bound for the frequency.
    pub fn lower_bound(&self) -> i64 {
        self.lower_bound
    }
}

fn check_count(count: i64) -> Result<(), Error> {
    if count < 0 {
        return Err(Error::config(format!(
            "count may not be negative, got {count}"
        )));
    }
    Ok(())
}

fn exact_log2(value: usize) -> Result<u8, Error> {
    if !value.is_power_of_two() {
        return Err(Error::config(format!(
            "map size must be a power of 2, got {value}"
        )));
    }
    Ok(value.trailing_zeros() as u8)
}

fn row_included(error_type: ErrorType, lower: i64, upper: i64, threshold: i64) -> bool {
    match error_type {
        ErrorType::NoFalseNegatives => upper >= threshold,
        ErrorType::NoFalsePositives => lower >= threshold,
    }
}

/// Epsilon for a sketch configured with `lg_max_map_size`.
fn epsilon_for_lg(lg_max_map_size: u8) -> f64 {
    EPSILON_FACTOR / (1u64 << lg_max_map_size) as f64
}

/// Frequent items sketch specialized for `i64` keys.
#[derive(Debug, Clone)]
pub struct LongsSketch {
    lg_max_map_size: u8,
    cur_map_cap: usize,
    offset: i64,
    stream_weight: i64,
    sample_size: usize,
    hash_map: ReversePurgeLongHashMap,
}

impl LongsSketch {
    /// Creates a new sketch with the given maximum map size (a power of two).
    pub fn new(max_map_size: usize) -> Result<Self, Error> {
        let lg_max_map_size = exact_log2(max_map_size)?;
        Self::with_lg_map_sizes(lg_max_map_size, LG_MIN_MAP_SIZE)
    }

    /// Returns true if the sketch is empty.
    pub fn is_empty(&self) -> bool {
        self.hash_map.get_num_active() == 0
    }

    /// Returns the number of active items being tracked.
    pub fn get_num_active_items(&self) -> usize {
        self.hash_map.get_num_active()
    }

    /// Returns the total weight of the stream.
    pub fn get_total_weight(&self) -> i64 {
        self.stream_weight
    }

    /// Returns the estimated frequency for an item.
    pub fn get_estimate(&self, item: i64) -> i64 {
        let raw = self.hash_map.get(item);
        if raw > 0 { raw + self.offset } else { 0 }
    }

    /// Returns the lower bound for an item's frequency.
    pub fn get_lower_bound(&self, item: i64) -> i64 {
        self.hash_map.get(item)
    }

    /// Returns the upper bound for an item's frequency.
    pub fn get_upper_bound(&self, item: i64) -> i64 {
        self.hash_map.get(item) + self.offset
    }

    /// Returns the maximum error across all items.
    pub fn get_maximum_error(&self) -> i64 {
        self.offset
    }

    /// Returns epsilon for this sketch.
    pub fn get_epsilon(&self) -> f64 {
        epsilon_for_lg(self.lg_max_map_size)
    }

    /// Returns epsilon for a sketch configured with `lg_max_map_size`.
    pub fn get_epsilon_for_lg(lg_max_map_size: u8) -> f64 {
        epsilon_for_lg(lg_max_map_size)
    }

    /// Returns the a priori error estimate for a planned configuration.
    pub fn get_apriori_error(lg_max_map_size: u8, estimated_total_weight: i64) -> f64 {
        epsilon_for_lg(lg_max_map_size) * estimated_total_weight as f64
    }

    /// Returns the maximum number of items this sketch can track.
    pub fn get_maximum_map_capacity(&self) -> usize {
        (1usize << self.lg_max_map_size) * LOAD_FACTOR_NUMERATOR / LOAD_FACTOR_DENOMINATOR
    }

    /// Returns the current map capacity.
    pub fn get_current_map_capacity(&self) -> usize {
        self.cur_map_cap
    }

    /// Returns the configured lg_max_map_size.
    pub fn get_lg_max_map_size(&self) -> u8 {
        self.lg_max_map_size
    }

    /// Returns the current map size in log2.
    pub fn get_lg_cur_map_size(&self) -> u8 {
        self.hash_map.get_lg_length()
    }

    /// Updates the sketch with a count of one.
    pub fn update(&mut self, item: i64) -> Result<(), Error> {
        self.update_with_count(item, 1)
    }

    /// Updates the sketch with an item and a non-negative count.
    pub fn update_with_count(&mut self, item: i64, count: i64) -> Result<(), Error> {
        check_count(count)?;
        if count == 0 {
            return Ok(());
        }
        self.stream_weight += count;
        self.hash_map.adjust_or_put_value(item, count)?;
        self.maybe_resize_or_purge()
    }

    /// Merges another sketch into this one.
    pub fn merge(&mut self, other: &Self) -> Result<(), Error> {
        if other.is_empty() {
            return Ok(());
        }
        let merged_total = self.stream_weight + other.stream_weight;
        for (item, count) in other.hash_map.iter() {
            self.update_with_count(item, count)?;
        }
        self.offset += other.offset;
        self.stream_weight = merged_total;
        Ok(())
    }

    /// Resets the sketch to an empty state.
    pub fn reset(&mut self) -> Result<(), Error> {
        *self = Self::with_lg_map_sizes(self.lg_max_map_size, LG_MIN_MAP_SIZE)?;
        Ok(())
    }

    /// Returns frequent items using the sketch maximum error as threshold.
    pub fn get_frequent_items(&self, error_type: ErrorType) -> Vec<Row<i64>> {
        self.get_frequent_items_with_threshold(error_type, self.offset)
    }

    /// Returns frequent items using a custom threshold.
    pub fn get_frequent_items_with_threshold(
        &self,
        error_type: ErrorType,
        threshold: i64,
    ) -> Vec<Row<i64>> {
        let threshold = threshold.max(self.offset);
        let mut rows = Vec::new();
        for (item, raw) in self.hash_map.iter() {
            let lower = raw;
            let upper = raw + self.offset;
            if row_included(error_type, lower, upper, threshold) {
                rows.push(Row {
                    item,
                    estimate: upper,
                    upper_bound: upper,
                    lower_bound: lower,
                });
            }
        }
        rows.sort_by(|a, b| b.estimate.cmp(&a.estimate));
        rows
    }

    /// Serializes this sketch into a byte vector.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = SketchBytes::with_capacity(32 + self.get_num_active_items() * 16);
        if self.is_empty() {
            write_preamble(&mut out, self, true);
            return out.into_bytes();
        }
        write_preamble(&mut out, self, false);
        out.write_u32_le(self.get_num_active_items() as u32);
        out.write_u32_le(0);
        out.write_i64_le(self.stream_weight);
        out.write_i64_le(self.offset);

        for value in self.hash_map.get_active_values() {
            out.write_i64_le(value);
        }
        for key in self.hash_map.get_active_keys() {
            out.write_i64_le(key);
        }
        out.into_bytes()
    }

    /// Deserializes a sketch from bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let pre = read_preamble(bytes)?;
        let mut sketch = Self::with_lg_map_sizes(pre.lg_max, pre.lg_cur)?;
        if pre.is_empty {
            return Ok(sketch);
        }

        let mut body = SketchSlice::new(&bytes[8..]);
        let (active_items, stream_weight, offset_val) = read_body_header(&mut body)?;
        check_active_items(active_items, sketch.get_maximum_map_capacity())?;

        let mut values = Vec::with_capacity(active_items);
        for _ in 0..active_items {
            values.push(
                body.read_i64_le()
                    .map_err(|e| Error::insufficient_data_of("values", e))?,
            );
        }
        let mut keys = Vec::with_capacity(active_items);
        for _ in 0..active_items {
            keys.push(
                body.read_i64_le()
                    .map_err(|e| Error::insufficient_data_of("keys", e))?,
            );
        }

        for (key, value) in keys.into_iter().zip(values) {
            if value <= 0 {
                return Err(Error::deserial(format!(
                    "non-positive stored count {value} for key {key}"
                )));
            }
            sketch.update_with_count(key, value)?;
        }
        sketch.stream_weight = stream_weight;
        sketch.offset = offset_val;
        Ok(sketch)
    }

    /// Serializes into the legacy comma-separated token stream.
    pub fn serialize_to_string(&self) -> String {
        let mut tokens = vec![
            SER_VER.to_string(),
            Family::FREQUENCY.id.to_string(),
            self.lg_max_map_size.to_string(),
            self.hash_map.get_lg_length().to_string(),
            self.get_num_active_items().to_string(),
            self.stream_weight.to_string(),
            self.offset.to_string(),
        ];
        let values = self.hash_map.get_active_values();
        let keys = self.hash_map.get_active_keys();
        for (value, key) in values.iter().zip(keys.iter()) {
            tokens.push(value.to_string());
            tokens.push(key.to_string());
        }
        tokens.join(",")
    }

    /// Parses the legacy comma-separated token stream.
    pub fn deserialize_from_string(serialized: &str) -> Result<Self, Error> {
        let tokens: Vec<&str> = serialized.split(',').collect();
        if tokens.len() < 7 {
            return Err(Error::deserial(format!(
                "expected at least 7 tokens, got {}",
                tokens.len()
            )));
        }

        let parse = |token: &str, what: &'static str| -> Result<i64, Error> {
            token
                .trim()
                .parse::<i64>()
                .map_err(|e| Error::deserial(format!("invalid {what} token: {token:?}")).set_source(e))
        };

        let ser_ver = parse(tokens[0], "serial version")?;
        let family = parse(tokens[1], "family")?;
        let lg_max = parse(tokens[2], "lg_max_map_size")?;
        let lg_cur = parse(tokens[3], "lg_cur_map_size")?;
        let num_active = parse(tokens[4], "active count")?;
        let stream_weight = parse(tokens[5], "stream weight")?;
        let offset_val = parse(tokens[6], "offset")?;

        if ser_ver != SER_VER as i64 {
            return Err(Error::unsupported_serial_version(SER_VER, ser_ver as u8));
        }
        Family::FREQUENCY.validate_id(family as u8)?;
        if !(0..=MAX_LG_MAP_SIZE as i64).contains(&lg_max)
            || !(0..=MAX_LG_MAP_SIZE as i64).contains(&lg_cur)
        {
            return Err(Error::deserial("map size tokens out of range"));
        }
        if num_active < 0 || tokens.len() != 7 + (num_active as usize) * 2 {
            return Err(Error::deserial(format!(
                "token count {} does not match active count {num_active}",
                tokens.len()
            )));
        }

        let mut sketch = Self::with_lg_map_sizes(lg_max as u8, lg_cur as u8)?;
        for pair in tokens[7..].chunks_exact(2) {
            let value = parse(pair[0], "pair value")?;
            let key = parse(pair[1], "pair key")?;
            if value <= 0 {
                return Err(Error::deserial(format!(
                    "non-positive stored count {value} for key {key}"
                )));
            }
            sketch.update_with_count(key, value)?;
        }
        sketch.stream_weight = stream_weight;
        sketch.offset = offset_val;
        Ok(sketch)
    }

    fn maybe_resize_or_purge(&mut self) -> Result<(), Error> {
        if self.hash_map.get_num_active() > self.cur_map_cap {
            if self.hash_map.get_lg_length() < self.lg_max_map_size {
                self.hash_map.resize(self.hash_map.get_length() * 2)?;
                self.cur_map_cap = self.hash_map.get_capacity();
            } else {
                let delta = self.hash_map.purge(self.sample_size);
                self.offset += delta;
                if self.hash_map.get_num_active() > self.get_maximum_map_capacity() {
                    return Err(Error::invariant(
                        "purge did not reduce the number of active items",
                    ));
                }
            }
        }
        Ok(())
    }

    fn with_lg_map_sizes(lg_max_map_size: u8, lg_cur_map_size: u8) -> Result<Self, Error> {
        let lg_max = lg_max_map_size.max(LG_MIN_MAP_SIZE);
        let lg_cur = lg_cur_map_size.max(LG_MIN_MAP_SIZE);
        if lg_cur > lg_max {
            return Err(Error::config(format!(
                "lg_cur_map_size {lg_cur} exceeds lg_max_map_size {lg_max}"
            )));
        }
        let map = ReversePurgeLongHashMap::new(1usize << lg_cur)?;
        let cur_map_cap = map.get_capacity();
        let max_map_cap = (1usize << lg_max) * LOAD_FACTOR_NUMERATOR / LOAD_FACTOR_DENOMINATOR;
        let sample_size = SAMPLE_SIZE.min(max_map_cap);
        Ok(Self {
            lg_max_map_size: lg_max,
            cur_map_cap,
            offset: 0,
            stream_weight: 0,
            sample_size,
            hash_map: map,
        })
    }
}

/// Frequent items sketch for generic hashable item types.
#[derive(Debug, Clone)]
pub struct ItemsSketch<T> {
    lg_max_map_size: u8,
    cur_map_cap: usize,
    offset: i64,
    stream_weight: i64,
    sample_size: usize,
    hash_map: ReversePurgeItemHashMap<T>,
}

impl<T: Eq + Hash> ItemsSketch<T> {
    /// Creates a new sketch with the given maximum map size (a power of two).
    pub fn new(max_map_size: usize) -> Result<Self, Error> {
        let lg_max_map_size = exact_log2(max_map_size)?;
        Self::with_lg_map_sizes(lg_max_map_size, LG_MIN_MAP_SIZE)
    }

    /// Returns true if the sketch is empty.
    pub fn is_empty(&self) -> bool {
        self.hash_map.get_num_active() == 0
    }

    /// Returns the number of active items being tracked.
    pub fn get_num_active_items(&self) -> usize {
        self.hash_map.get_num_active()
    }

    /// Returns the total weight of the stream.
    pub fn get_total_weight(&self) -> i64 {
        self.stream_weight
    }

    /// Returns the estimated frequency for an item.
    pub fn get_estimate(&self, item: &T) -> i64 {
        let raw = self.hash_map.get(item);
        if raw > 0 { raw + self.offset } else { 0 }
    }

    /// Returns the lower bound for an item's frequency.
    pub fn get_lower_bound(&self, item: &T) -> i64 {
        self.hash_map.get(item)
    }

    /// Returns the upper bound for an item's frequency.
    pub fn get_upper_bound(&self, item: &T) -> i64 {
        self.hash_map.get(item) + self.offset
    }

    /// Returns the maximum error across all items.
    pub fn get_maximum_error(&self) -> i64 {
        self.offset
    }

    /// Returns epsilon for this sketch.
    pub fn get_epsilon(&self) -> f64 {
        epsilon_for_lg(self.lg_max_map_size)
    }

    /// Returns the maximum number of items this sketch can track.
    pub fn get_maximum_map_capacity(&self) -> usize {
        (1usize << self.lg_max_map_size) * LOAD_FACTOR_NUMERATOR / LOAD_FACTOR_DENOMINATOR
    }

    /// Returns the current map capacity.
    pub fn get_current_map_capacity(&self) -> usize {
        self.cur_map_cap
    }

    /// Returns the configured lg_max_map_size.
    pub fn get_lg_max_map_size(&self) -> u8 {
        self.lg_max_map_size
    }

    /// Returns the current map size in log2.
    pub fn get_lg_cur_map_size(&self) -> u8 {
        self.hash_map.get_lg_length()
    }

    /// Updates the sketch with a count of one.
    pub fn update(&mut self, item: T) -> Result<(), Error> {
        self.update_with_count(item, 1)
    }

    /// Updates the sketch with an item and a non-negative count.
    pub fn update_with_count(&mut self, item: T, count: i64) -> Result<(), Error> {
        check_count(count)?;
        if count == 0 {
            return Ok(());
        }
        self.stream_weight += count;
        self.hash_map.adjust_or_put_value(item, count)?;
        self.maybe_resize_or_purge()
    }

    /// Merges another sketch into this one.
    pub fn merge(&mut self, other: &Self) -> Result<(), Error>
    where
        T: Clone,
    {
        if other.is_empty() {
            return Ok(());
        }
        let merged_total = self.stream_weight + other.stream_weight;
        for (item, count) in other.hash_map.iter() {
            self.update_with_count(item.clone(), count)?;
        }
        self.offset += other.offset;
        self.stream_weight = merged_total;
        Ok(())
    }

    /// Resets the sketch to an empty state.
    pub fn reset(&mut self) -> Result<(), Error> {
        *self = Self::with_lg_map_sizes(self.lg_max_map_size, LG_MIN_MAP_SIZE)?;
        Ok(())
    }

    /// Returns frequent items using the sketch maximum error as threshold.
    pub fn get_frequent_items(&self, error_type: ErrorType) -> Vec<Row<T>>
    where
        T: Clone,
    {
        self.get_frequent_items_with_threshold(error_type, self.offset)
    }

    /// Returns frequent items using a custom threshold.
    pub fn get_frequent_items_with_threshold(
        &self,
        error_type: ErrorType,
        threshold: i64,
    ) -> Vec<Row<T>>
    where
        T: Clone,
    {
        let threshold = threshold.max(self.offset);
        let mut rows = Vec::new();
        for (item, raw) in self.hash_map.iter() {
            let lower = raw;
            let upper = raw + self.offset;
            if row_included(error_type, lower, upper, threshold) {
                rows.push(Row {
                    item: item.clone(),
                    estimate: upper,
                    upper_bound: upper,
                    lower_bound: lower,
                });
            }
        }
        rows.sort_by(|a, b| b.estimate.cmp(&a.estimate));
        rows
    }

    /// Serializes this sketch using the provided item serializer.
    pub fn serialize_with<S: ItemsSerde<T>>(&self, serde: &S) -> Vec<u8>
    where
        T: Clone,
    {
        let mut out = SketchBytes::with_capacity(32);
        if self.is_empty() {
            write_items_preamble(&mut out, self, true);
            return out.into_bytes();
        }
        write_items_preamble(&mut out, self, false);
        out.write_u32_le(self.get_num_active_items() as u32);
        out.write_u32_le(0);
        out.write_i64_le(self.stream_weight);
        out.write_i64_le(self.offset);

        for value in self.hash_map.get_active_values() {
            out.write_i64_le(value);
        }
        out.write(&serde.serialize_items(&self.hash_map.get_active_keys()));
        out.into_bytes()
    }

    /// Deserializes a sketch using the provided item serializer.
    pub fn deserialize_with<S: ItemsSerde<T>>(bytes: &[u8], serde: &S) -> Result<Self, Error> {
        let pre = read_preamble(bytes)?;
        let mut sketch = Self::with_lg_map_sizes(pre.lg_max, pre.lg_cur)?;
        if pre.is_empty {
            return Ok(sketch);
        }

        let mut body = SketchSlice::new(&bytes[8..]);
        let (active_items, stream_weight, offset_val) = read_body_header(&mut body)?;
        check_active_items(active_items, sketch.get_maximum_map_capacity())?;

        let mut values = Vec::with_capacity(active_items);
        for _ in 0..active_items {
            values.push(
                body.read_i64_le()
                    .map_err(|e| Error::insufficient_data_of("values", e))?,
            );
        }
        let items_offset = bytes.len() - body.remaining();
        let (items, _consumed) = serde.deserialize_items(&bytes[items_offset..], active_items)?;
        if items.len() != active_items {
            return Err(Error::deserial("item count mismatch during deserialization"));
        }

        for (item, value) in items.into_iter().zip(values) {
            if value <= 0 {
                return Err(Error::deserial(format!(
                    "non-positive stored count {value}"
                )));
            }
            sketch.update_with_count(item, value)?;
        }
        sketch.stream_weight = stream_weight;
        sketch.offset = offset_val;
        Ok(sketch)
    }

    fn maybe_resize_or_purge(&mut self) -> Result<(), Error> {
        if self.hash_map.get_num_active() > self.cur_map_cap {
            if self.hash_map.get_lg_length() < self.lg_max_map_size {
                self.hash_map.resize(self.hash_map.get_length() * 2)?;
                self.cur_map_cap = self.hash_map.get_capacity();
            } else {
                let delta = self.hash_map.purge(self.sample_size);
                self.offset += delta;
                if self.hash_map.get_num_active() > self.get_maximum_map_capacity() {
                    return Err(Error::invariant(
                        "purge did not reduce the number of active items",
                    ));
                }
            }
        }
        Ok(())
    }

    fn with_lg_map_sizes(lg_max_map_size: u8, lg_cur_map_size: u8) -> Result<Self, Error> {
        let lg_max = lg_max_map_size.max(LG_MIN_MAP_SIZE);
        let lg_cur = lg_cur_map_size.max(LG_MIN_MAP_SIZE);
        if lg_cur > lg_max {
            return Err(Error::config(format!(
                "lg_cur_map_size {lg_cur} exceeds lg_max_map_size {lg_max}"
            )));
        }
        let map = ReversePurgeItemHashMap::new(1usize << lg_cur)?;
        let cur_map_cap = map.get_capacity();
        let max_map_cap = (1usize << lg_max) * LOAD_FACTOR_NUMERATOR / LOAD_FACTOR_DENOMINATOR;
        let sample_size = SAMPLE_SIZE.min(max_map_cap);
        Ok(Self {
            lg_max_map_size: lg_max,
            cur_map_cap,
            offset: 0,
            stream_weight: 0,
            sample_size,
            hash_map: map,
        })
    }
}

struct FreqPreamble {
    lg_max: u8,
    lg_cur: u8,
    is_empty: bool,
}

fn write_preamble(out: &mut SketchBytes, sketch: &LongsSketch, empty: bool) {
    write_header_bytes(
        out,
        sketch.lg_max_map_size,
        sketch.hash_map.get_lg_length(),
        empty,
    );
}

fn write_items_preamble<T: Eq + Hash>(out: &mut SketchBytes, sketch: &ItemsSketch<T>, empty: bool) {
    write_header_bytes(
        out,
        sketch.lg_max_map_size,
        sketch.hash_map.get_lg_length(),
        empty,
    );
}

fn write_header_bytes(out: &mut SketchBytes, lg_max: u8, lg_cur: u8, empty: bool) {
    out.write_u8(if empty {
        PREAMBLE_LONGS_EMPTY
    } else {
        PREAMBLE_LONGS_NONEMPTY
    });
    out.write_u8(SER_VER);
    out.write_u8(Family::FREQUENCY.id);
    out.write_u8(lg_max);
    out.write_u8(lg_cur);
    out.write_u8(if empty { EMPTY_FLAG_MASK } else { 0 });
    out.write_u8(0);
    out.write_u8(0);
}

fn read_preamble(bytes: &[u8]) -> Result<FreqPreamble, Error> {
    if bytes.len() < 8 {
        return Err(Error::insufficient_data_of(
            "frequencies preamble",
            format!("expected at least 8 bytes, got {}", bytes.len()),
        ));
    }
    let pre_longs = bytes[0] & 0x3F;
    let ser_ver = bytes[1];
    Family::FREQUENCY.validate_id(bytes[2])?;
    if ser_ver != SER_VER {
        return Err(Error::unsupported_serial_version(SER_VER, ser_ver));
    }
    let lg_max = bytes[3];
    let lg_cur = bytes[4];
    let is_empty = bytes[5] & EMPTY_FLAG_MASK != 0;
    if lg_max > MAX_LG_MAP_SIZE {
        return Err(Error::deserial(format!(
            "lg_max_map_size {lg_max} exceeds the supported maximum {MAX_LG_MAP_SIZE}"
        )));
    }
    if lg_cur > lg_max {
        return Err(Error::deserial(format!(
            "lg_cur_map_size {lg_cur} exceeds lg_max_map_size {lg_max}"
        )));
    }
    let expected_pre_longs = if is_empty {
        PREAMBLE_LONGS_EMPTY
    } else {
        PREAMBLE_LONGS_NONEMPTY
    };
    if pre_longs != expected_pre_longs {
        return Err(Error::invalid_preamble_ints(expected_pre_longs, pre_longs));
    }
    Ok(FreqPreamble {
        lg_max,
        lg_cur,
        is_empty,
    })
}

fn check_active_items(active_items: usize, max_map_capacity: usize) -> Result<(), Error> {
    if active_items > max_map_capacity {
        return Err(Error::deserial(format!(
            "active item count {active_items} exceeds the map capacity {max_map_capacity}"
        )));
    }
    Ok(())
}

fn read_body_header(body: &mut SketchSlice<'_>) -> Result<(usize, i64, i64), Error> {
    let read_err = |e| Error::insufficient_data_of("frequencies preamble extension", e);
    let active_items = body.read_u32_le().map_err(read_err)? as usize;
    let _unused = body.read_u32_le().map_err(read_err)?;
    let stream_weight = body.read_i64_le().map_err(read_err)?;
    let offset_val = body.read_i64_le().map_err(read_err)?;
    Ok((active_items, stream_weight, offset_val))
}
