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

//! Binary layout of the HLL sketch.
//!
//! The first eight bytes of every serialized sketch form the preamble:
//!
//! ```text
//! byte 0: preamble size in 4-byte ints (2 list, 3 set, 10 hll)
//! byte 1: serialization version (1)
//! byte 2: family id (7)
//! byte 3: lg_config_k
//! byte 4: lg of the coupon / aux array, when one follows
//! byte 5: flags (empty 0x4, compact 0x8, out-of-order 0x10, rebuild 0x20)
//! byte 6: list count (list mode) or cur_min (hll mode)
//! byte 7: mode byte: cur_mode in bits 0-1, target type in bits 2-3
//! ```
//!
//! HLL mode continues with hipAccum, kxq0, kxq1 (f64), numAtCurMin and
//! auxCount (u32), the packed register payload, and for HLL4 the aux
//! pairs (active pairs when compact, the raw table when updatable).

use crate::codec::{Family, SketchBytes, SketchSlice};
use crate::error::Error;
use crate::hll::array4::Array4;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::aux_map::AuxMap;
use crate::hll::estimator::HipEstimator;
use crate::hll::hash_set::CouponHashSet;
use crate::hll::list::{CouponList, LG_INIT_LIST_SIZE};
use crate::hll::mode::Mode;
use crate::hll::sketch::HllSketch;
use crate::hll::{HllType, check_lg_k, pack_coupon};

pub(crate) const SER_VER: u8 = 1;

pub(crate) const LIST_PREINTS: u8 = 2;
pub(crate) const HASH_SET_PREINTS: u8 = 3;
pub(crate) const HLL_PREINTS: u8 = 10;

pub(crate) const EMPTY_FLAG_MASK: u8 = 4;
pub(crate) const COMPACT_FLAG_MASK: u8 = 8;
pub(crate) const OUT_OF_ORDER_FLAG_MASK: u8 = 16;
pub(crate) const REBUILD_CURMIN_KXQ_FLAG_MASK: u8 = 32;

const PREAMBLE_SIZE: usize = 8;

fn mode_byte(sketch: &HllSketch) -> u8 {
    sketch.mode().mode_byte() | (sketch.target_type() as u8) << 2
}

fn write_header(
    out: &mut SketchBytes,
    pre_ints: u8,
    lg_k: u8,
    lg_arr: u8,
    flags: u8,
    byte6: u8,
    mode: u8,
) {
    out.write_u8(pre_ints);
    out.write_u8(SER_VER);
    out.write_u8(Family::HLL.id);
    out.write_u8(lg_k);
    out.write_u8(lg_arr);
    out.write_u8(flags);
    out.write_u8(byte6);
    out.write_u8(mode);
}

pub(crate) fn serialize(sketch: &HllSketch, compact: bool) -> Vec<u8> {
    match sketch.mode() {
        Mode::List(list) => serialize_list(sketch, list, compact),
        Mode::Set(set) => serialize_set(sketch, set, compact),
        Mode::Hll4(arr) => serialize_hll4(sketch, arr, compact),
        Mode::Hll6(arr) => serialize_hll6(sketch, arr, compact),
        Mode::Hll8(arr) => serialize_hll8(sketch, arr, compact),
    }
}

fn serialize_list(sketch: &HllSketch, list: &CouponList, compact: bool) -> Vec<u8> {
    let count = list.len();
    let mut flags = 0u8;
    if count == 0 {
        flags |= EMPTY_FLAG_MASK;
    }
    if compact {
        flags |= COMPACT_FLAG_MASK;
    }

    let mut out = SketchBytes::with_capacity(PREAMBLE_SIZE + list.container.coupons.len() * 4);
    write_header(
        &mut out,
        LIST_PREINTS,
        sketch.lg_config_k(),
        list.container.lg_size,
        flags,
        count as u8,
        mode_byte(sketch),
    );

    if compact {
        for coupon in list.container.iter() {
            out.write_u32_le(coupon);
        }
    } else {
        for coupon in list.container.coupons.iter() {
            out.write_u32_le(*coupon);
        }
    }
    out.into_bytes()
}

fn serialize_set(sketch: &HllSketch, set: &CouponHashSet, compact: bool) -> Vec<u8> {
    let mut flags = 0u8;
    if compact {
        flags |= COMPACT_FLAG_MASK;
    }

    let mut out = SketchBytes::with_capacity(12 + set.container.coupons.len() * 4);
    write_header(
        &mut out,
        HASH_SET_PREINTS,
        sketch.lg_config_k(),
        set.lg_size(),
        flags,
        0,
        mode_byte(sketch),
    );
    out.write_u32_le(set.len() as u32);

    if compact {
        for coupon in set.container.iter() {
            out.write_u32_le(coupon);
        }
    } else {
        for coupon in set.container.coupons.iter() {
            out.write_u32_le(*coupon);
        }
    }
    out.into_bytes()
}

fn write_hll_preamble(
    out: &mut SketchBytes,
    sketch: &HllSketch,
    estimator: &HipEstimator,
    lg_arr: u8,
    compact: bool,
    cur_min: u8,
    num_at_cur_min: u32,
    aux_count: u32,
) {
    let mut flags = 0u8;
    if compact {
        flags |= COMPACT_FLAG_MASK;
    }
    if estimator.is_out_of_order() {
        flags |= OUT_OF_ORDER_FLAG_MASK;
    }

    write_header(
        out,
        HLL_PREINTS,
        sketch.lg_config_k(),
        lg_arr,
        flags,
        cur_min,
        mode_byte(sketch),
    );
    out.write_f64_le(estimator.hip_accum());
    out.write_f64_le(estimator.kxq0());
    out.write_f64_le(estimator.kxq1());
    out.write_u32_le(num_at_cur_min);
    out.write_u32_le(aux_count);
}

fn serialize_hll4(sketch: &HllSketch, arr: &Array4, compact: bool) -> Vec<u8> {
    let aux = arr.aux_map();
    let aux_count = aux.map_or(0, |a| a.num_active()) as u32;
    let lg_arr = aux.map_or(0, |a| a.lg_aux_arr_ints());

    let mut out = SketchBytes::with_capacity(40 + arr.packed_bytes().len() + aux_count as usize * 4);
    write_hll_preamble(
        &mut out,
        sketch,
        arr.estimator(),
        lg_arr,
        compact,
        arr.cur_min(),
        arr.num_at_cur_min(),
        aux_count,
    );
    out.write(arr.packed_bytes());

    if let Some(aux) = aux {
        if compact {
            for (slot, value) in aux.iter() {
                out.write_u32_le(pack_coupon(slot, value));
            }
        } else {
            for pair in aux.raw_pairs() {
                out.write_u32_le(*pair);
            }
        }
    }
    out.into_bytes()
}

fn serialize_hll6(sketch: &HllSketch, arr: &Array6, compact: bool) -> Vec<u8> {
    let mut out = SketchBytes::with_capacity(40 + arr.packed_bytes().len());
    write_hll_preamble(
        &mut out,
        sketch,
        arr.estimator(),
        0,
        compact,
        0,
        arr.num_zeros(),
        0,
    );
    out.write(arr.packed_bytes());
    out.into_bytes()
}

fn serialize_hll8(sketch: &HllSketch, arr: &Array8, compact: bool) -> Vec<u8> {
    let mut out = SketchBytes::with_capacity(40 + arr.values().len());
    write_hll_preamble(
        &mut out,
        sketch,
        arr.estimator(),
        0,
        compact,
        0,
        arr.num_zeros(),
        0,
    );
    out.write(arr.values());
    out.into_bytes()
}

struct Preamble {
    pre_ints: u8,
    lg_k: u8,
    lg_arr: u8,
    flags: u8,
    byte6: u8,
    cur_mode: u8,
    target_type: HllType,
}

fn parse_preamble(bytes: &[u8]) -> Result<Preamble, Error> {
    if bytes.len() < PREAMBLE_SIZE {
        return Err(Error::insufficient_data_of(
            "hll preamble",
            format!("expected at least {PREAMBLE_SIZE} bytes, got {}", bytes.len()),
        ));
    }

    let pre_ints = bytes[0] & 0x3F;
    let ser_ver = bytes[1];
    Family::HLL.validate_id(bytes[2])?;
    if ser_ver != SER_VER {
        return Err(Error::unsupported_serial_version(SER_VER, ser_ver));
    }

    let lg_k = bytes[3];
    check_lg_k(lg_k).map_err(|e| {
        Error::deserial(format!("lg_config_k out of range: {}", e.message()))
    })?;

    let mode = bytes[7];
    let cur_mode = mode & 0x3;
    let target_type = HllType::from_byte((mode >> 2) & 0x3)
        .ok_or_else(|| Error::deserial(format!("invalid target type in mode byte {mode:#04x}")))?;
    if cur_mode == 3 {
        return Err(Error::deserial(format!(
            "invalid current mode in mode byte {mode:#04x}"
        )));
    }

    Ok(Preamble {
        pre_ints,
        lg_k,
        lg_arr: bytes[4],
        flags: bytes[5],
        byte6: bytes[6],
        cur_mode,
        target_type,
    })
}

pub(crate) fn deserialize(bytes: &[u8]) -> Result<HllSketch, Error> {
    let pre = parse_preamble(bytes)?;

    let empty = pre.flags & EMPTY_FLAG_MASK != 0;
    let compact = pre.flags & COMPACT_FLAG_MASK != 0;

    if empty && pre.cur_mode != 0 {
        return Err(Error::deserial("empty flag set on a non-list sketch"));
    }

    let mut body = SketchSlice::new(&bytes[PREAMBLE_SIZE..]);
    match pre.cur_mode {
        0 => deserialize_list(&pre, &mut body, empty, compact),
        1 => deserialize_set(&pre, &mut body, compact),
        _ => deserialize_hll(&pre, &mut body, compact),
    }
}

fn deserialize_list(
    pre: &Preamble,
    body: &mut SketchSlice<'_>,
    empty: bool,
    compact: bool,
) -> Result<HllSketch, Error> {
    if pre.pre_ints != LIST_PREINTS {
        return Err(Error::invalid_preamble_ints(LIST_PREINTS, pre.pre_ints));
    }
    let count = pre.byte6 as usize;
    if empty && count != 0 {
        return Err(Error::deserial("empty flag set on a non-empty coupon list"));
    }

    let lg_size = LG_INIT_LIST_SIZE;
    let capacity = 1usize << lg_size;
    if count > capacity {
        return Err(Error::deserial(format!(
            "coupon list count {count} exceeds capacity {capacity}"
        )));
    }

    let mut coupons = vec![0u32; capacity].into_boxed_slice();
    if empty {
        // Compact empty sketches stop after the preamble.
        let list = CouponList::from_coupons(lg_size, coupons, 0);
        return Ok(HllSketch::from_mode(
            pre.lg_k,
            pre.target_type,
            Mode::List(list),
        ));
    }

    let stored = if compact { count } else { 1usize << pre.lg_arr.max(lg_size) };
    for i in 0..stored {
        let coupon = body
            .read_u32_le()
            .map_err(|e| Error::insufficient_data_of("list coupons", e))?;
        if i < capacity {
            coupons[i] = coupon;
        }
    }

    let list = CouponList::from_coupons(lg_size, coupons, count);
    Ok(HllSketch::from_mode(
        pre.lg_k,
        pre.target_type,
        Mode::List(list),
    ))
}

fn deserialize_set(
    pre: &Preamble,
    body: &mut SketchSlice<'_>,
    compact: bool,
) -> Result<HllSketch, Error> {
    if pre.pre_ints != HASH_SET_PREINTS {
        return Err(Error::invalid_preamble_ints(HASH_SET_PREINTS, pre.pre_ints));
    }
    if pre.lg_arr > pre.lg_k {
        return Err(Error::deserial(format!(
            "coupon set lg_arr {} exceeds lg_config_k {}",
            pre.lg_arr, pre.lg_k
        )));
    }

    let count = body
        .read_u32_le()
        .map_err(|e| Error::insufficient_data_of("set count", e))? as usize;
    let capacity = 1usize << pre.lg_arr;
    if count > capacity {
        return Err(Error::deserial(format!(
            "coupon set count {count} exceeds capacity {capacity}"
        )));
    }

    let set = if compact {
        let mut set = CouponHashSet::new(pre.lg_arr);
        for _ in 0..count {
            let coupon = body
                .read_u32_le()
                .map_err(|e| Error::insufficient_data_of("set coupons", e))?;
            set.update(coupon);
        }
        if set.len() != count {
            return Err(Error::deserial(format!(
                "coupon set held {} coupons, preamble declared {count}",
                set.len()
            )));
        }
        set
    } else {
        let mut coupons = vec![0u32; capacity].into_boxed_slice();
        let mut valid = 0usize;
        for slot in coupons.iter_mut() {
            *slot = body
                .read_u32_le()
                .map_err(|e| Error::insufficient_data_of("set coupons", e))?;
            if *slot != 0 {
                valid += 1;
            }
        }
        if valid != count {
            return Err(Error::deserial(format!(
                "coupon set held {valid} coupons, preamble declared {count}"
            )));
        }
        CouponHashSet::from_coupons(pre.lg_arr, coupons, count)
    };

    Ok(HllSketch::from_mode(
        pre.lg_k,
        pre.target_type,
        Mode::Set(set),
    ))
}

fn deserialize_hll(
    pre: &Preamble,
    body: &mut SketchSlice<'_>,
    compact: bool,
) -> Result<HllSketch, Error> {
    if pre.pre_ints != HLL_PREINTS {
        return Err(Error::invalid_preamble_ints(HLL_PREINTS, pre.pre_ints));
    }

    let read_err = |e| Error::insufficient_data_of("hll preamble extension", e);
    let hip_accum = body.read_f64_le().map_err(read_err)?;
    let kxq0 = body.read_f64_le().map_err(read_err)?;
    let kxq1 = body.read_f64_le().map_err(read_err)?;
    let num_at_cur_min = body.read_u32_le().map_err(read_err)?;
    let aux_count = body.read_u32_le().map_err(read_err)?;

    let out_of_order = pre.flags & OUT_OF_ORDER_FLAG_MASK != 0;
    let rebuild = pre.flags & REBUILD_CURMIN_KXQ_FLAG_MASK != 0;

    let mut estimator = HipEstimator::new(pre.lg_k);
    estimator.set_hip_accum(hip_accum);
    estimator.set_kxq0(kxq0);
    estimator.set_kxq1(kxq1);
    estimator.set_out_of_order(out_of_order);

    let k = 1usize << pre.lg_k;
    let mode = match pre.target_type {
        HllType::Hll8 => {
            let mut registers = vec![0u8; k].into_boxed_slice();
            body.read_exact(&mut registers)
                .map_err(|e| Error::insufficient_data_of("hll8 registers", e))?;
            let mut arr = Array8::from_parts(pre.lg_k, registers, num_at_cur_min, estimator);
            if rebuild {
                arr.rebuild_from_registers();
            }
            Mode::Hll8(arr)
        }
        HllType::Hll6 => {
            let mut packed = vec![0u8; k * 3 / 4];
            body.read_exact(&mut packed)
                .map_err(|e| Error::insufficient_data_of("hll6 registers", e))?;
            let mut arr = Array6::from_parts(pre.lg_k, &packed, num_at_cur_min, estimator);
            if rebuild {
                rebuild_array6(&mut arr);
            }
            Mode::Hll6(arr)
        }
        HllType::Hll4 => {
            let mut packed = vec![0u8; k / 2].into_boxed_slice();
            body.read_exact(&mut packed)
                .map_err(|e| Error::insufficient_data_of("hll4 registers", e))?;

            let aux = if compact {
                if aux_count == 0 {
                    None
                } else {
                    let mut pairs = Vec::with_capacity(aux_count as usize);
                    for _ in 0..aux_count {
                        pairs.push(
                            body.read_u32_le()
                                .map_err(|e| Error::insufficient_data_of("hll4 aux pairs", e))?,
                        );
                    }
                    Some(AuxMap::from_pairs(pre.lg_k, pairs.into_iter())?)
                }
            } else if pre.lg_arr == 0 {
                None
            } else {
                let aux_size = 1usize << pre.lg_arr;
                let mut raw = vec![0u32; aux_size].into_boxed_slice();
                for pair in raw.iter_mut() {
                    *pair = body
                        .read_u32_le()
                        .map_err(|e| Error::insufficient_data_of("hll4 aux table", e))?;
                }
                let aux = AuxMap::from_raw(pre.lg_k, pre.lg_arr, raw);
                if aux.num_active() != aux_count as usize {
                    return Err(Error::deserial(format!(
                        "aux table held {} pairs, preamble declared {aux_count}",
                        aux.num_active()
                    )));
                }
                Some(aux)
            };

            let mut arr =
                Array4::from_parts(pre.lg_k, packed, pre.byte6, num_at_cur_min, aux, estimator);
            if rebuild {
                rebuild_array4(&mut arr);
            }
            Mode::Hll4(arr)
        }
    };

    Ok(HllSketch::from_mode(pre.lg_k, pre.target_type, mode))
}

/// Recomputes the derived estimator state of a 6-bit array from its
/// registers (rebuild flag honored on the way in).
fn rebuild_array6(arr: &mut Array6) {
    let lg_config_k = arr.lg_config_k();
    let k = arr.num_registers() as u32;
    let values: Vec<u8> = (0..k).map(|slot| arr.get(slot)).collect();
    let num_zeros = values.iter().filter(|v| **v == 0).count() as u32;
    arr.estimator_mut().rebuild_kxq(lg_config_k, values.into_iter());
    arr.estimator_mut().set_out_of_order(true);
    arr.set_num_zeros(num_zeros);
}

/// Recomputes numAtCurMin and the KxQ sums of a 4-bit array. The wire
/// cur_min stays authoritative: every nibble is encoded against it.
fn rebuild_array4(arr: &mut Array4) {
    let lg_config_k = arr.lg_config_k();
    let k = arr.num_registers() as u32;
    let cur_min = arr.cur_min();
    let values: Vec<u8> = (0..k).map(|slot| arr.get(slot)).collect();
    let num_at_cur_min = values.iter().filter(|v| **v == cur_min).count() as u32;
    arr.estimator_mut().rebuild_kxq(lg_config_k, values.into_iter());
    arr.estimator_mut().set_out_of_order(true);
    arr.set_num_at_cur_min(num_at_cur_min);
}
