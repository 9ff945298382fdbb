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

//! The HLL sketch: a tagged union over list, set, and dense modes.

use std::hash::Hash;

use crate::error::Error;
use crate::hll::array4::Array4;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::estimator::HipEstimator;
use crate::hll::hash_set::CouponHashSet;
use crate::hll::list::CouponList;
use crate::hll::mode::Mode;
use crate::hll::{HllType, check_lg_k, coupon, get_value, pack_coupon, serialization};

/// A HyperLogLog cardinality sketch.
///
/// Created with an immutable configuration pair `(lg_config_k, target
/// type)`, the sketch starts as a small coupon list and promotes itself
/// through a coupon set into the dense register array of the target type
/// as distinct items accumulate.
#[derive(Debug, Clone)]
pub struct HllSketch {
    lg_config_k: u8,
    target_type: HllType,
    mode: Mode,
}

enum UpdateAction {
    Done,
    PromoteList(u32),
    GrowSet(u8),
    PromoteSet,
}

impl HllSketch {
    /// Creates an empty sketch.
    ///
    /// `lg_config_k` must lie in [4, 21].
    pub fn new(lg_config_k: u8, target_type: HllType) -> Result<Self, Error> {
        check_lg_k(lg_config_k)?;
        Ok(Self {
            lg_config_k,
            target_type,
            mode: Mode::List(CouponList::default()),
        })
    }

    pub(crate) fn from_mode(lg_config_k: u8, target_type: HllType, mode: Mode) -> Self {
        Self {
            lg_config_k,
            target_type,
            mode,
        }
    }

    pub fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    pub fn target_type(&self) -> HllType {
        self.target_type
    }

    pub fn is_empty(&self) -> bool {
        match &self.mode {
            Mode::List(list) => list.is_empty(),
            Mode::Set(set) => set.is_empty(),
            _ => false,
        }
    }

    /// True once estimates are no longer tracking the exact in-order
    /// update history (after a register-wise merge or deserialization of
    /// a merged sketch).
    pub fn out_of_order(&self) -> bool {
        match &self.mode {
            Mode::List(_) | Mode::Set(_) => false,
            Mode::Hll4(a) => a.estimator().is_out_of_order(),
            Mode::Hll6(a) => a.estimator().is_out_of_order(),
            Mode::Hll8(a) => a.estimator().is_out_of_order(),
        }
    }

    /// Returns the sketch to its initial empty state.
    pub fn reset(&mut self) {
        self.mode = Mode::List(CouponList::default());
    }

    pub(crate) fn mode(&self) -> &Mode {
        &self.mode
    }

    pub(crate) fn mode_mut(&mut self) -> &mut Mode {
        &mut self.mode
    }

    /// Presents an item to the sketch.
    pub fn update<H: Hash>(&mut self, item: H) -> Result<(), Error> {
        self.update_with_coupon(coupon(item))
    }

    /// Absorbs a pre-formed coupon.
    pub(crate) fn update_with_coupon(&mut self, coupon: u32) -> Result<(), Error> {
        // A coupon with an empty payload is never stored.
        if get_value(coupon) == 0 {
            return Ok(());
        }

        let action = match &mut self.mode {
            Mode::List(list) => {
                if list.update(coupon) {
                    UpdateAction::Done
                } else {
                    UpdateAction::PromoteList(coupon)
                }
            }
            Mode::Set(set) => {
                set.update(coupon);
                if set.over_load_factor() {
                    if set.lg_size() >= self.lg_config_k - 3 {
                        UpdateAction::PromoteSet
                    } else {
                        UpdateAction::GrowSet(set.lg_size() + 1)
                    }
                } else {
                    UpdateAction::Done
                }
            }
            Mode::Hll4(arr) => {
                arr.update(coupon)?;
                UpdateAction::Done
            }
            Mode::Hll6(arr) => {
                arr.update(coupon);
                UpdateAction::Done
            }
            Mode::Hll8(arr) => {
                arr.update(coupon);
                UpdateAction::Done
            }
        };

        match action {
            UpdateAction::Done => Ok(()),
            UpdateAction::PromoteList(pending) => self.promote_list(pending),
            UpdateAction::GrowSet(lg_size) => {
                if let Mode::Set(set) = &mut self.mode {
                    set.grow(lg_size);
                }
                Ok(())
            }
            UpdateAction::PromoteSet => self.promote_set(),
        }
    }

    /// Promotes a full list on the arrival of the ninth distinct coupon.
    ///
    /// Configurations below lg_config_k 8 skip set mode entirely: their
    /// promotion threshold `2^(lg_k - 3)` would be no larger than the
    /// initial set.
    fn promote_list(&mut self, pending: u32) -> Result<(), Error> {
        let (coupons, estimate) = match &self.mode {
            Mode::List(list) => (
                list.container.iter().collect::<Vec<_>>(),
                list.container.estimate(),
            ),
            _ => return Err(Error::invariant("list promotion outside list mode")),
        };

        if self.lg_config_k < 8 {
            let mut dense = new_dense_mode(self.lg_config_k, self.target_type);
            for c in coupons {
                dense_update(&mut dense, c)?;
            }
            set_dense_hip(&mut dense, estimate);
            self.mode = dense;
            self.update_with_coupon(pending)
        } else {
            let mut set = CouponHashSet::default();
            for c in coupons {
                set.update(c);
            }
            set.update(pending);
            self.mode = Mode::Set(set);
            Ok(())
        }
    }

    /// Promotes the coupon set to the dense target representation.
    fn promote_set(&mut self) -> Result<(), Error> {
        let (coupons, estimate) = match &self.mode {
            Mode::Set(set) => (
                set.container.iter().collect::<Vec<_>>(),
                set.container.estimate(),
            ),
            _ => return Err(Error::invariant("set promotion outside set mode")),
        };

        let mut dense = new_dense_mode(self.lg_config_k, self.target_type);
        for c in coupons {
            dense_update(&mut dense, c)?;
        }
        set_dense_hip(&mut dense, estimate);
        self.mode = dense;
        Ok(())
    }

    /// Current cardinality estimate.
    pub fn estimate(&self) -> f64 {
        match &self.mode {
            Mode::List(list) => list.container.estimate(),
            Mode::Set(set) => set.container.estimate(),
            Mode::Hll4(arr) => arr.estimate(),
            Mode::Hll6(arr) => arr.estimate(),
            Mode::Hll8(arr) => arr.estimate(),
        }
    }

    /// Lower confidence bound at 1, 2, or 3 standard deviations.
    pub fn lower_bound(&self, num_std_dev: u8) -> Result<f64, Error> {
        check_num_std_dev(num_std_dev)?;
        Ok(match &self.mode {
            Mode::List(list) => list.container.lower_bound(num_std_dev),
            Mode::Set(set) => set.container.lower_bound(num_std_dev),
            _ => {
                let rel = HipEstimator::relative_error(
                    self.lg_config_k,
                    self.out_of_order(),
                    num_std_dev,
                );
                self.estimate() / (1.0 + rel)
            }
        })
    }

    /// Upper confidence bound at 1, 2, or 3 standard deviations.
    pub fn upper_bound(&self, num_std_dev: u8) -> Result<f64, Error> {
        check_num_std_dev(num_std_dev)?;
        Ok(match &self.mode {
            Mode::List(list) => list.container.upper_bound(num_std_dev),
            Mode::Set(set) => set.container.upper_bound(num_std_dev),
            _ => {
                let rel = HipEstimator::relative_error(
                    self.lg_config_k,
                    self.out_of_order(),
                    num_std_dev,
                );
                self.estimate() / (1.0 - rel)
            }
        })
    }

    /// The sketch's observations as packed (slot, value) coupons.
    ///
    /// In dense mode this walks the register array in slot order; in the
    /// warm-up modes it reports the stored coupons. Identical streams
    /// produce identical coupon multisets regardless of the target type.
    pub fn coupons(&self) -> Vec<u32> {
        match &self.mode {
            Mode::List(list) => list.container.iter().collect(),
            Mode::Set(set) => set.container.iter().collect(),
            dense => {
                let k = 1u32 << self.lg_config_k;
                (0..k)
                    .filter_map(|slot| {
                        let value = dense_get(dense, slot);
                        (value > 0).then(|| pack_coupon(slot, value))
                    })
                    .collect()
            }
        }
    }

    /// Copies this sketch into one with a different target type.
    ///
    /// Warm-up modes carry over unchanged; dense registers are replayed
    /// into the new packing with the estimator state preserved.
    pub fn copy_as(&self, target_type: HllType) -> Result<HllSketch, Error> {
        match &self.mode {
            Mode::List(list) => Ok(Self::from_mode(
                self.lg_config_k,
                target_type,
                Mode::List(list.clone()),
            )),
            Mode::Set(set) => Ok(Self::from_mode(
                self.lg_config_k,
                target_type,
                Mode::Set(set.clone()),
            )),
            dense => {
                let converted = convert_dense(dense, self.lg_config_k, target_type)?;
                Ok(Self::from_mode(self.lg_config_k, target_type, converted))
            }
        }
    }

    /// Serializes into the compact form: valid entries only.
    pub fn serialize_compact(&self) -> Vec<u8> {
        serialization::serialize(self, true)
    }

    /// Serializes into the updatable form: full arrays, empty slots included.
    pub fn serialize_updatable(&self) -> Vec<u8> {
        serialization::serialize(self, false)
    }

    /// Reconstructs a sketch from either serialized form.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        serialization::deserialize(bytes)
    }
}

pub(crate) fn check_num_std_dev(num_std_dev: u8) -> Result<(), Error> {
    if !(1..=3).contains(&num_std_dev) {
        return Err(Error::bounds_parameter(num_std_dev));
    }
    Ok(())
}

/// Creates an empty dense mode of the requested packing.
pub(crate) fn new_dense_mode(lg_config_k: u8, target_type: HllType) -> Mode {
    match target_type {
        HllType::Hll4 => Mode::Hll4(Array4::new(lg_config_k)),
        HllType::Hll6 => Mode::Hll6(Array6::new(lg_config_k)),
        HllType::Hll8 => Mode::Hll8(Array8::new(lg_config_k)),
    }
}

/// Routes a coupon into whichever dense array the mode holds.
pub(crate) fn dense_update(mode: &mut Mode, coupon: u32) -> Result<(), Error> {
    match mode {
        Mode::Hll4(arr) => arr.update(coupon),
        Mode::Hll6(arr) => {
            arr.update(coupon);
            Ok(())
        }
        Mode::Hll8(arr) => {
            arr.update(coupon);
            Ok(())
        }
        _ => Err(Error::invariant("dense update outside dense mode")),
    }
}

/// Reads the true register value of a slot from a dense mode.
pub(crate) fn dense_get(mode: &Mode, slot: u32) -> u8 {
    match mode {
        Mode::Hll4(arr) => arr.get(slot),
        Mode::Hll6(arr) => arr.get(slot),
        Mode::Hll8(arr) => arr.get(slot),
        _ => 0,
    }
}

pub(crate) fn dense_estimator(mode: &Mode) -> Option<&HipEstimator> {
    match mode {
        Mode::Hll4(arr) => Some(arr.estimator()),
        Mode::Hll6(arr) => Some(arr.estimator()),
        Mode::Hll8(arr) => Some(arr.estimator()),
        _ => None,
    }
}

pub(crate) fn dense_estimator_mut(mode: &mut Mode) -> Option<&mut HipEstimator> {
    match mode {
        Mode::Hll4(arr) => Some(arr.estimator_mut()),
        Mode::Hll6(arr) => Some(arr.estimator_mut()),
        Mode::Hll8(arr) => Some(arr.estimator_mut()),
        _ => None,
    }
}

fn set_dense_hip(mode: &mut Mode, estimate: f64) {
    if let Some(estimator) = dense_estimator_mut(mode) {
        estimator.set_hip_accum(estimate);
    }
}

/// Rebuilds a dense mode in a different packing by replaying registers.
pub(crate) fn convert_dense(
    mode: &Mode,
    lg_config_k: u8,
    target_type: HllType,
) -> Result<Mode, Error> {
    let (hip, ooo) = dense_estimator(mode)
        .map(|e| (e.hip_accum(), e.is_out_of_order()))
        .ok_or_else(|| Error::invariant("dense conversion outside dense mode"))?;

    let mut converted = new_dense_mode(lg_config_k, target_type);
    let k = 1u32 << lg_config_k;
    for slot in 0..k {
        let value = dense_get(mode, slot);
        if value > 0 {
            dense_update(&mut converted, pack_coupon(slot, value))?;
        }
    }
    if let Some(estimator) = dense_estimator_mut(&mut converted) {
        estimator.set_hip_accum(hip);
        estimator.set_out_of_order(ooo);
    }
    Ok(converted)
}
