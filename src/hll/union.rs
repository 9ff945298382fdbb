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

//! HLL Union for combining multiple HLL sketches.
//!
//! The union maintains an internal "gadget" sketch in HLL8 packing that
//! accumulates the union of all input sketches. It accepts sketches with
//! different lg_k values (downsampling as needed), in any mode, and of
//! any target type.
//!
//! Merging a warm-up source replays its coupon stream into the gadget;
//! merging a dense source takes a register-wise max, which marks the
//! gadget out of order.

use crate::error::Error;
use crate::hll::array8::Array8;
use crate::hll::mode::Mode;
use crate::hll::sketch::dense_get;
use crate::hll::{HllSketch, HllType, check_lg_k};

/// An HLL Union for combining multiple HLL sketches.
#[derive(Debug, Clone)]
pub struct HllUnion {
    /// Maximum lg_k this union can handle
    lg_max_k: u8,
    /// Internal sketch that accumulates the union
    gadget: HllSketch,
}

impl HllUnion {
    /// Creates a new union.
    ///
    /// `lg_max_k` bounds the precision of the result; input sketches with
    /// larger lg_k are downsampled on the way in.
    pub fn new(lg_max_k: u8) -> Result<Self, Error> {
        check_lg_k(lg_max_k)?;
        let gadget = HllSketch::new(lg_max_k, HllType::Hll8)?;
        Ok(Self { lg_max_k, gadget })
    }

    /// Merges a sketch into the union.
    pub fn update(&mut self, sketch: &HllSketch) -> Result<(), Error> {
        if sketch.is_empty() {
            return Ok(());
        }

        let src_lg_k = sketch.lg_config_k().min(self.lg_max_k);

        match sketch.mode() {
            // Warm-up source: replay the coupon stream. The gadget's
            // in-order history stays valid.
            Mode::List(_) | Mode::Set(_) => {
                for coupon in sketch.coupons() {
                    self.gadget.update_with_coupon(coupon)?;
                }
                Ok(())
            }

            // Dense source: register-wise max.
            src_mode => {
                let dst_lg_k = self.gadget.lg_config_k();

                if self.gadget.mode().is_dense() {
                    if src_lg_k < dst_lg_k {
                        // The gadget must shrink to the coarser source.
                        let mut folded = Array8::new(src_lg_k);
                        match self.gadget.mode() {
                            Mode::Hll8(old) => {
                                folded.merge_with_downsample(old.values(), dst_lg_k);
                            }
                            _ => return Err(Error::invariant("union gadget must be HLL8")),
                        }
                        merge_dense_into(&mut folded, src_mode, sketch.lg_config_k())?;
                        self.gadget =
                            HllSketch::from_mode(src_lg_k, HllType::Hll8, Mode::Hll8(folded));
                    } else {
                        match self.gadget.mode_mut() {
                            Mode::Hll8(dst) => {
                                merge_dense_into(dst, src_mode, sketch.lg_config_k())?;
                            }
                            _ => return Err(Error::invariant("union gadget must be HLL8")),
                        }
                    }
                    Ok(())
                } else {
                    // Gadget is still warm: adopt the dense source, then
                    // replay the gadget's few coupons over it.
                    let mut adopted = Array8::new(src_lg_k);
                    merge_dense_into(&mut adopted, src_mode, sketch.lg_config_k())?;
                    for coupon in self.gadget.coupons() {
                        adopted.update(coupon);
                    }
                    self.gadget =
                        HllSketch::from_mode(src_lg_k, HllType::Hll8, Mode::Hll8(adopted));
                    Ok(())
                }
            }
        }
    }

    /// Returns the union result as a sketch of the requested target type.
    pub fn get_result(&self, target_type: HllType) -> Result<HllSketch, Error> {
        self.gadget.copy_as(target_type)
    }

    /// Resets the union to its initial empty state.
    pub fn reset(&mut self) {
        self.gadget = HllSketch::from_mode(
            self.lg_max_k,
            HllType::Hll8,
            Mode::List(Default::default()),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.gadget.is_empty()
    }

    /// Current cardinality estimate of the union.
    pub fn estimate(&self) -> f64 {
        self.gadget.estimate()
    }

    /// Current lg_config_k of the internal gadget.
    pub fn lg_config_k(&self) -> u8 {
        self.gadget.lg_config_k()
    }

    pub fn lg_max_k(&self) -> u8 {
        self.lg_max_k
    }
}

/// Register-wise max merge of any dense mode into an HLL8 array whose
/// lg_k is no larger than the source's.
fn merge_dense_into(dst: &mut Array8, src_mode: &Mode, src_lg_k: u8) -> Result<(), Error> {
    let dst_lg_k = dst.lg_config_k();
    if src_lg_k < dst_lg_k {
        return Err(Error::invariant(
            "dense merge requires src_lg_k >= dst_lg_k; caller downsizes the gadget",
        ));
    }

    match src_mode {
        Mode::Hll8(src) if src_lg_k == dst_lg_k => {
            dst.merge_same_lg_k(src.values());
        }
        Mode::Hll8(src) => {
            dst.merge_with_downsample(src.values(), src_lg_k);
        }
        Mode::Hll4(_) | Mode::Hll6(_) => {
            let dst_mask = (1usize << dst_lg_k) - 1;
            let src_k = 1u32 << src_lg_k;
            for src_slot in 0..src_k {
                let value = dense_get(src_mode, src_slot);
                if value > 0 {
                    let dst_slot = src_slot as usize & dst_mask;
                    if value > dst.values()[dst_slot] {
                        dst.set_register(dst_slot, value);
                    }
                }
            }
            dst.rebuild_from_registers();
        }
        Mode::List(_) | Mode::Set(_) => {
            return Err(Error::invariant("dense merge from a warm-up mode"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::pack_coupon;

    #[test]
    fn test_union_of_warm_sketches() {
        let mut union = HllUnion::new(12).unwrap();

        let mut sketch1 = HllSketch::new(12, HllType::Hll8).unwrap();
        sketch1.update("foo").unwrap();
        sketch1.update("bar").unwrap();
        sketch1.update("baz").unwrap();

        let mut sketch2 = HllSketch::new(12, HllType::Hll8).unwrap();
        sketch2.update("bar").unwrap();
        sketch2.update("qux").unwrap();
        sketch2.update("quux").unwrap();

        union.update(&sketch1).unwrap();
        union.update(&sketch2).unwrap();

        let result = union.get_result(HllType::Hll8).unwrap();
        let estimate = result.estimate();
        assert!(
            (4.0..=6.0).contains(&estimate),
            "expected estimate around 5, got {estimate}"
        );
        assert!(!result.is_empty());
    }

    #[test]
    fn test_union_empty_sketch_is_noop() {
        let mut union = HllUnion::new(10).unwrap();
        let empty = HllSketch::new(10, HllType::Hll8).unwrap();
        union.update(&empty).unwrap();
        assert!(union.is_empty());
    }

    #[test]
    fn test_union_dense_same_lg_k() {
        let mut union = HllUnion::new(12).unwrap();

        let mut sketch1 = HllSketch::new(12, HllType::Hll8).unwrap();
        for i in 0..10_000u64 {
            sketch1.update(i).unwrap();
        }
        let mut sketch2 = HllSketch::new(12, HllType::Hll8).unwrap();
        for i in 5_000..15_000u64 {
            sketch2.update(i).unwrap();
        }
        assert!(sketch1.mode().is_dense());
        assert!(sketch2.mode().is_dense());

        union.update(&sketch1).unwrap();
        union.update(&sketch2).unwrap();

        let estimate = union.estimate();
        assert!(
            (13_000.0..=17_000.0).contains(&estimate),
            "expected estimate around 15000, got {estimate}"
        );
    }

    #[test]
    fn test_union_downsamples_finer_source() {
        let mut union = HllUnion::new(10).unwrap();

        let mut sketch = HllSketch::new(12, HllType::Hll8).unwrap();
        for i in 0..5_000u64 {
            sketch.update(i).unwrap();
        }
        union.update(&sketch).unwrap();

        let result = union.get_result(HllType::Hll8).unwrap();
        assert_eq!(result.lg_config_k(), 10);
        let estimate = result.estimate();
        assert!(
            (4_000.0..=6_000.0).contains(&estimate),
            "expected estimate around 5000, got {estimate}"
        );
    }

    #[test]
    fn test_union_downsizes_gadget_for_coarser_source() {
        let mut union = HllUnion::new(12).unwrap();

        let mut fine = HllSketch::new(12, HllType::Hll8).unwrap();
        for i in 0..10_000u64 {
            fine.update(i).unwrap();
        }
        union.update(&fine).unwrap();
        assert_eq!(union.lg_config_k(), 12);

        let mut coarse = HllSketch::new(10, HllType::Hll8).unwrap();
        for i in 5_000..15_000u64 {
            coarse.update(i).unwrap();
        }
        union.update(&coarse).unwrap();
        assert_eq!(union.lg_config_k(), 10);

        let estimate = union.estimate();
        assert!(
            (13_000.0..=17_500.0).contains(&estimate),
            "expected estimate around 15000, got {estimate}"
        );
    }

    #[test]
    fn test_union_mixed_target_types() {
        let mut union = HllUnion::new(12).unwrap();

        let mut s4 = HllSketch::new(12, HllType::Hll4).unwrap();
        for i in 0..3_000u64 {
            s4.update(i).unwrap();
        }
        let mut s6 = HllSketch::new(12, HllType::Hll6).unwrap();
        for i in 2_000..5_000u64 {
            s6.update(i).unwrap();
        }
        let mut s8 = HllSketch::new(12, HllType::Hll8).unwrap();
        for i in 4_000..7_000u64 {
            s8.update(i).unwrap();
        }

        union.update(&s4).unwrap();
        union.update(&s6).unwrap();
        union.update(&s8).unwrap();

        let estimate = union.estimate();
        assert!(
            (6_000.0..=8_000.0).contains(&estimate),
            "expected estimate around 7000, got {estimate}"
        );
    }

    #[test]
    fn test_union_result_type_conversion() {
        let mut union = HllUnion::new(12).unwrap();
        let mut sketch = HllSketch::new(12, HllType::Hll8).unwrap();
        for i in 0..5_000u64 {
            sketch.update(i).unwrap();
        }
        union.update(&sketch).unwrap();

        for target in [HllType::Hll4, HllType::Hll6, HllType::Hll8] {
            let result = union.get_result(target).unwrap();
            assert_eq!(result.target_type(), target);
            let estimate = result.estimate();
            assert!(
                (4_000.0..=6_000.0).contains(&estimate),
                "expected estimate around 5000 for {target:?}, got {estimate}"
            );
        }
    }

    #[test]
    fn test_union_warm_gadget_adopts_dense_source() {
        let mut union = HllUnion::new(12).unwrap();

        let mut small = HllSketch::new(12, HllType::Hll8).unwrap();
        small.update("a").unwrap();
        small.update("b").unwrap();
        small.update("c").unwrap();
        union.update(&small).unwrap();

        let mut dense = HllSketch::new(12, HllType::Hll8).unwrap();
        for i in 0..10_000u64 {
            dense.update(i).unwrap();
        }
        union.update(&dense).unwrap();

        let estimate = union.estimate();
        assert!(
            (9_000.0..=11_000.0).contains(&estimate),
            "expected estimate around 10000, got {estimate}"
        );
    }

    #[test]
    fn test_union_reset() {
        let mut union = HllUnion::new(10).unwrap();
        let mut sketch = HllSketch::new(10, HllType::Hll8).unwrap();
        for i in 0..100u64 {
            sketch.update(i).unwrap();
        }
        union.update(&sketch).unwrap();
        assert!(!union.is_empty());

        union.reset();
        assert!(union.is_empty());
        assert_eq!(union.estimate(), 0.0);
    }

    #[test]
    fn test_replayed_coupons_match_pairwise_max() {
        // Replaying a register as a coupon must be equivalent to the max
        // merge for a single slot.
        let mut a = Array8::new(4);
        a.update(pack_coupon(3, 9));
        let mut b = Array8::new(4);
        b.update(pack_coupon(3, 7));
        a.merge_same_lg_k(b.values());
        assert_eq!(a.get(3), 9);
    }
}
