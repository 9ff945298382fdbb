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

use crate::hll::array4::Array4;
use crate::hll::array6::Array6;
use crate::hll::array8::Array8;
use crate::hll::hash_set::CouponHashSet;
use crate::hll::list::CouponList;

/// The three storage modes of an HLL sketch. Promotion replaces one arm
/// with the next; a sketch never demotes.
#[derive(Debug, Clone)]
pub enum Mode {
    List(CouponList),
    Set(CouponHashSet),
    Hll4(Array4),
    Hll6(Array6),
    Hll8(Array8),
}

impl Mode {
    /// The wire encoding of the current mode (low two bits of the mode byte).
    pub(crate) fn mode_byte(&self) -> u8 {
        match self {
            Mode::List(_) => 0,
            Mode::Set(_) => 1,
            Mode::Hll4(_) | Mode::Hll6(_) | Mode::Hll8(_) => 2,
        }
    }

    pub(crate) fn is_dense(&self) -> bool {
        matches!(self, Mode::Hll4(_) | Mode::Hll6(_) | Mode::Hll8(_))
    }
}
