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

//! Frequency sketches for finding heavy hitters in data streams.

mod reverse_purge_item_hash_map;
mod reverse_purge_long_hash_map;
mod serialization;
mod sketch;

pub mod serde;

pub use serde::I64Serde;
pub use serde::ItemsSerde;
pub use serde::StringSerde;

pub use self::sketch::ErrorType;
pub use self::sketch::ItemsSketch;
pub use self::sketch::LongsSketch;
pub use self::sketch::Row;
