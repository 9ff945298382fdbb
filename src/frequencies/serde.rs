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

//! Item serialization strategies for frequent items sketches.

use std::str;

use crate::error::Error;

/// Serializer/deserializer for items stored in a frequency sketch.
pub trait ItemsSerde<T> {
    /// Serializes a slice of items to a byte buffer.
    fn serialize_items(&self, items: &[T]) -> Vec<u8>;

    /// Deserializes `num_items` from bytes, returning items and bytes consumed.
    fn deserialize_items(&self, bytes: &[u8], num_items: usize)
    -> Result<(Vec<T>, usize), Error>;
}

/// Serializer for UTF-8 strings: a u32 length prefix per item.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringSerde;

impl ItemsSerde<String> for StringSerde {
    fn serialize_items(&self, items: &[String]) -> Vec<u8> {
        let mut out = Vec::new();
        for item in items {
            let bytes = item.as_bytes();
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
        }
        out
    }

    fn deserialize_items(
        &self,
        bytes: &[u8],
        num_items: usize,
    ) -> Result<(Vec<String>, usize), Error> {
        let mut items = Vec::with_capacity(num_items);
        let mut offset = 0usize;
        for _ in 0..num_items {
            if offset + 4 > bytes.len() {
                return Err(Error::insufficient_data_of(
                    "string length",
                    format!("at byte {offset}"),
                ));
            }
            let len = u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]) as usize;
            offset += 4;
            if offset + len > bytes.len() {
                return Err(Error::insufficient_data_of(
                    "string payload",
                    format!("need {len} bytes at byte {offset}"),
                ));
            }
            let value = str::from_utf8(&bytes[offset..offset + len])
                .map_err(|e| Error::deserial("invalid UTF-8 string payload").set_source(e))?
                .to_string();
            items.push(value);
            offset += len;
        }
        Ok((items, offset))
    }
}

/// Serializer for i64 items: eight little-endian bytes per item.
#[derive(Debug, Default, Clone, Copy)]
pub struct I64Serde;

impl ItemsSerde<i64> for I64Serde {
    fn serialize_items(&self, items: &[i64]) -> Vec<u8> {
        let mut out = Vec::with_capacity(items.len() * 8);
        for item in items {
            out.extend_from_slice(&item.to_le_bytes());
        }
        out
    }

    fn deserialize_items(
        &self,
        bytes: &[u8],
        num_items: usize,
    ) -> Result<(Vec<i64>, usize), Error> {
        let needed = num_items
            .checked_mul(8)
            .ok_or_else(|| Error::deserial("items size overflow"))?;
        if bytes.len() < needed {
            return Err(Error::insufficient_data_of(
                "i64 items",
                format!("need {needed} bytes, got {}", bytes.len()),
            ));
        }
        let mut items = Vec::with_capacity(num_items);
        for chunk in bytes[..needed].chunks_exact(8) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            items.push(i64::from_le_bytes(buf));
        }
        Ok((items, needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip() {
        let serde = StringSerde;
        let items = vec!["alpha".to_string(), "".to_string(), "βγδ".to_string()];
        let bytes = serde.serialize_items(&items);
        let (decoded, consumed) = serde.deserialize_items(&bytes, 3).unwrap();
        assert_eq!(decoded, items);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn test_string_truncated_payload_rejected() {
        let serde = StringSerde;
        let bytes = serde.serialize_items(&["hello".to_string()]);
        assert!(serde.deserialize_items(&bytes[..6], 1).is_err());
    }

    #[test]
    fn test_i64_round_trip() {
        let serde = I64Serde;
        let items = vec![i64::MIN, -1, 0, 7, i64::MAX];
        let bytes = serde.serialize_items(&items);
        let (decoded, consumed) = serde.deserialize_items(&bytes, 5).unwrap();
        assert_eq!(decoded, items);
        assert_eq!(consumed, 40);
    }
}
