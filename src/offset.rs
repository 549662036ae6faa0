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

//! Offset ordering for origin partitions.
//!
//! Offsets travel as strings. Wide offsets are 64-bit counters, narrow ones are
//! 32-bit counters; both compare numerically. A value that does not parse under
//! its declared width is treated as corrupt input and reported, never coerced.

use crate::error::{Result, ShuffleError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Returns whether offset `a` is strictly greater than offset `b`.
pub fn greater_than(a: &str, b: &str, wide: bool) -> Result<bool> {
    if wide {
        Ok(parse_wide(a)? > parse_wide(b)?)
    } else {
        Ok(parse_narrow(a)? > parse_narrow(b)?)
    }
}

fn parse_wide(value: &str) -> Result<i64> {
    value.parse::<i64>().map_err(|e| {
        ShuffleError::DataCorruption(format!(
            "offset {value:?} is not a valid 64-bit offset: {e}"
        ))
    })
}

fn parse_narrow(value: &str) -> Result<i32> {
    value.parse::<i32>().map_err(|e| {
        ShuffleError::DataCorruption(format!(
            "offset {value:?} is not a valid 32-bit offset: {e}"
        ))
    })
}

/// Latest acknowledged offset of an origin partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub offset: String,
    pub is_wide: bool,
}

impl Watermark {
    pub fn new(offset: impl Into<String>, is_wide: bool) -> Self {
        Self {
            offset: offset.into(),
            is_wide,
        }
    }

    /// Whether `candidate` is strictly ahead of this watermark, compared
    /// under the candidate's width.
    pub fn is_behind(&self, candidate: &Watermark) -> Result<bool> {
        greater_than(&candidate.offset, &self.offset, candidate.is_wide)
    }
}

impl Display for Watermark {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_wide {
            write!(f, "{} (wide)", self.offset)
        } else {
            write!(f, "{}", self.offset)
        }
    }
}
