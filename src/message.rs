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

//! Message envelope handed to the shuffle stage by the transport layer.

use crate::error::{Result, ShuffleError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};

/// Body key holding the partition a message belonged to before shuffling.
pub const ORIGIN_PARTITION_ID: &str = "origin_partition_id";
/// Body key holding the offset within the origin partition.
pub const ORIGIN_OFFSET: &str = "origin_offset";
/// Body key holding whether the origin offset is a wide (64-bit) value.
pub const ORIGIN_OFFSET_IS_WIDE: &str = "origin_offset_is_wide";
/// Body key tagged onto each per-instance copy with the matched instance id.
pub const HIT_WINDOW_INSTANCE_ID: &str = "hit_window_instance_id";

/// Routing metadata of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Partition the message currently lives in. After regrouping this is the
    /// origin partition.
    pub partition_id: String,
    pub offset: String,
    /// Whether `offset` is a 64-bit value.
    #[serde(default)]
    pub offset_is_wide: bool,
}

impl MessageHeader {
    pub fn new(
        partition_id: impl Into<String>,
        offset: impl Into<String>,
        offset_is_wide: bool,
    ) -> Self {
        Self {
            partition_id: partition_id.into(),
            offset: offset.into(),
            offset_is_wide,
        }
    }
}

/// One concrete firing period of a windowed aggregation.
///
/// Identity is the instance id alone; the remaining fields are descriptive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowInstance {
    pub window_instance_id: String,
    #[serde(default)]
    pub window_name: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub fire_time: String,
}

impl WindowInstance {
    pub fn new(window_instance_id: impl Into<String>) -> Self {
        Self {
            window_instance_id: window_instance_id.into(),
            window_name: String::new(),
            start_time: String::new(),
            end_time: String::new(),
            fire_time: String::new(),
        }
    }

    pub fn with_window_name(mut self, window_name: impl Into<String>) -> Self {
        self.window_name = window_name.into();
        self
    }

    pub fn with_bounds(
        mut self,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        self.start_time = start_time.into();
        self.end_time = end_time.into();
        self
    }

    pub fn with_fire_time(mut self, fire_time: impl Into<String>) -> Self {
        self.fire_time = fire_time.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.window_instance_id
    }
}

impl PartialEq for WindowInstance {
    fn eq(&self, other: &Self) -> bool {
        self.window_instance_id == other.window_instance_id
    }
}

impl Eq for WindowInstance {}

impl Hash for WindowInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.window_instance_id.hash(state);
    }
}

/// Payload of a message: free-form fields plus the window instances the
/// message was assigned to upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    window_instances: Vec<WindowInstance>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl MessageBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the string stored under `key`, failing if it is absent or not a string.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        match self.fields.get(key) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(ShuffleError::DataCorruption(format!(
                "body field {key} should be a string, got {other}"
            ))),
            None => Err(ShuffleError::DataCorruption(format!(
                "body field {key} is missing"
            ))),
        }
    }

    /// Returns the boolean stored under `key`, failing if it is absent or not a bool.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.fields.get(key) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(ShuffleError::DataCorruption(format!(
                "body field {key} should be a bool, got {other}"
            ))),
            None => Err(ShuffleError::DataCorruption(format!(
                "body field {key} is missing"
            ))),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn window_instances(&self) -> &[WindowInstance] {
        &self.window_instances
    }

    pub fn set_window_instances(&mut self, instances: Vec<WindowInstance>) {
        self.window_instances = instances;
    }
}

/// Coordinates of a message in the partition it came from before shuffling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginCoordinates {
    pub partition_id: String,
    pub offset: String,
    pub offset_is_wide: bool,
}

/// A message envelope. Cloning produces a fully independent copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub header: MessageHeader,
    pub body: MessageBody,
}

impl Message {
    pub fn new(header: MessageHeader, body: MessageBody) -> Self {
        Self { header, body }
    }

    /// Reads the origin routing fields from the body.
    pub fn origin(&self) -> Result<OriginCoordinates> {
        Ok(OriginCoordinates {
            partition_id: self.body.get_str(ORIGIN_PARTITION_ID)?.to_owned(),
            offset: self.body.get_str(ORIGIN_OFFSET)?.to_owned(),
            offset_is_wide: self.body.get_bool(ORIGIN_OFFSET_IS_WIDE)?,
        })
    }

    /// Overwrites the header with the given origin coordinates.
    pub fn move_to_origin(&mut self, origin: &OriginCoordinates) {
        self.header.partition_id.clone_from(&origin.partition_id);
        self.header.offset.clone_from(&origin.offset);
        self.header.offset_is_wide = origin.offset_is_wide;
    }

    /// The window instance this copy was fanned out for, if tagged.
    pub fn hit_window_instance_id(&self) -> Option<&str> {
        self.body
            .get(HIT_WINDOW_INSTANCE_ID)
            .and_then(|v| v.as_str())
    }
}
