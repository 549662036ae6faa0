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

//! Regrouping of a shuffled batch by (partition, window instance).

use crate::error::Result;
use crate::message::{Message, WindowInstance, HIT_WINDOW_INSTANCE_ID};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Key of a sub-batch. Ordered by partition id, then window instance id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub partition_id: String,
    pub window_instance_id: String,
}

impl GroupKey {
    pub fn new(partition_id: impl Into<String>, window_instance_id: impl Into<String>) -> Self {
        Self {
            partition_id: partition_id.into(),
            window_instance_id: window_instance_id.into(),
        }
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.partition_id, self.window_instance_id)
    }
}

/// A batch split into per-(partition, window instance) sub-batches.
#[derive(Debug, Default)]
pub struct RegroupedBatch {
    pub groups: HashMap<GroupKey, Vec<Message>>,
    pub instances: HashMap<String, WindowInstance>,
}

impl RegroupedBatch {
    /// Group keys in processing order.
    pub fn sorted_keys(&self) -> Vec<GroupKey> {
        let mut keys: Vec<GroupKey> = self.groups.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn num_messages(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Splits `batch` into sub-batches keyed by the partition each message was
/// shuffled into and the window instance it matched.
///
/// Every message header is rewritten to its origin partition and offset. A
/// message matching several instances is copied once per instance and each
/// copy is tagged with [`HIT_WINDOW_INSTANCE_ID`], so computations on one
/// instance never observe mutations made for another.
pub fn regroup(batch: Vec<Message>) -> Result<RegroupedBatch> {
    let mut regrouped = RegroupedBatch::default();

    for mut message in batch {
        // captured before the header moves to origin coordinates
        let partition_id = message.header.partition_id.clone();
        let origin = message.origin()?;
        message.move_to_origin(&origin);

        for instance in message.body.window_instances() {
            let key = GroupKey::new(partition_id.as_str(), instance.id());
            let mut copy = message.clone();
            copy.body.put(HIT_WINDOW_INSTANCE_ID, instance.id());
            regrouped.groups.entry(key).or_default().push(copy);
            regrouped
                .instances
                .entry(instance.id().to_owned())
                .or_insert_with(|| instance.clone());
        }
    }

    Ok(regrouped)
}
