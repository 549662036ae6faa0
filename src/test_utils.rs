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

use crate::error::{Result, ShuffleError};
use crate::message::{
    Message, MessageBody, MessageHeader, WindowInstance, ORIGIN_OFFSET,
    ORIGIN_OFFSET_IS_WIDE, ORIGIN_PARTITION_ID,
};
use crate::offset::Watermark;
use crate::regroup::GroupKey;
use crate::storage::{Lock, MemoryWatermarkStore, WatermarkKey, WatermarkStore};
use crate::window::{DiagnosticObserver, WindowOperator};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Builds a message as delivered by the shuffle transport: the header points
/// at the shuffle partition, the body carries the origin coordinates.
pub fn shuffled_message(
    partition_id: &str,
    offset: &str,
    origin_partition_id: &str,
    origin_offset: &str,
    origin_offset_is_wide: bool,
    window_instance_ids: &[&str],
) -> Message {
    let mut body = MessageBody::new();
    body.put(ORIGIN_PARTITION_ID, origin_partition_id);
    body.put(ORIGIN_OFFSET, origin_offset);
    body.put(ORIGIN_OFFSET_IS_WIDE, origin_offset_is_wide);
    body.set_window_instances(
        window_instance_ids
            .iter()
            .map(|id| WindowInstance::new(*id).with_window_name("test_window"))
            .collect(),
    );
    Message::new(MessageHeader::new(partition_id, offset, false), body)
}

/// Builds a message already moved to origin coordinates.
pub fn origin_message(origin_partition_id: &str, origin_offset: &str, wide: bool) -> Message {
    let mut message = shuffled_message(
        origin_partition_id,
        origin_offset,
        origin_partition_id,
        origin_offset,
        wide,
        &[],
    );
    message.header.offset_is_wide = wide;
    message
}

/// Window operator that remembers what it was asked to do.
#[derive(Default)]
pub struct RecordingWindow {
    fail_on: Option<GroupKey>,
    computed: Mutex<Vec<GroupKey>>,
    recorded: Mutex<Vec<GroupKey>>,
}

impl RecordingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails computation of the sub-batch with `key`.
    pub fn failing_on(key: GroupKey) -> Self {
        Self {
            fail_on: Some(key),
            ..Default::default()
        }
    }

    pub fn computed_keys(&self) -> Vec<GroupKey> {
        self.computed.lock().clone()
    }

    pub fn recorded_keys(&self) -> Vec<GroupKey> {
        self.recorded.lock().clone()
    }
}

#[async_trait]
impl WindowOperator for RecordingWindow {
    async fn compute(
        &self,
        messages: &[Message],
        instance: &WindowInstance,
        partition_id: &str,
    ) -> Result<()> {
        let key = GroupKey::new(partition_id, instance.id());
        for message in messages {
            assert_eq!(message.hit_window_instance_id(), Some(instance.id()));
        }
        self.computed.lock().push(key.clone());
        if self.fail_on.as_ref() == Some(&key) {
            return Err(ShuffleError::General("accumulator overflow".to_string()));
        }
        Ok(())
    }

    async fn record_progress(
        &self,
        partition_id: &str,
        instance: &WindowInstance,
        _messages: &[Message],
    ) -> Result<()> {
        self.recorded
            .lock()
            .push(GroupKey::new(partition_id, instance.id()));
        Ok(())
    }
}

/// Observer that keeps (operator, instance id, message count) per call.
#[derive(Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<(String, String, usize)>>,
}

impl RecordingObserver {
    pub fn records(&self) -> Vec<(String, String, usize)> {
        self.records.lock().clone()
    }
}

impl DiagnosticObserver for RecordingObserver {
    fn record(
        &self,
        operator_name: &str,
        messages: &[Message],
        instance: &WindowInstance,
    ) -> Result<()> {
        self.records.lock().push((
            operator_name.to_owned(),
            instance.id().to_owned(),
            messages.len(),
        ));
        Ok(())
    }
}

pub struct FailingObserver;

impl DiagnosticObserver for FailingObserver {
    fn record(&self, _: &str, _: &[Message], _: &WindowInstance) -> Result<()> {
        Err(ShuffleError::IoError(std::io::Error::other("debug sink closed")))
    }
}

/// Watermark store whose writes for one origin partition fail.
pub struct FailingWatermarkStore {
    inner: MemoryWatermarkStore,
    failing_origin: String,
}

impl FailingWatermarkStore {
    pub fn failing_on(origin_partition_id: &str) -> Self {
        Self {
            inner: MemoryWatermarkStore::new(),
            failing_origin: origin_partition_id.to_owned(),
        }
    }

    pub fn inner(&self) -> &MemoryWatermarkStore {
        &self.inner
    }
}

#[async_trait]
impl WatermarkStore for FailingWatermarkStore {
    async fn get_watermark(&self, key: &WatermarkKey) -> Result<Option<Watermark>> {
        self.inner.get_watermark(key).await
    }

    async fn put_watermark(&self, key: WatermarkKey, watermark: Watermark) -> Result<()> {
        if key.origin_partition_id == self.failing_origin {
            return Err(ShuffleError::Storage(format!("write of {key} rejected")));
        }
        self.inner.put_watermark(key, watermark).await
    }

    async fn lock(&self, key: &WatermarkKey) -> Result<Box<dyn Lock>> {
        self.inner.lock(key).await
    }
}
