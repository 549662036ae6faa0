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

//! Entry point of the shuffle stage: processes one shuffled batch end to end.

use crate::config::ShuffleConfig;
use crate::error::{Result, ShuffleError};
use crate::message::Message;
use crate::regroup::{regroup, GroupKey};
use crate::state::PartitionStateGate;
use crate::watermark::OffsetWatermarkUpdater;
use crate::window::{DiagnosticObserver, WindowOperator};
use log::{debug, warn};
use std::sync::Arc;

/// Summary of a processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Number of (partition, window instance) sub-batches processed
    pub groups: usize,
    /// Number of per-instance message copies computed
    pub messages: usize,
    /// Number of origin watermarks that moved forward
    pub watermarks_advanced: usize,
}

/// Regroups shuffled batches and drives them through the window operator.
///
/// Sub-batches are processed one at a time in ascending [`GroupKey`] order.
/// For each: the partition's state must be loaded, then the window computes,
/// then origin watermarks are advanced, then the window records its progress.
/// The first failure aborts the rest of the batch; watermarks already
/// advanced for earlier groups stay in place.
pub struct ShuffleBatchProcessor {
    config: ShuffleConfig,
    window: Arc<dyn WindowOperator>,
    gate: Arc<PartitionStateGate>,
    updater: OffsetWatermarkUpdater,
    observer: Arc<dyn DiagnosticObserver>,
}

impl ShuffleBatchProcessor {
    pub fn try_new(
        config: ShuffleConfig,
        window: Arc<dyn WindowOperator>,
        gate: Arc<PartitionStateGate>,
        updater: OffsetWatermarkUpdater,
        observer: Arc<dyn DiagnosticObserver>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            window,
            gate,
            updater,
            observer,
        })
    }

    pub fn config(&self) -> &ShuffleConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<PartitionStateGate> {
        &self.gate
    }

    /// Processes `batch`, returning `true` once every sub-batch completed.
    pub async fn process(&self, batch: Vec<Message>) -> Result<bool> {
        self.process_with_stats(batch).await.map(|_| true)
    }

    pub async fn process_with_stats(&self, batch: Vec<Message>) -> Result<BatchOutcome> {
        let mut regrouped = regroup(batch)?;
        let keys = regrouped.sorted_keys();
        let operator_name = self.config.operator_name.as_str();
        let mut outcome = BatchOutcome::default();

        for key in keys {
            let messages = regrouped.groups.remove(&key).ok_or_else(|| {
                ShuffleError::Internal(format!("sub-batch {key} vanished while processing"))
            })?;
            let instance = regrouped
                .instances
                .get(&key.window_instance_id)
                .ok_or_else(|| {
                    ShuffleError::Internal(format!(
                        "window instance {} of sub-batch {key} was not recorded",
                        key.window_instance_id
                    ))
                })?;

            if self.config.diagnostics_enabled {
                if let Err(e) = self.observer.record(operator_name, &messages, instance) {
                    warn!("Failed to record diagnostics for sub-batch {key}: {e}");
                }
            }

            self.gate.ensure_loaded(&key.partition_id).await?;

            self.window
                .compute(&messages, instance, &key.partition_id)
                .await
                .map_err(|e| for_group(&key, e))?;

            outcome.watermarks_advanced += self
                .updater
                .advance(&key.partition_id, operator_name, &messages)
                .await?;

            self.window
                .record_progress(&key.partition_id, instance, &messages)
                .await
                .map_err(|e| for_group(&key, e))?;

            outcome.groups += 1;
            outcome.messages += messages.len();
        }

        debug!(
            "[{operator_name}] processed shuffle batch: {} groups, {} messages, {} watermarks advanced",
            outcome.groups, outcome.messages, outcome.watermarks_advanced
        );
        Ok(outcome)
    }
}

/// Attributes a window collaborator failure to the group being processed.
fn for_group(key: &GroupKey, error: ShuffleError) -> ShuffleError {
    match error {
        ShuffleError::Compute { reason, .. } => {
            ShuffleError::compute(&key.partition_id, &key.window_instance_id, reason)
        }
        other => ShuffleError::compute(&key.partition_id, &key.window_instance_id, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offset::Watermark;
    use crate::state::{LoadSignal, MemoryStateLoader, PartitionLoadTable};
    use crate::storage::{MemoryWatermarkStore, WatermarkKey, WatermarkStore};
    use crate::test_utils::{
        shuffled_message, FailingObserver, FailingWatermarkStore, RecordingObserver,
        RecordingWindow,
    };
    use std::time::Duration;

    struct Fixture {
        processor: ShuffleBatchProcessor,
        window: Arc<RecordingWindow>,
        store: MemoryWatermarkStore,
        loader: Arc<MemoryStateLoader>,
    }

    fn fixture_with(
        window: RecordingWindow,
        observer: Arc<dyn DiagnosticObserver>,
    ) -> Fixture {
        let config = ShuffleConfig::default().with_operator_name("clicks");
        let window = Arc::new(window);
        let store = MemoryWatermarkStore::new();
        let loader = Arc::new(MemoryStateLoader::new());
        let gate = Arc::new(PartitionStateGate::from_config(
            &config,
            Arc::new(PartitionLoadTable::new()),
            loader.clone(),
        ));
        let processor = ShuffleBatchProcessor::try_new(
            config,
            window.clone(),
            gate,
            OffsetWatermarkUpdater::new(Arc::new(store.clone())),
            observer,
        )
        .unwrap();
        Fixture {
            processor,
            window,
            store,
            loader,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingWindow::new(), Arc::new(RecordingObserver::default()))
    }

    #[tokio::test]
    async fn processes_groups_in_key_order() {
        let f = fixture();
        let batch = vec![
            shuffled_message("s2", "0", "o1", "1", false, &["w1"]),
            shuffled_message("s1", "0", "o1", "2", false, &["w2"]),
            shuffled_message("s1", "1", "o1", "3", false, &["w1"]),
        ];

        let outcome = f.processor.process_with_stats(batch).await.unwrap();
        assert_eq!(outcome.groups, 3);
        assert_eq!(outcome.messages, 3);
        assert_eq!(
            f.window.computed_keys(),
            vec![
                GroupKey::new("s1", "w1"),
                GroupKey::new("s1", "w2"),
                GroupKey::new("s2", "w1"),
            ]
        );
        assert_eq!(f.window.recorded_keys(), f.window.computed_keys());
    }

    #[tokio::test]
    async fn repeated_runs_use_identical_order() {
        let batch = vec![
            shuffled_message("p3", "0", "o1", "1", false, &["b", "a"]),
            shuffled_message("p1", "0", "o1", "2", false, &["c"]),
            shuffled_message("p2", "0", "o1", "3", false, &["a", "c"]),
        ];
        let first = fixture();
        first.processor.process(batch.clone()).await.unwrap();
        let second = fixture();
        second.processor.process(batch).await.unwrap();
        assert_eq!(first.window.computed_keys(), second.window.computed_keys());
        assert_eq!(first.window.computed_keys().len(), 5);
    }

    #[tokio::test]
    async fn compute_failure_stops_remaining_groups() {
        let f = fixture_with(
            RecordingWindow::failing_on(GroupKey::new("s1", "w2")),
            Arc::new(RecordingObserver::default()),
        );
        let batch = vec![
            shuffled_message("s1", "0", "o1", "10", false, &["w1"]),
            shuffled_message("s1", "1", "o2", "20", false, &["w2"]),
            shuffled_message("s1", "2", "o3", "30", false, &["w3"]),
        ];

        let err = f.processor.process(batch).await.unwrap_err();
        match &err {
            ShuffleError::Compute {
                partition_id,
                window_instance_id,
                ..
            } => {
                assert_eq!(partition_id, "s1");
                assert_eq!(window_instance_id, "w2");
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(
            f.window.computed_keys(),
            vec![GroupKey::new("s1", "w1"), GroupKey::new("s1", "w2")]
        );
        assert_eq!(f.window.recorded_keys(), vec![GroupKey::new("s1", "w1")]);

        // the first group's progress stays, nothing after the failure is saved
        let snapshot = f.store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get(&WatermarkKey::new("s1", "clicks", "o1")),
            Some(&Watermark::new("10", false))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn load_timeout_aborts_before_compute() {
        let f = fixture();
        f.loader
            .register_cohort(["s2"], futures::future::pending());
        let batch = vec![
            shuffled_message("s1", "0", "o1", "10", false, &["w1"]),
            shuffled_message("s2", "0", "o1", "11", false, &["w1"]),
        ];

        let err = f.processor.process(batch).await.unwrap_err();
        assert!(matches!(
            &err,
            ShuffleError::LoadTimeout { partition_id, timeout }
                if partition_id == "s2" && *timeout == Duration::from_secs(5)
        ));
        assert!(err.is_retryable());
        assert_eq!(f.window.computed_keys(), vec![GroupKey::new("s1", "w1")]);
    }

    #[tokio::test]
    async fn load_failure_aborts_before_compute() {
        let f = fixture();
        f.loader
            .register("s2", LoadSignal::failed("state snapshot unreadable"));
        let batch = vec![
            shuffled_message("s1", "0", "o1", "10", false, &["w1"]),
            shuffled_message("s2", "0", "o2", "11", false, &["w1"]),
            shuffled_message("s3", "0", "o3", "12", false, &["w1"]),
        ];

        let err = f.processor.process(batch).await.unwrap_err();
        assert!(matches!(
            &err,
            ShuffleError::LoadFailure { partition_id, reason }
                if partition_id == "s2" && reason == "state snapshot unreadable"
        ));
        assert!(!err.is_retryable());
        assert_eq!(f.window.computed_keys(), vec![GroupKey::new("s1", "w1")]);
        assert_eq!(f.window.recorded_keys(), vec![GroupKey::new("s1", "w1")]);

        let snapshot = f.store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get(&WatermarkKey::new("s1", "clicks", "o1")),
            Some(&Watermark::new("10", false))
        );
    }

    #[tokio::test]
    async fn storage_failure_keeps_earlier_watermarks() {
        let config = ShuffleConfig::default().with_operator_name("clicks");
        let window = Arc::new(RecordingWindow::new());
        let store = Arc::new(FailingWatermarkStore::failing_on("o2"));
        let gate = Arc::new(PartitionStateGate::from_config(
            &config,
            Arc::new(PartitionLoadTable::new()),
            Arc::new(MemoryStateLoader::new()),
        ));
        let processor = ShuffleBatchProcessor::try_new(
            config,
            window.clone(),
            gate,
            OffsetWatermarkUpdater::new(store.clone()),
            Arc::new(RecordingObserver::default()),
        )
        .unwrap();
        let batch = vec![
            shuffled_message("s1", "0", "o1", "10", false, &["w1"]),
            shuffled_message("s1", "1", "o2", "20", false, &["w2"]),
            shuffled_message("s1", "2", "o3", "30", false, &["w3"]),
        ];

        let err = processor.process(batch).await.unwrap_err();
        assert!(matches!(err, ShuffleError::Storage(_)));
        assert!(err.is_retryable());

        // computed before the failed write, never recorded, nothing after it
        assert_eq!(
            window.computed_keys(),
            vec![GroupKey::new("s1", "w1"), GroupKey::new("s1", "w2")]
        );
        assert_eq!(window.recorded_keys(), vec![GroupKey::new("s1", "w1")]);

        let snapshot = store.inner().snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get(&WatermarkKey::new("s1", "clicks", "o1")),
            Some(&Watermark::new("10", false))
        );
    }

    #[tokio::test]
    async fn observer_failure_is_ignored() {
        let f = fixture_with(RecordingWindow::new(), Arc::new(FailingObserver));
        let batch = vec![shuffled_message("s1", "0", "o1", "10", false, &["w1"])];
        assert!(f.processor.process(batch).await.unwrap());
        assert_eq!(f.window.computed_keys().len(), 1);
    }

    #[tokio::test]
    async fn observer_sees_each_sub_batch() {
        let observer = Arc::new(RecordingObserver::default());
        let f = fixture_with(RecordingWindow::new(), observer.clone());
        let batch = vec![shuffled_message("s1", "0", "o1", "10", false, &["w1", "w2"])];
        f.processor.process(batch).await.unwrap();
        assert_eq!(
            observer.records(),
            vec![
                ("clicks".to_string(), "w1".to_string(), 1),
                ("clicks".to_string(), "w2".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn redelivered_batch_is_a_watermark_no_op() {
        let f = fixture();
        let batch = vec![
            shuffled_message("s1", "0", "o1", "10", false, &["w1"]),
            shuffled_message("s1", "1", "o1", "12", false, &["w1"]),
        ];
        let first = f.processor.process_with_stats(batch.clone()).await.unwrap();
        let second = f.processor.process_with_stats(batch).await.unwrap();
        assert_eq!(first.watermarks_advanced, 1);
        assert_eq!(second.watermarks_advanced, 0);
        assert_eq!(
            f.store
                .get_watermark(&WatermarkKey::new("s1", "clicks", "o1"))
                .await
                .unwrap(),
            Some(Watermark::new("12", false))
        );
    }

    #[tokio::test]
    async fn empty_batch_succeeds() {
        let f = fixture();
        assert!(f.processor.process(vec![]).await.unwrap());
        assert!(f.window.computed_keys().is_empty());
    }
}
