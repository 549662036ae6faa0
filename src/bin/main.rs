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

//! Replays a recorded shuffle batch through an in-memory shuffle processor.

use async_trait::async_trait;
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::{env, io};
use tracing_subscriber::EnvFilter;
use window_shuffle::config::{Config, ShuffleConfig};
use window_shuffle::message::{Message, WindowInstance};
use window_shuffle::replay::load_batch;
use window_shuffle::state::{MemoryStateLoader, PartitionLoadTable, PartitionStateGate};
use window_shuffle::storage::MemoryWatermarkStore;
use window_shuffle::watermark::OffsetWatermarkUpdater;
use window_shuffle::window::{LoggingObserver, WindowOperator};
use window_shuffle::{Result, ShuffleBatchProcessor, ShuffleError};

/// Window operator that only logs what it receives.
struct LoggingWindow;

#[async_trait]
impl WindowOperator for LoggingWindow {
    async fn compute(
        &self,
        messages: &[Message],
        instance: &WindowInstance,
        partition_id: &str,
    ) -> Result<()> {
        info!(
            "compute {} messages for window instance {} on partition {partition_id}",
            messages.len(),
            instance.id()
        );
        Ok(())
    }

    async fn record_progress(
        &self,
        partition_id: &str,
        instance: &WindowInstance,
        messages: &[Message],
    ) -> Result<()> {
        info!(
            "progress recorded for window instance {} on partition {partition_id} ({} messages)",
            instance.id(),
            messages.len()
        );
        Ok(())
    }
}

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .map_err(ShuffleError::IoError)?;

    runtime.block_on(inner())
}

async fn inner() -> Result<()> {
    // parse options
    let opt = Config::parse();

    let rust_log = env::var(EnvFilter::DEFAULT_ENV);
    let log_filter = EnvFilter::new(rust_log.unwrap_or(opt.log_level_setting.clone()));

    let tracing = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_thread_names(opt.print_thread_info)
        .with_thread_ids(opt.print_thread_info)
        .with_writer(io::stdout)
        .with_env_filter(log_filter);

    // File layer
    if let Some(log_dir) = &opt.log_dir {
        let log_file = tracing_appender::rolling::never(log_dir, "window_shuffle_replay");
        tracing.with_writer(log_file).init();
    } else {
        tracing.init();
    }

    let batch_file = opt.batch_file.clone();
    let config: ShuffleConfig = opt.try_into()?;
    let batch = load_batch(&batch_file)?;
    info!("Loaded {} messages from {batch_file}", batch.len());

    let store = MemoryWatermarkStore::new();
    let gate = Arc::new(PartitionStateGate::from_config(
        &config,
        Arc::new(PartitionLoadTable::new()),
        Arc::new(MemoryStateLoader::new()),
    ));
    let processor = ShuffleBatchProcessor::try_new(
        config,
        Arc::new(LoggingWindow),
        gate,
        OffsetWatermarkUpdater::new(Arc::new(store.clone())),
        Arc::new(LoggingObserver),
    )?;

    let outcome = processor.process_with_stats(batch).await?;
    info!(
        "Processed {} groups ({} messages), {} watermarks advanced",
        outcome.groups, outcome.messages, outcome.watermarks_advanced
    );

    for (key, watermark) in store.snapshot() {
        println!("{key} => {watermark}");
    }

    Ok(())
}
