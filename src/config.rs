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

//! Shuffle processor configuration

use crate::error::{Result, ShuffleError};
use std::time::Duration;

/// Default bound on waiting for a partition's state to load.
pub const DEFAULT_STATE_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of the replay application
#[cfg(feature = "build-binary")]
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[arg(
        long,
        help = "Path to a JSON file holding an array of shuffled messages to process as one batch"
    )]
    pub batch_file: String,
    #[arg(long, default_value_t = String::from("window"), help = "Configured name of the window operator. Default: window")]
    pub operator_name: String,
    #[arg(
        long,
        default_value_t = 5000,
        help = "Maximum time to wait for a partition's state to finish loading (milliseconds). Default: 5000"
    )]
    pub state_load_timeout_ms: u64,
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Emit a diagnostic record for every regrouped sub-batch, e.g. --diagnostics-enabled false. Default: true"
    )]
    pub diagnostics_enabled: bool,
    #[arg(
        long,
        help = "Log dir: a path to save log. This will create a new storage directory at the specified path if it does not already exist."
    )]
    pub log_dir: Option<String>,
    #[arg(
        long,
        default_value_t = true,
        help = "Enable print thread ids and names in log file."
    )]
    pub print_thread_info: bool,
    #[arg(
        long,
        default_value_t = String::from("INFO,window_shuffle=DEBUG"),
        help = "special log level for sub mod. link: https://docs.rs/env_logger/latest/env_logger/#enabling-logging"
    )]
    pub log_level_setting: String,
}

/// Settings of a shuffle batch processor.
#[derive(Debug, Clone)]
pub struct ShuffleConfig {
    /// Configured name of the window operator. Used as a watermark key
    /// component and as the diagnostic label.
    pub operator_name: String,
    /// How long the state gate waits for a pending partition load.
    pub state_load_timeout: Duration,
    /// Whether sub-batches are reported to the diagnostic observer
    pub diagnostics_enabled: bool,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            operator_name: "window".into(),
            state_load_timeout: DEFAULT_STATE_LOAD_TIMEOUT,
            diagnostics_enabled: true,
        }
    }
}

impl ShuffleConfig {
    pub fn with_operator_name(mut self, operator_name: impl Into<String>) -> Self {
        self.operator_name = operator_name.into();
        self
    }

    pub fn with_state_load_timeout(mut self, timeout: Duration) -> Self {
        self.state_load_timeout = timeout;
        self
    }

    pub fn with_diagnostics_enabled(mut self, enabled: bool) -> Self {
        self.diagnostics_enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.operator_name.trim().is_empty() {
            return Err(ShuffleError::Configuration(
                "operator name must not be empty".to_string(),
            ));
        }
        if self.state_load_timeout.is_zero() {
            return Err(ShuffleError::Configuration(
                "state load timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(feature = "build-binary")]
impl TryFrom<Config> for ShuffleConfig {
    type Error = ShuffleError;

    fn try_from(opt: Config) -> Result<Self> {
        let config = ShuffleConfig::default()
            .with_operator_name(opt.operator_name)
            .with_state_load_timeout(Duration::from_millis(opt.state_load_timeout_ms))
            .with_diagnostics_enabled(opt.diagnostics_enabled);
        config.validate()?;
        Ok(config)
    }
}
