//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use crate::error::EngineError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "engine/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "engine/.env"
    )]
    pub env_file: Option<String>,

    #[arg(
        short = 'a',
        long = "agents",
        help = "Desired agent population, overriding the configured target"
    )]
    pub agents: Option<usize>,

    #[arg(
        short = 'r',
        long = "resume",
        help = "Reconstruct agents from the persistent store instead of spawning fresh ones"
    )]
    pub resume: bool,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
            agents: None,
            resume: false,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub engine: EngineSettings,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Configuration, EngineError> {
        let file = std::fs::File::open(path)
            .map_err(|e| EngineError::Configuration(format!("Failed to open config file: {}", e)))?;
        let conf: Configuration = serde_yaml::from_reader(file)
            .map_err(|e| EngineError::Configuration(format!("Failed to parse config file: {}", e)))?;
        conf.engine.validate()?;
        Ok(conf)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: EnvField<String>,
    pub username: EnvField<String>,
    pub password: EnvField<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Base URL of the custody/funding service
    pub endpoint: EnvField<String>,

    /// Bound on a single funding confirmation wait, in seconds
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,
}

fn default_confirm_timeout_secs() -> u64 {
    20
}

impl ChainConfig {
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            endpoint: Default::default(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
        }
    }
}

/// Scheduler tunables
///
/// The unfunded grace period and respawn delay defaults are plain tunables
/// with no product intent behind the specific numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Base activity interval in milliseconds
    pub base_interval_ms: u64,
    /// Lower bound of the uniform jitter band
    pub jitter_min: f64,
    /// Upper bound of the uniform jitter band
    pub jitter_max: f64,
    /// Per-agent damping applied as the active population grows
    pub population_dampening: f64,
    /// Energy level under which an agent rests instead of acting
    pub rest_energy_threshold: f32,
    /// Energy regained per resting tick
    pub rest_recovery: f32,
    pub respawn_enabled: bool,
    pub respawn_delay_secs: u64,
    /// Bound on the funding wait during spawn before the agent goes
    /// active unfunded
    pub unfunded_grace_secs: u64,
    pub target_population: usize,
    /// Minimum wallet balance an agent needs for funded actions
    pub min_funding: u64,
    /// Spawn stats are base values minus up to this much
    pub spawn_stat_variation: f32,
    pub starting_coins: u64,
    pub autosave_interval_secs: u64,
    pub respawn_scan_interval_secs: u64,
    /// Fixed seed for reproducible runs; absent means seeded from entropy
    pub rng_seed: Option<u64>,
    /// Location ring agents travel around
    pub locations: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_interval_ms: 10_000,
            jitter_min: 0.75,
            jitter_max: 1.25,
            population_dampening: 0.02,
            rest_energy_threshold: 20.0,
            rest_recovery: 10.0,
            respawn_enabled: true,
            respawn_delay_secs: 60,
            unfunded_grace_secs: 30,
            target_population: 10,
            min_funding: 100,
            spawn_stat_variation: 10.0,
            starting_coins: 25,
            autosave_interval_secs: 60,
            respawn_scan_interval_secs: 5,
            rng_seed: None,
            locations: vec![
                "crossroads".to_string(),
                "mirefen".to_string(),
                "ironreach".to_string(),
                "saltmarket".to_string(),
                "hollowgate".to_string(),
            ],
        }
    }
}

impl EngineSettings {
    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.base_interval_ms == 0 {
            return Err(EngineError::Configuration(
                "base_interval_ms must be positive".to_string(),
            ));
        }
        if self.jitter_min <= 0.0 || self.jitter_max < self.jitter_min {
            return Err(EngineError::Configuration(format!(
                "invalid jitter band [{}, {}]",
                self.jitter_min, self.jitter_max
            )));
        }
        if self.population_dampening < 0.0 {
            return Err(EngineError::Configuration(
                "population_dampening must not be negative".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.rest_energy_threshold) {
            return Err(EngineError::Configuration(format!(
                "rest_energy_threshold {} outside [0, 100]",
                self.rest_energy_threshold
            )));
        }
        if self.rest_recovery <= 0.0 {
            return Err(EngineError::Configuration(
                "rest_recovery must be positive".to_string(),
            ));
        }
        if self.target_population == 0 {
            return Err(EngineError::Configuration(
                "target_population must be positive".to_string(),
            ));
        }
        if self.locations.is_empty() {
            return Err(EngineError::Configuration(
                "at least one location is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn base_interval(&self) -> Duration {
        Duration::from_millis(self.base_interval_ms)
    }

    pub fn respawn_delay(&self) -> Duration {
        Duration::from_secs(self.respawn_delay_secs)
    }

    pub fn unfunded_grace(&self) -> Duration {
        Duration::from_secs(self.unfunded_grace_secs)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }

    pub fn respawn_scan_interval(&self) -> Duration {
        Duration::from_secs(self.respawn_scan_interval_secs)
    }
}
