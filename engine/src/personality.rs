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

//! Personality archetype weight tables
//!
//! Loaded once at process start into an immutable table that is injected
//! into the scheduler and selector; there is no ad hoc global lookup.

use crate::error::EngineError;
use hollowmere_common::{ActionType, Personality};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Action-preference weights and delay multiplier for one archetype
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityProfile {
    weights: HashMap<ActionType, f64>,
    delay_multiplier: f64,
}

impl PersonalityProfile {
    pub fn new(delay_multiplier: f64) -> Self {
        Self {
            weights: HashMap::new(),
            delay_multiplier,
        }
    }

    pub fn with_weight(mut self, action: ActionType, weight: f64) -> Self {
        self.weights.insert(action, weight);
        self
    }

    /// Preference weight for an action; unlisted actions weigh zero
    pub fn weight(&self, action: ActionType) -> f64 {
        self.weights.get(&action).copied().unwrap_or(0.0)
    }

    pub fn weights(&self) -> &HashMap<ActionType, f64> {
        &self.weights
    }

    pub fn delay_multiplier(&self) -> f64 {
        self.delay_multiplier
    }
}

/// Immutable per-archetype profile table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityProfiles {
    profiles: HashMap<Personality, PersonalityProfile>,
}

impl PersonalityProfiles {
    /// The built-in archetype table
    pub fn builtin() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            Personality::Industrious,
            PersonalityProfile::new(0.9)
                .with_weight(ActionType::Mine, 5.0)
                .with_weight(ActionType::Travel, 1.5)
                .with_weight(ActionType::Trade, 1.0)
                .with_weight(ActionType::Equip, 1.0)
                .with_weight(ActionType::Chat, 0.5)
                .with_weight(ActionType::Exchange, 0.5)
                .with_weight(ActionType::Idle, 0.5),
        );
        profiles.insert(
            Personality::Nomadic,
            PersonalityProfile::new(0.8)
                .with_weight(ActionType::Travel, 5.0)
                .with_weight(ActionType::Mine, 1.0)
                .with_weight(ActionType::Chat, 1.0)
                .with_weight(ActionType::Trade, 0.5)
                .with_weight(ActionType::Equip, 0.5)
                .with_weight(ActionType::Exchange, 0.25)
                .with_weight(ActionType::Idle, 1.0),
        );
        profiles.insert(
            Personality::Mercantile,
            PersonalityProfile::new(1.0)
                .with_weight(ActionType::Trade, 4.0)
                .with_weight(ActionType::Exchange, 2.5)
                .with_weight(ActionType::Travel, 1.0)
                .with_weight(ActionType::Chat, 1.0)
                .with_weight(ActionType::Mine, 0.5)
                .with_weight(ActionType::Equip, 0.5)
                .with_weight(ActionType::Idle, 0.5),
        );
        profiles.insert(
            Personality::Gregarious,
            PersonalityProfile::new(1.1)
                .with_weight(ActionType::Chat, 5.0)
                .with_weight(ActionType::Travel, 1.5)
                .with_weight(ActionType::Trade, 1.0)
                .with_weight(ActionType::Idle, 1.0)
                .with_weight(ActionType::Mine, 0.25)
                .with_weight(ActionType::Equip, 0.25)
                .with_weight(ActionType::Exchange, 0.25),
        );
        profiles.insert(
            Personality::Martial,
            PersonalityProfile::new(0.85)
                .with_weight(ActionType::Mine, 3.0)
                .with_weight(ActionType::Equip, 2.0)
                .with_weight(ActionType::Travel, 1.5)
                .with_weight(ActionType::Chat, 0.5)
                .with_weight(ActionType::Trade, 0.5)
                .with_weight(ActionType::Exchange, 0.25)
                .with_weight(ActionType::Idle, 0.5),
        );
        Self { profiles }
    }

    /// Fail fast on a table the scheduler cannot run with: every archetype
    /// must be present with a positive multiplier and at least one positive
    /// action weight.
    pub fn validate(&self) -> Result<(), EngineError> {
        for personality in Personality::ALL {
            let profile = self.profiles.get(&personality).ok_or_else(|| {
                EngineError::Configuration(format!(
                    "personality table missing archetype '{}'",
                    personality
                ))
            })?;
            if profile.delay_multiplier() <= 0.0 {
                return Err(EngineError::Configuration(format!(
                    "personality '{}' has non-positive delay multiplier {}",
                    personality,
                    profile.delay_multiplier()
                )));
            }
            if !profile.weights().values().any(|w| *w > 0.0) {
                return Err(EngineError::Configuration(format!(
                    "personality '{}' has no positive action weight",
                    personality
                )));
            }
        }
        Ok(())
    }

    pub fn profile(&self, personality: Personality) -> Option<&PersonalityProfile> {
        self.profiles.get(&personality)
    }

    pub fn delay_multiplier_for(&self, personality: Personality) -> Option<f64> {
        self.profiles
            .get(&personality)
            .map(|p| p.delay_multiplier())
    }
}
