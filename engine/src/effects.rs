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

//! Baseline in-process action effects
//!
//! Default collaborators wired into the dispatcher so the engine runs a
//! live world out of the box. Deployments replace these with real
//! game-logic or chain-backed collaborators; tests replace them with mocks.

use crate::dispatch::{ActionEffect, ActionError, AgentSnapshot};
use async_trait::async_trait;
use hollowmere_common::{ActionResult, ActionType, StatDelta};
use std::sync::Arc;

/// Moves the agent to the next stop on the location ring
pub struct TravelEffect {
    ring: Vec<String>,
}

impl TravelEffect {
    pub fn new(ring: Vec<String>) -> Self {
        Self { ring }
    }
}

#[async_trait]
impl ActionEffect for TravelEffect {
    async fn apply(&self, agent: &AgentSnapshot) -> Result<ActionResult, ActionError> {
        if agent.energy < 5.0 {
            return Err(ActionError::InsufficientResources(format!(
                "energy {} too low to travel",
                agent.energy
            )));
        }
        let position = self
            .ring
            .iter()
            .position(|stop| *stop == agent.location)
            .ok_or_else(|| {
                ActionError::InvalidTarget(format!("unknown location '{}'", agent.location))
            })?;
        let destination = self.ring[(position + 1) % self.ring.len()].clone();
        Ok(
            ActionResult::new(StatDelta::new(0.0, -8.0, 0), format!("walked to {}", destination))
                .with_relocation(destination),
        )
    }

    fn name(&self) -> &str {
        "travel"
    }
}

/// Converts energy (and a little health) into coins
pub struct MineEffect {
    yield_coins: i64,
}

impl MineEffect {
    pub fn new(yield_coins: i64) -> Self {
        Self { yield_coins }
    }
}

#[async_trait]
impl ActionEffect for MineEffect {
    async fn apply(&self, agent: &AgentSnapshot) -> Result<ActionResult, ActionError> {
        if agent.energy < 10.0 {
            return Err(ActionError::InsufficientResources(format!(
                "energy {} too low to mine",
                agent.energy
            )));
        }
        Ok(ActionResult::new(
            StatDelta::new(-1.5, -12.0, self.yield_coins),
            format!("mined {} coins at {}", self.yield_coins, agent.location),
        ))
    }

    fn name(&self) -> &str {
        "mine"
    }
}

/// Local market trade; requires a funded wallet and coins on hand
pub struct TradeEffect;

#[async_trait]
impl ActionEffect for TradeEffect {
    async fn apply(&self, agent: &AgentSnapshot) -> Result<ActionResult, ActionError> {
        if !agent.funded {
            return Err(ActionError::InsufficientResources(
                "wallet unfunded".to_string(),
            ));
        }
        if agent.coins < 2 {
            return Err(ActionError::InsufficientResources(format!(
                "{} coins is not enough to trade",
                agent.coins
            )));
        }
        Ok(ActionResult::new(
            StatDelta::new(0.0, -4.0, 2),
            format!("closed a trade at {}", agent.location),
        ))
    }

    fn name(&self) -> &str {
        "trade"
    }
}

/// Idle chatter; cheap and slightly restorative
pub struct ChatEffect;

#[async_trait]
impl ActionEffect for ChatEffect {
    async fn apply(&self, agent: &AgentSnapshot) -> Result<ActionResult, ActionError> {
        Ok(ActionResult::new(
            StatDelta::new(0.5, -2.0, 0),
            format!("swapped stories at {}", agent.location),
        ))
    }

    fn name(&self) -> &str {
        "chat"
    }
}

/// Spends a coin maintaining gear
pub struct EquipEffect;

#[async_trait]
impl ActionEffect for EquipEffect {
    async fn apply(&self, agent: &AgentSnapshot) -> Result<ActionResult, ActionError> {
        if agent.energy < 5.0 {
            return Err(ActionError::InsufficientResources(format!(
                "energy {} too low to maintain gear",
                agent.energy
            )));
        }
        if agent.coins < 1 {
            return Err(ActionError::InsufficientResources(
                "no coins for gear upkeep".to_string(),
            ));
        }
        Ok(ActionResult::new(
            StatDelta::new(1.0, -3.0, -1),
            "maintained equipment",
        ))
    }

    fn name(&self) -> &str {
        "equip"
    }
}

/// Deposits coins through the on-chain exchange
pub struct ExchangeEffect {
    lot_size: u64,
}

impl ExchangeEffect {
    pub fn new(lot_size: u64) -> Self {
        Self { lot_size }
    }
}

#[async_trait]
impl ActionEffect for ExchangeEffect {
    async fn apply(&self, agent: &AgentSnapshot) -> Result<ActionResult, ActionError> {
        if !agent.funded {
            return Err(ActionError::InsufficientResources(
                "wallet unfunded".to_string(),
            ));
        }
        if agent.coins < self.lot_size {
            return Err(ActionError::InsufficientResources(format!(
                "{} coins is below the {} coin exchange lot",
                agent.coins, self.lot_size
            )));
        }
        Ok(ActionResult::new(
            StatDelta::new(0.0, -3.0, -(self.lot_size as i64)),
            format!("deposited {} coins to the exchange", self.lot_size),
        ))
    }

    fn name(&self) -> &str {
        "exchange"
    }
}

/// Dispatcher wired with the baseline effects over the given location ring
pub fn default_dispatcher(locations: &[String]) -> crate::dispatch::ActionDispatcher {
    crate::dispatch::ActionDispatcher::new()
        .with_route(ActionType::Travel, Arc::new(TravelEffect::new(locations.to_vec())))
        .with_route(ActionType::Mine, Arc::new(MineEffect::new(6)))
        .with_route(ActionType::Trade, Arc::new(TradeEffect))
        .with_route(ActionType::Chat, Arc::new(ChatEffect))
        .with_route(ActionType::Equip, Arc::new(EquipEffect))
        .with_route(ActionType::Exchange, Arc::new(ExchangeEffect::new(5)))
}
