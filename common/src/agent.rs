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

//! Denizen (agent) data types and lifecycle states

use crate::action::StatDelta;
use crate::wallet::WalletHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum value for health and energy
pub const VITAL_MAX: f32 = 100.0;

/// Stable persistent identifier for an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Generate a fresh agent id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AgentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Personality archetype mapping to action-preference weights and a delay multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Personality {
    Industrious,
    Nomadic,
    Mercantile,
    Gregarious,
    Martial,
}

impl Personality {
    /// All known archetypes
    pub const ALL: [Personality; 5] = [
        Personality::Industrious,
        Personality::Nomadic,
        Personality::Mercantile,
        Personality::Gregarious,
        Personality::Martial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Industrious => "industrious",
            Personality::Nomadic => "nomadic",
            Personality::Mercantile => "mercantile",
            Personality::Gregarious => "gregarious",
            Personality::Martial => "martial",
        }
    }

    /// Parse from a database string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "industrious" => Some(Personality::Industrious),
            "nomadic" => Some(Personality::Nomadic),
            "mercantile" => Some(Personality::Mercantile),
            "gregarious" => Some(Personality::Gregarious),
            "martial" => Some(Personality::Martial),
            _ => None,
        }
    }
}

impl std::fmt::Display for Personality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Agent lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    /// Wallet and initial stats being prepared
    Spawning,
    /// Normal activity loop
    Active,
    /// Passively recovering energy
    Resting,
    /// Health reached zero; removed from the active set
    Depleted,
    /// Waiting for the respawn ticket to become eligible
    RespawnPending,
    /// Process teardown
    Shutdown,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Spawning => "spawning",
            AgentState::Active => "active",
            AgentState::Resting => "resting",
            AgentState::Depleted => "depleted",
            AgentState::RespawnPending => "respawn_pending",
            AgentState::Shutdown => "shutdown",
        }
    }

    /// Parse from a database string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "spawning" => Some(AgentState::Spawning),
            "active" => Some(AgentState::Active),
            "resting" => Some(AgentState::Resting),
            "depleted" => Some(AgentState::Depleted),
            "respawn_pending" => Some(AgentState::RespawnPending),
            "shutdown" => Some(AgentState::Shutdown),
            _ => None,
        }
    }

    /// States in which the agent holds a pending scheduled activity
    pub fn is_scheduled(&self) -> bool {
        matches!(self, AgentState::Active | AgentState::Resting)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Health and energy, always clamped to [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    health: f32,
    energy: f32,
}

impl Vitals {
    /// Create vitals, clamping both values into range
    pub fn new(health: f32, energy: f32) -> Self {
        Self {
            health: health.clamp(0.0, VITAL_MAX),
            energy: energy.clamp(0.0, VITAL_MAX),
        }
    }

    /// Fresh spawn vitals at full health and energy
    pub fn full() -> Self {
        Self::new(VITAL_MAX, VITAL_MAX)
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn energy(&self) -> f32 {
        self.energy
    }

    /// Apply a health/energy delta, clamping the results
    pub fn apply(&mut self, health_delta: f32, energy_delta: f32) {
        self.health = (self.health + health_delta).clamp(0.0, VITAL_MAX);
        self.energy = (self.energy + energy_delta).clamp(0.0, VITAL_MAX);
    }

    /// Recover energy by the given amount, clamped
    pub fn recover_energy(&mut self, amount: f32) {
        self.energy = (self.energy + amount).clamp(0.0, VITAL_MAX);
    }

    /// Health has reached zero
    pub fn is_depleted(&self) -> bool {
        self.health <= 0.0
    }
}

impl Default for Vitals {
    fn default() -> Self {
        Self::full()
    }
}

/// A scheduler-managed non-player denizen
///
/// Health and energy are clamped to [0, 100] by `Vitals`; the coin balance
/// is unsigned and debited with saturating arithmetic, so it can never go
/// negative. The wallet handle is opaque and carries no key material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub personality: Personality,
    pub location: String,
    pub vitals: Vitals,
    pub coins: u64,
    pub state: AgentState,
    /// Wallet funding check has passed; cleared when funding fails
    pub funded: bool,
    pub wallet: Option<WalletHandle>,
}

impl Agent {
    /// Create a fresh agent in the `Spawning` state
    pub fn new(name: impl Into<String>, personality: Personality, location: impl Into<String>) -> Self {
        Self {
            id: AgentId::generate(),
            name: name.into(),
            personality,
            location: location.into(),
            vitals: Vitals::full(),
            coins: 0,
            state: AgentState::Spawning,
            funded: false,
            wallet: None,
        }
    }

    /// Apply an action's stat delta: vitals clamped, coins saturating
    pub fn apply_delta(&mut self, delta: &StatDelta) {
        self.vitals.apply(delta.health, delta.energy);
        if delta.coins >= 0 {
            self.coins = self.coins.saturating_add(delta.coins as u64);
        } else {
            self.coins = self.coins.saturating_sub(delta.coins.unsigned_abs());
        }
    }

    /// Reset stats to spawn defaults, keeping identity, wallet, and location
    pub fn reset_for_respawn(&mut self) {
        self.vitals = Vitals::full();
        self.state = AgentState::Active;
    }
}

/// Pending record scheduling an agent's stat reset after depletion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespawnTicket {
    pub agent_id: AgentId,
    pub eligible_at: DateTime<Utc>,
}

impl RespawnTicket {
    pub fn new(agent_id: AgentId, eligible_at: DateTime<Utc>) -> Self {
        Self {
            agent_id,
            eligible_at,
        }
    }

    /// The ticket's eligibility time has passed
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        now >= self.eligible_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::StatDelta;

    #[test]
    fn test_vitals_clamping() {
        let mut vitals = Vitals::new(150.0, -20.0);
        assert_eq!(vitals.health(), 100.0);
        assert_eq!(vitals.energy(), 0.0);

        vitals.apply(-250.0, 500.0);
        assert_eq!(vitals.health(), 0.0);
        assert_eq!(vitals.energy(), 100.0);
        assert!(vitals.is_depleted());
    }

    #[test]
    fn test_coins_never_negative() {
        let mut agent = Agent::new("Bram", Personality::Mercantile, "crossroads");
        agent.coins = 5;
        agent.apply_delta(&StatDelta {
            health: 0.0,
            energy: 0.0,
            coins: -50,
        });
        assert_eq!(agent.coins, 0);
    }

    #[test]
    fn test_respawn_reset_keeps_identity() {
        let mut agent = Agent::new("Odet", Personality::Martial, "mirefen");
        let id = agent.id;
        agent.vitals = Vitals::new(0.0, 12.0);
        agent.state = AgentState::RespawnPending;

        agent.reset_for_respawn();
        assert_eq!(agent.id, id);
        assert_eq!(agent.state, AgentState::Active);
        assert_eq!(agent.vitals.health(), 100.0);
    }

    #[test]
    fn test_state_round_trip() {
        for state in [
            AgentState::Spawning,
            AgentState::Active,
            AgentState::Resting,
            AgentState::Depleted,
            AgentState::RespawnPending,
            AgentState::Shutdown,
        ] {
            assert_eq!(AgentState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(AgentState::from_str("bogus"), None);
    }

    #[test]
    fn test_personality_round_trip() {
        for personality in Personality::ALL {
            assert_eq!(Personality::from_str(personality.as_str()), Some(personality));
        }
    }

    #[test]
    fn test_respawn_ticket_eligibility() {
        let now = Utc::now();
        let ticket = RespawnTicket::new(AgentId::generate(), now + chrono::Duration::seconds(60));
        assert!(!ticket.is_eligible(now));
        assert!(ticket.is_eligible(now + chrono::Duration::seconds(61)));
    }
}
