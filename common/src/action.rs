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

//! Action types and dispatch results

use serde::{Deserialize, Serialize};

/// One activity an agent can perform on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    /// No-op fallback; never filtered out of selection
    Idle,
    Travel,
    Mine,
    Trade,
    Chat,
    Equip,
    Exchange,
}

impl ActionType {
    /// All action types, Idle first
    pub const ALL: [ActionType; 7] = [
        ActionType::Idle,
        ActionType::Travel,
        ActionType::Mine,
        ActionType::Trade,
        ActionType::Chat,
        ActionType::Equip,
        ActionType::Exchange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Idle => "idle",
            ActionType::Travel => "travel",
            ActionType::Mine => "mine",
            ActionType::Trade => "trade",
            ActionType::Chat => "chat",
            ActionType::Equip => "equip",
            ActionType::Exchange => "exchange",
        }
    }

    /// Parse from a database string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(ActionType::Idle),
            "travel" => Some(ActionType::Travel),
            "mine" => Some(ActionType::Mine),
            "trade" => Some(ActionType::Trade),
            "chat" => Some(ActionType::Chat),
            "equip" => Some(ActionType::Equip),
            "exchange" => Some(ActionType::Exchange),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stat change produced by a completed action
///
/// Health and energy deltas are applied through `Vitals` clamping; the coin
/// delta is applied with saturating arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatDelta {
    pub health: f32,
    pub energy: f32,
    pub coins: i64,
}

impl StatDelta {
    pub fn new(health: f32, energy: f32, coins: i64) -> Self {
        Self {
            health,
            energy,
            coins,
        }
    }
}

/// Result of a successfully dispatched action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub delta: StatDelta,
    /// Human-readable summary of the external effect, for logs
    pub summary: String,
    /// New location when the action moved the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relocate: Option<String>,
}

impl ActionResult {
    pub fn new(delta: StatDelta, summary: impl Into<String>) -> Self {
        Self {
            delta,
            summary: summary.into(),
            relocate: None,
        }
    }

    /// A result that changes nothing
    pub fn noop(summary: impl Into<String>) -> Self {
        Self::new(StatDelta::default(), summary)
    }

    pub fn with_relocation(mut self, location: impl Into<String>) -> Self {
        self.relocate = Some(location.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_round_trip() {
        for action in ActionType::ALL {
            assert_eq!(ActionType::from_str(action.as_str()), Some(action));
        }
        assert_eq!(ActionType::from_str("dance"), None);
    }

    #[test]
    fn test_noop_result() {
        let result = ActionResult::noop("nothing happened");
        assert_eq!(result.delta, StatDelta::default());
        assert_eq!(result.summary, "nothing happened");
    }
}
