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

//! Weighted activity selection
//!
//! Turns a personality profile plus the agent's current situation into a
//! single action via cumulative-weight sampling. The random source is
//! injected so a fixed seed reproduces a fixed sequence of choices.

use crate::personality::PersonalityProfile;
use hollowmere_common::{ActionType, Agent};
use rand::Rng;

/// What the selector may consider about an agent when filtering actions
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext {
    pub energy: f32,
    pub coins: u64,
    pub funded: bool,
}

impl SelectionContext {
    pub fn for_agent(agent: &Agent) -> Self {
        Self {
            energy: agent.vitals.energy(),
            coins: agent.coins,
            funded: agent.funded,
        }
    }
}

/// Weighted random action selection with feasibility filtering
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivitySelector;

impl ActivitySelector {
    /// Minimum energy for actions that exert the agent
    const EXERTION_ENERGY_FLOOR: f32 = 5.0;
    /// Minimum coins for actions that spend them
    const SPEND_COIN_FLOOR: u64 = 1;

    pub fn new() -> Self {
        Self
    }

    /// Whether an action is currently possible for the agent
    ///
    /// `Idle` is the fallback and is never filtered.
    pub fn is_feasible(&self, action: ActionType, context: &SelectionContext) -> bool {
        match action {
            ActionType::Idle | ActionType::Chat => true,
            ActionType::Travel | ActionType::Mine | ActionType::Equip => {
                context.energy >= Self::EXERTION_ENERGY_FLOOR
            }
            ActionType::Trade | ActionType::Exchange => {
                context.funded && context.coins >= Self::SPEND_COIN_FLOOR
            }
        }
    }

    /// Choose one action by cumulative-weight sampling over the feasible
    /// subset of the profile's weights
    pub fn choose(
        &self,
        profile: &PersonalityProfile,
        context: &SelectionContext,
        rng: &mut impl Rng,
    ) -> ActionType {
        let mut candidates: Vec<(ActionType, f64)> = profile
            .weights()
            .iter()
            .filter(|(action, weight)| **weight > 0.0 && self.is_feasible(**action, context))
            .map(|(action, weight)| (*action, *weight))
            .collect();

        if candidates.is_empty() {
            return ActionType::Idle;
        }

        // Weight maps iterate in arbitrary order; a stable order is required
        // for a seeded rng to reproduce the same draws.
        candidates.sort_by_key(|(action, _)| action.as_str());

        let total: f64 = candidates.iter().map(|(_, weight)| weight).sum();
        let roll = rng.random_range(0.0..total);

        let mut cumulative = 0.0;
        for (action, weight) in &candidates {
            cumulative += weight;
            if roll < cumulative {
                return *action;
            }
        }

        // Floating point accumulation can leave the roll at the boundary
        candidates[candidates.len() - 1].0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personality::PersonalityProfile;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn context(energy: f32, coins: u64, funded: bool) -> SelectionContext {
        SelectionContext {
            energy,
            coins,
            funded,
        }
    }

    #[test]
    fn test_zero_weight_actions_never_selected() {
        let profile = PersonalityProfile::new(1.0)
            .with_weight(ActionType::Mine, 1.0)
            .with_weight(ActionType::Travel, 1.0)
            .with_weight(ActionType::Chat, 0.0);
        let selector = ActivitySelector::new();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let action = selector.choose(&profile, &context(100.0, 10, true), &mut rng);
            assert_ne!(action, ActionType::Chat);
        }
    }

    #[test]
    fn test_equal_weights_draw_roughly_evenly() {
        let profile = PersonalityProfile::new(1.0)
            .with_weight(ActionType::Mine, 1.0)
            .with_weight(ActionType::Travel, 1.0);
        let selector = ActivitySelector::new();
        let mut rng = StdRng::seed_from_u64(42);

        let mut mine = 0usize;
        let mut travel = 0usize;
        for _ in 0..10_000 {
            match selector.choose(&profile, &context(100.0, 10, true), &mut rng) {
                ActionType::Mine => mine += 1,
                ActionType::Travel => travel += 1,
                other => panic!("unexpected action {}", other),
            }
        }
        let ratio = mine as f64 / travel as f64;
        assert!(
            (0.9..=1.1).contains(&ratio),
            "mine:travel ratio {} outside tolerance",
            ratio
        );
    }

    #[test]
    fn test_fixed_seed_reproduces_choices() {
        let profile = PersonalityProfile::new(1.0)
            .with_weight(ActionType::Mine, 2.0)
            .with_weight(ActionType::Travel, 1.0)
            .with_weight(ActionType::Chat, 1.0);
        let selector = ActivitySelector::new();
        let ctx = context(80.0, 5, true);

        let mut first = StdRng::seed_from_u64(99);
        let mut second = StdRng::seed_from_u64(99);
        for _ in 0..100 {
            assert_eq!(
                selector.choose(&profile, &ctx, &mut first),
                selector.choose(&profile, &ctx, &mut second)
            );
        }
    }

    #[test]
    fn test_exhausted_agent_falls_back_to_idle() {
        // No idle weight at all: everything filters out, Idle still returned
        let profile = PersonalityProfile::new(1.0)
            .with_weight(ActionType::Mine, 3.0)
            .with_weight(ActionType::Travel, 2.0)
            .with_weight(ActionType::Trade, 1.0);
        let selector = ActivitySelector::new();
        let mut rng = StdRng::seed_from_u64(3);

        let action = selector.choose(&profile, &context(0.0, 0, false), &mut rng);
        assert_eq!(action, ActionType::Idle);
    }

    #[test]
    fn test_unfunded_agent_skips_spending_actions() {
        let profile = PersonalityProfile::new(1.0)
            .with_weight(ActionType::Trade, 10.0)
            .with_weight(ActionType::Exchange, 10.0)
            .with_weight(ActionType::Chat, 0.1);
        let selector = ActivitySelector::new();
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..500 {
            let action = selector.choose(&profile, &context(50.0, 100, false), &mut rng);
            assert_eq!(action, ActionType::Chat);
        }
    }
}
