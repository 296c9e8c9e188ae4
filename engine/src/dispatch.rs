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

//! Action dispatch
//!
//! Routes a chosen action type to its external effect collaborator. The
//! dispatcher never retries; retries, if any, belong to the collaborator.

use async_trait::async_trait;
use hollowmere_common::{ActionResult, ActionType, Agent, AgentId, Personality};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Typed failure from an action-effect collaborator
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("insufficient resources: {0}")]
    InsufficientResources(String),

    #[error("external system unavailable: {0}")]
    Unavailable(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl ActionError {
    /// Stable kind tag for structured log records
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::InsufficientResources(_) => "insufficient_resources",
            ActionError::Unavailable(_) => "unavailable",
            ActionError::InvalidTarget(_) => "invalid_target",
        }
    }
}

/// Read-only view of an agent handed to effect collaborators
#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub name: String,
    pub personality: Personality,
    pub location: String,
    pub health: f32,
    pub energy: f32,
    pub coins: u64,
    pub funded: bool,
}

impl AgentSnapshot {
    pub fn of(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name.clone(),
            personality: agent.personality,
            location: agent.location.clone(),
            health: agent.vitals.health(),
            energy: agent.vitals.energy(),
            coins: agent.coins,
            funded: agent.funded,
        }
    }
}

/// One external game-logic/blockchain collaborator per action type
#[async_trait]
pub trait ActionEffect: Send + Sync {
    /// Validate preconditions, apply the effect, and report the result or a
    /// typed failure
    async fn apply(&self, agent: &AgentSnapshot) -> Result<ActionResult, ActionError>;

    fn name(&self) -> &str;
}

/// Routes chosen action types to their effect collaborators
pub struct ActionDispatcher {
    routes: HashMap<ActionType, Arc<dyn ActionEffect>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register the collaborator for an action type, replacing any existing
    /// route
    pub fn register(&mut self, action: ActionType, effect: Arc<dyn ActionEffect>) {
        self.routes.insert(action, effect);
    }

    pub fn with_route(mut self, action: ActionType, effect: Arc<dyn ActionEffect>) -> Self {
        self.register(action, effect);
        self
    }

    /// Dispatch one action for an agent
    ///
    /// On success the caller applies the stat delta; on failure the caller
    /// applies nothing and only logs.
    pub async fn dispatch(
        &self,
        agent: &AgentSnapshot,
        action: ActionType,
    ) -> Result<ActionResult, ActionError> {
        if action == ActionType::Idle {
            return Ok(ActionResult::noop("idled"));
        }

        let effect = self.routes.get(&action).ok_or_else(|| {
            ActionError::Unavailable(format!("no collaborator registered for '{}'", action))
        })?;

        match effect.apply(agent).await {
            Ok(result) => {
                metrics::counter!("hollowmere_actions_dispatched", "action" => action.as_str())
                    .increment(1);
                tracing::debug!(
                    "Agent {} ({}) completed {}: {}",
                    agent.id,
                    agent.name,
                    action,
                    result.summary
                );
                Ok(result)
            }
            Err(error) => {
                metrics::counter!("hollowmere_actions_failed", "action" => action.as_str())
                    .increment(1);
                Err(error)
            }
        }
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hollowmere_common::StatDelta;

    struct FixedEffect {
        delta: StatDelta,
    }

    #[async_trait]
    impl ActionEffect for FixedEffect {
        async fn apply(&self, _agent: &AgentSnapshot) -> Result<ActionResult, ActionError> {
            Ok(ActionResult::new(self.delta, "fixed"))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingEffect;

    #[async_trait]
    impl ActionEffect for FailingEffect {
        async fn apply(&self, _agent: &AgentSnapshot) -> Result<ActionResult, ActionError> {
            Err(ActionError::Unavailable("collaborator offline".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn snapshot() -> AgentSnapshot {
        let agent = Agent::new("Testa", Personality::Industrious, "crossroads");
        AgentSnapshot::of(&agent)
    }

    #[tokio::test]
    async fn test_idle_dispatch_is_noop() {
        let dispatcher = ActionDispatcher::new();
        let result = dispatcher
            .dispatch(&snapshot(), ActionType::Idle)
            .await
            .unwrap();
        assert_eq!(result.delta, StatDelta::default());
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_registered_effect() {
        let dispatcher = ActionDispatcher::new().with_route(
            ActionType::Mine,
            Arc::new(FixedEffect {
                delta: StatDelta::new(0.0, -10.0, 5),
            }),
        );
        let result = dispatcher
            .dispatch(&snapshot(), ActionType::Mine)
            .await
            .unwrap();
        assert_eq!(result.delta.coins, 5);
    }

    #[tokio::test]
    async fn test_unregistered_action_is_unavailable() {
        let dispatcher = ActionDispatcher::new();
        let err = dispatcher
            .dispatch(&snapshot(), ActionType::Trade)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }

    #[tokio::test]
    async fn test_failure_surfaces_typed_error() {
        let dispatcher =
            ActionDispatcher::new().with_route(ActionType::Chat, Arc::new(FailingEffect));
        let err = dispatcher
            .dispatch(&snapshot(), ActionType::Chat)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }
}
