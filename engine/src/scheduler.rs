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

//! Agent scheduler
//!
//! Owns the population of live agents. Each agent runs as its own tokio
//! task with an owned cancellation token, rescheduling itself with a
//! jittered, population-damped delay after every completed activity. The
//! supervisor loop is the single writer of the live-agent map and the
//! respawn-ticket set; agent tasks report lifecycle changes over a channel.

use crate::config::EngineSettings;
use crate::dispatch::{ActionDispatcher, ActionError, AgentSnapshot};
use crate::error::EngineError;
use crate::persistence::{with_retry, WorldStore};
use crate::personality::{PersonalityProfile, PersonalityProfiles};
use crate::selector::{ActivitySelector, SelectionContext};
use crate::wallet::WalletLedger;
use chrono::Utc;
use hollowmere_common::agent::VITAL_MAX;
use hollowmere_common::{ActionType, Agent, AgentId, AgentState, Personality, RespawnTicket, Vitals};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SAVE_ATTEMPTS: u32 = 3;

/// Scheduling damping term: delay lengthens as the active population grows,
/// floored at 0.5x
pub fn population_factor(active_count: usize, dampening: f64) -> f64 {
    (1.0 - active_count as f64 * dampening).max(0.5)
}

/// Next activity delay for one agent
///
/// Recomputed independently after every completed activity; never a
/// fixed-period timer.
fn next_delay(
    settings: &EngineSettings,
    personality_multiplier: f64,
    active_count: usize,
    rng: &mut StdRng,
) -> Duration {
    let factor = population_factor(active_count, settings.population_dampening);
    let jitter = rng.random_range(settings.jitter_min..=settings.jitter_max);
    Duration::from_secs_f64(
        settings.base_interval().as_secs_f64() * personality_multiplier * factor * jitter,
    )
}

/// Lifecycle notifications from agent tasks to the supervisor
#[derive(Debug)]
enum AgentEvent {
    Depleted(AgentId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    Depleted,
}

/// One live agent: shared state, its task, and the owned cancellation token
struct AgentCell {
    agent: Arc<RwLock<Agent>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Everything one agent's activity loop needs
struct AgentLoop {
    agent: Arc<RwLock<Agent>>,
    profile: PersonalityProfile,
    selector: ActivitySelector,
    dispatcher: Arc<ActionDispatcher>,
    ledger: Arc<WalletLedger>,
    store: Arc<dyn WorldStore>,
    settings: EngineSettings,
    rng: Arc<Mutex<StdRng>>,
    active_count: Arc<AtomicUsize>,
    events: mpsc::UnboundedSender<AgentEvent>,
    cancel: CancellationToken,
}

impl AgentLoop {
    async fn run(self) {
        loop {
            let delay = {
                let mut rng = self.rng.lock().await;
                next_delay(
                    &self.settings,
                    self.profile.delay_multiplier(),
                    self.active_count.load(Ordering::SeqCst),
                    &mut rng,
                )
            };
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if self.tick().await == TickOutcome::Depleted {
                let id = self.agent.read().await.id;
                if self.events.send(AgentEvent::Depleted(id)).is_err() {
                    tracing::warn!("Scheduler event channel closed; agent {} loop stopping", id);
                }
                break;
            }
        }
    }

    /// One activity tick: rest or select-dispatch-update
    ///
    /// Every error path is contained here; nothing propagates out of the
    /// agent's own loop.
    async fn tick(&self) -> TickOutcome {
        {
            let mut agent = self.agent.write().await;
            match agent.state {
                AgentState::Resting => {
                    agent.vitals.recover_energy(self.settings.rest_recovery);
                    if agent.vitals.energy() >= self.settings.rest_energy_threshold {
                        agent.state = AgentState::Active;
                        tracing::debug!(
                            "Agent {} ({}) rested back to active at {} energy",
                            agent.id,
                            agent.name,
                            agent.vitals.energy()
                        );
                    }
                    return TickOutcome::Continue;
                }
                AgentState::Active => {
                    if agent.vitals.energy() < self.settings.rest_energy_threshold {
                        agent.state = AgentState::Resting;
                        tracing::debug!(
                            "Agent {} ({}) is exhausted and settles down to rest",
                            agent.id,
                            agent.name
                        );
                        return TickOutcome::Continue;
                    }
                }
                _ => return TickOutcome::Continue,
            }
        }

        self.recheck_funding().await;

        let snapshot = {
            let agent = self.agent.read().await;
            AgentSnapshot::of(&agent)
        };

        let action = {
            let mut rng = self.rng.lock().await;
            let context = SelectionContext {
                energy: snapshot.energy,
                coins: snapshot.coins,
                funded: snapshot.funded,
            };
            self.selector.choose(&self.profile, &context, &mut *rng)
        };

        match self.dispatcher.dispatch(&snapshot, action).await {
            Ok(result) => {
                // An action in flight during shutdown completes, but its
                // result is discarded.
                if self.cancel.is_cancelled() {
                    tracing::debug!(
                        "Discarding {} result for agent {}; shutdown in progress",
                        action,
                        snapshot.id
                    );
                    return TickOutcome::Continue;
                }

                let persisted = {
                    let mut agent = self.agent.write().await;
                    agent.apply_delta(&result.delta);
                    if let Some(location) = result.relocate {
                        agent.location = location;
                    }
                    tracing::info!(
                        "Agent {} ({}) {}: {}",
                        agent.id,
                        agent.name,
                        action,
                        result.summary
                    );
                    if agent.vitals.is_depleted() {
                        agent.state = AgentState::Depleted;
                        tracing::info!("Agent {} ({}) is depleted", agent.id, agent.name);
                    }
                    agent.clone()
                };
                self.persist(&persisted).await;

                if persisted.state == AgentState::Depleted {
                    TickOutcome::Depleted
                } else {
                    TickOutcome::Continue
                }
            }
            Err(ActionError::InsufficientResources(reason)) => {
                // Selection-time filtering prevents most of these; the rest
                // are a no-op for this tick.
                tracing::debug!(
                    "Agent {} {} skipped: insufficient resources: {}",
                    snapshot.id,
                    action,
                    reason
                );
                if matches!(action, ActionType::Trade | ActionType::Exchange) {
                    self.agent.write().await.funded = false;
                }
                TickOutcome::Continue
            }
            Err(error) => {
                tracing::warn!(
                    "Agent {} action {} failed: {} (kind: {})",
                    snapshot.id,
                    action,
                    error,
                    error.kind()
                );
                TickOutcome::Continue
            }
        }
    }

    /// Degraded agents retry their funding check once per tick
    async fn recheck_funding(&self) {
        let (id, funded, wallet) = {
            let agent = self.agent.read().await;
            (agent.id, agent.funded, agent.wallet.clone())
        };
        if funded {
            return;
        }
        let Some(handle) = wallet else { return };
        match self
            .ledger
            .ensure_funded(&handle, self.settings.min_funding)
            .await
        {
            Ok(true) => {
                self.agent.write().await.funded = true;
                tracing::info!("Agent {} wallet funded; spending actions restored", id);
            }
            Ok(false) => {}
            Err(error) => {
                tracing::warn!(
                    "Agent {} funding check failed: {} (kind: {})",
                    id,
                    error,
                    error.kind()
                );
            }
        }
    }

    async fn persist(&self, agent: &Agent) {
        if let Err(error) =
            with_retry("save_agent", SAVE_ATTEMPTS, || self.store.save_agent(agent)).await
        {
            tracing::error!(
                "Agent {} left in last known good state; persistence gave up: {}",
                agent.id,
                error
            );
        }
    }
}

/// Owns the live-agent set, drives the agent lifecycle state machine, and
/// periodically scans respawn tickets
pub struct AgentScheduler {
    settings: EngineSettings,
    profiles: Arc<PersonalityProfiles>,
    selector: ActivitySelector,
    dispatcher: Arc<ActionDispatcher>,
    ledger: Arc<WalletLedger>,
    store: Arc<dyn WorldStore>,
    rng: Arc<Mutex<StdRng>>,
    live: HashMap<AgentId, AgentCell>,
    benched: HashMap<AgentId, Agent>,
    tickets: Vec<RespawnTicket>,
    active_count: Arc<AtomicUsize>,
    events_tx: mpsc::UnboundedSender<AgentEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<AgentEvent>>,
}

impl AgentScheduler {
    pub fn new(
        settings: EngineSettings,
        profiles: PersonalityProfiles,
        dispatcher: Arc<ActionDispatcher>,
        ledger: Arc<WalletLedger>,
        store: Arc<dyn WorldStore>,
    ) -> Result<Self, EngineError> {
        settings.validate()?;
        profiles.validate()?;

        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            settings,
            profiles: Arc::new(profiles),
            selector: ActivitySelector::new(),
            dispatcher,
            ledger,
            store,
            rng: Arc::new(Mutex::new(rng)),
            live: HashMap::new(),
            benched: HashMap::new(),
            tickets: Vec::new(),
            active_count: Arc::new(AtomicUsize::new(0)),
            events_tx,
            events_rx: Some(events_rx),
        })
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pending_respawn_count(&self) -> usize {
        self.tickets.len()
    }

    fn population(&self) -> usize {
        self.live.len() + self.benched.len()
    }

    /// Bring the population up: resume persisted agents when requested,
    /// then spawn fresh ones until the desired count is reached
    pub async fn start(&mut self, desired: usize, resume: bool) -> Result<(), EngineError> {
        if resume {
            let persisted =
                with_retry("list_agents", SAVE_ATTEMPTS, || self.store.list_agents()).await?;
            tracing::info!("Resuming {} persisted agents", persisted.len());
            for agent in persisted {
                self.resume_agent(agent).await;
            }
        }

        let missing = desired.saturating_sub(self.population());
        for _ in 0..missing {
            match self.spawn_fresh().await {
                Ok(id) => tracing::info!("Spawned agent {}", id),
                Err(error) => tracing::error!(
                    "Failed to spawn agent: {} (kind: {}); continuing with a smaller population",
                    error,
                    error.kind()
                ),
            }
        }

        tracing::info!(
            "Scheduler started with {} live agents ({} awaiting respawn)",
            self.live.len(),
            self.tickets.len()
        );
        Ok(())
    }

    /// Supervisor loop: agent events, respawn scans, and auto-save, until
    /// the shutdown token fires
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), EngineError> {
        let mut events_rx = self.events_rx.take().ok_or_else(|| {
            EngineError::Configuration("scheduler is already running".to_string())
        })?;
        let mut respawn_scan = tokio::time::interval(self.settings.respawn_scan_interval());
        let mut autosave = tokio::time::interval(self.settings.autosave_interval());

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(event) = events_rx.recv() => self.handle_event(event).await,
                _ = respawn_scan.tick() => self.scan_respawns().await,
                _ = autosave.tick() => self.autosave().await,
            }
        }

        tracing::info!("Scheduler shutting down...");
        self.teardown().await;
        self.events_rx = Some(events_rx);
        Ok(())
    }

    async fn handle_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::Depleted(id) => {
                let Some(cell) = self.live.remove(&id) else {
                    tracing::warn!("Depletion event for unknown agent {}", id);
                    return;
                };
                self.active_count.store(self.live.len(), Ordering::SeqCst);
                metrics::gauge!("hollowmere_agents_live").set(self.live.len() as f64);

                cell.cancel.cancel();
                if let Err(error) = cell.task.await {
                    tracing::error!("Agent {} task ended abnormally: {}", id, error);
                }
                let mut agent = match Arc::try_unwrap(cell.agent) {
                    Ok(lock) => lock.into_inner(),
                    Err(shared) => shared.read().await.clone(),
                };

                agent.state = AgentState::RespawnPending;
                let eligible_at =
                    Utc::now() + chrono::Duration::seconds(self.settings.respawn_delay_secs as i64);
                if let Err(error) =
                    with_retry("save_agent", SAVE_ATTEMPTS, || self.store.save_agent(&agent)).await
                {
                    tracing::error!("Failed to persist depleted agent {}: {}", id, error);
                }
                tracing::info!(
                    "Agent {} ({}) awaiting respawn, eligible at {}",
                    id,
                    agent.name,
                    eligible_at
                );
                self.tickets.push(RespawnTicket::new(id, eligible_at));
                self.benched.insert(id, agent);
            }
        }
    }

    /// Reset and relaunch agents whose tickets have come eligible
    async fn scan_respawns(&mut self) {
        if !self.settings.respawn_enabled {
            return;
        }
        let now = Utc::now();
        let eligible: Vec<AgentId> = self
            .tickets
            .iter()
            .filter(|ticket| ticket.is_eligible(now))
            .map(|ticket| ticket.agent_id)
            .collect();
        if eligible.is_empty() {
            return;
        }
        self.tickets.retain(|ticket| !ticket.is_eligible(now));

        for id in eligible {
            let Some(mut agent) = self.benched.remove(&id) else {
                tracing::warn!("Respawn ticket for unknown agent {}", id);
                continue;
            };
            agent.reset_for_respawn();

            // The wallet is reused, never recreated
            if agent.wallet.is_none() {
                match self.ledger.ensure_wallet(id).await {
                    Ok(handle) => agent.wallet = Some(handle),
                    Err(error) => {
                        tracing::warn!("Could not reattach wallet for agent {}: {}", id, error);
                        agent.funded = false;
                    }
                }
            }

            if let Err(error) =
                with_retry("save_agent", SAVE_ATTEMPTS, || self.store.save_agent(&agent)).await
            {
                tracing::error!("Failed to persist respawned agent {}: {}", id, error);
            }
            tracing::info!("Respawning agent {} ({})", id, agent.name);
            if let Err(error) = self.launch(agent) {
                tracing::error!("Failed to relaunch agent {}: {}", id, error);
            }
        }
    }

    /// Periodic save of every agent the scheduler knows about
    async fn autosave(&self) {
        let mut saved = 0usize;
        let mut failed = 0usize;
        for cell in self.live.values() {
            let agent = cell.agent.read().await.clone();
            match self.store.save_agent(&agent).await {
                Ok(()) => saved += 1,
                Err(error) => {
                    failed += 1;
                    tracing::warn!("Auto-save failed for agent {}: {}", agent.id, error);
                }
            }
        }
        for agent in self.benched.values() {
            match self.store.save_agent(agent).await {
                Ok(()) => saved += 1,
                Err(error) => {
                    failed += 1;
                    tracing::warn!("Auto-save failed for agent {}: {}", agent.id, error);
                }
            }
        }
        if failed > 0 {
            tracing::warn!("Auto-save: {} saved, {} failed", saved, failed);
        } else {
            tracing::debug!("Auto-save: {} agents saved", saved);
        }
    }

    /// Spawn a brand new agent with randomized identity and spawn stats
    async fn spawn_fresh(&mut self) -> Result<AgentId, EngineError> {
        let (name, personality, location, vitals, coins) = {
            let mut rng = self.rng.lock().await;
            let name = generate_name(&mut rng);
            let personality = Personality::ALL[rng.random_range(0..Personality::ALL.len())];
            let location = self.settings.locations
                [rng.random_range(0..self.settings.locations.len())]
            .clone();
            let variation = self.settings.spawn_stat_variation.max(0.0);
            let vitals = Vitals::new(
                VITAL_MAX - rng.random_range(0.0..=variation),
                VITAL_MAX - rng.random_range(0.0..=variation),
            );
            let coins = self.settings.starting_coins;
            (name, personality, location, vitals, coins)
        };

        let mut agent = Agent::new(name, personality, location);
        agent.vitals = vitals;
        agent.coins = coins;
        self.activate(agent).await
    }

    /// Shared spawn path: ensure the wallet, run the funding check bounded
    /// by the unfunded grace period, persist, and launch the activity loop
    async fn activate(&mut self, mut agent: Agent) -> Result<AgentId, EngineError> {
        let id = agent.id;
        agent.state = AgentState::Spawning;

        let handle = self.ledger.ensure_wallet(id).await?;
        agent.wallet = Some(handle.clone());

        agent.funded = match tokio::time::timeout(
            self.settings.unfunded_grace(),
            self.ledger.ensure_funded(&handle, self.settings.min_funding),
        )
        .await
        {
            Ok(Ok(funded)) => funded,
            Ok(Err(error)) => {
                tracing::warn!(
                    "Agent {} funding check failed at spawn: {} (kind: {})",
                    id,
                    error,
                    error.kind()
                );
                false
            }
            Err(_elapsed) => {
                tracing::warn!(
                    "Agent {} still unfunded after grace period {:?}; going active anyway",
                    id,
                    self.settings.unfunded_grace()
                );
                false
            }
        };

        agent.state = AgentState::Active;
        if let Err(error) =
            with_retry("save_agent", SAVE_ATTEMPTS, || self.store.save_agent(&agent)).await
        {
            tracing::error!(
                "Agent {} running unpersisted; auto-save will retry: {}",
                id,
                error
            );
        }
        self.launch(agent)?;
        Ok(id)
    }

    /// Reconstruct one persisted agent
    async fn resume_agent(&mut self, mut agent: Agent) {
        let id = agent.id;
        tracing::info!(
            "Resuming agent {} ({}) in state {}",
            id,
            agent.name,
            agent.state
        );
        match agent.state {
            // A persisted agent with no health left goes through respawn
            // whatever state it was saved in
            _ if agent.vitals.is_depleted() => {
                agent.state = AgentState::RespawnPending;
                tracing::info!("Agent {} resumes depleted, awaiting respawn", id);
                self.tickets.push(RespawnTicket::new(id, Utc::now()));
                self.benched.insert(id, agent);
            }
            AgentState::Active | AgentState::Resting => {
                match self.ledger.ensure_wallet(id).await {
                    Ok(handle) => agent.wallet = Some(handle),
                    Err(error) => {
                        tracing::error!("Could not reattach wallet for agent {}: {}", id, error);
                        agent.funded = false;
                    }
                }
                if let Err(error) = self.launch(agent) {
                    tracing::error!("Failed to resume agent {}: {}", id, error);
                }
            }
            AgentState::Depleted | AgentState::RespawnPending => {
                agent.state = AgentState::RespawnPending;
                tracing::info!("Agent {} resumes awaiting respawn", id);
                self.tickets.push(RespawnTicket::new(id, Utc::now()));
                self.benched.insert(id, agent);
            }
            AgentState::Spawning | AgentState::Shutdown => {
                if let Err(error) = self.activate(agent).await {
                    tracing::error!("Failed to reactivate agent {}: {}", id, error);
                }
            }
        }
    }

    /// Launch an agent's activity loop
    ///
    /// Exactly one pending activity may exist per live agent; launching an
    /// already scheduled agent is rejected.
    fn launch(&mut self, agent: Agent) -> Result<(), EngineError> {
        let id = agent.id;
        if self.live.contains_key(&id) {
            return Err(EngineError::Configuration(format!(
                "agent {} is already scheduled",
                id
            )));
        }
        let profile = self
            .profiles
            .profile(agent.personality)
            .cloned()
            .ok_or_else(|| {
                EngineError::Configuration(format!(
                    "no profile for personality '{}'",
                    agent.personality
                ))
            })?;

        let agent = Arc::new(RwLock::new(agent));
        let cancel = CancellationToken::new();
        let agent_loop = AgentLoop {
            agent: agent.clone(),
            profile,
            selector: self.selector,
            dispatcher: self.dispatcher.clone(),
            ledger: self.ledger.clone(),
            store: self.store.clone(),
            settings: self.settings.clone(),
            rng: self.rng.clone(),
            active_count: self.active_count.clone(),
            events: self.events_tx.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(agent_loop.run());

        self.live.insert(id, AgentCell { agent, cancel, task });
        self.active_count.store(self.live.len(), Ordering::SeqCst);
        metrics::gauge!("hollowmere_agents_live").set(self.live.len() as f64);
        Ok(())
    }

    /// Cancel every pending activity cooperatively and persist final states
    async fn teardown(&mut self) {
        for cell in self.live.values() {
            cell.cancel.cancel();
        }

        let ids: Vec<AgentId> = self.live.keys().copied().collect();
        for id in ids {
            let Some(cell) = self.live.remove(&id) else {
                continue;
            };
            if let Err(error) = cell.task.await {
                tracing::error!("Agent {} task ended abnormally: {}", id, error);
            }
            let mut agent = match Arc::try_unwrap(cell.agent) {
                Ok(lock) => lock.into_inner(),
                Err(shared) => shared.read().await.clone(),
            };
            agent.state = AgentState::Shutdown;
            if let Err(error) =
                with_retry("save_agent", SAVE_ATTEMPTS, || self.store.save_agent(&agent)).await
            {
                tracing::error!("Failed to persist agent {} at shutdown: {}", id, error);
            }
        }

        // Benched agents keep their pending-respawn state for the next run
        for agent in self.benched.values() {
            if let Err(error) =
                with_retry("save_agent", SAVE_ATTEMPTS, || self.store.save_agent(agent)).await
            {
                tracing::error!("Failed to persist agent {} at shutdown: {}", agent.id, error);
            }
        }

        self.active_count.store(0, Ordering::SeqCst);
        metrics::gauge!("hollowmere_agents_live").set(0.0);
        tracing::info!("Scheduler shutdown complete");
    }
}

/// Two-part denizen name from fixed syllable tables
fn generate_name(rng: &mut StdRng) -> String {
    const GIVEN: [&str; 12] = [
        "Bram", "Odet", "Fen", "Tilda", "Moss", "Wick", "Sable", "Iver", "Nanna", "Corb",
        "Hesper", "Ruon",
    ];
    const EPITHET: [&str; 10] = [
        "of the Fen",
        "Ironhand",
        "the Quiet",
        "Saltborn",
        "Longstride",
        "the Keen",
        "Mirewalker",
        "Coppertooth",
        "the Stray",
        "Emberwise",
    ];
    format!(
        "{} {}",
        GIVEN[rng.random_range(0..GIVEN.len())],
        EPITHET[rng.random_range(0..EPITHET.len())]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainClient, ChainError, FundingSource, KeyCustodian};
    use crate::dispatch::ActionEffect;
    use crate::persistence::MemoryWorldStore;
    use crate::wallet::KeyMaterial;
    use async_trait::async_trait;
    use hollowmere_common::{ActionResult, StatDelta, Vitals, WalletAddress};

    struct TestCustodian;

    #[async_trait]
    impl KeyCustodian for TestCustodian {
        async fn create_key(&self) -> Result<(WalletAddress, KeyMaterial), ChainError> {
            Ok((
                WalletAddress::new(format!("hm1q{}", uuid::Uuid::new_v4().simple())),
                KeyMaterial::new(vec![7; 32]),
            ))
        }
    }

    struct TestChain;

    #[async_trait]
    impl ChainClient for TestChain {
        async fn balance(&self, _address: &WalletAddress) -> Result<u64, ChainError> {
            Ok(1_000)
        }
    }

    struct TestFunding;

    #[async_trait]
    impl FundingSource for TestFunding {
        async fn fund(&self, _address: &WalletAddress, _amount: u64) -> Result<(), ChainError> {
            Ok(())
        }
    }

    struct LethalEffect;

    #[async_trait]
    impl ActionEffect for LethalEffect {
        async fn apply(
            &self,
            _agent: &AgentSnapshot,
        ) -> Result<ActionResult, crate::dispatch::ActionError> {
            Ok(ActionResult::new(
                StatDelta::new(-200.0, -5.0, 0),
                "took a mortal wound",
            ))
        }

        fn name(&self) -> &str {
            "lethal"
        }
    }

    struct GentleEffect;

    #[async_trait]
    impl ActionEffect for GentleEffect {
        async fn apply(
            &self,
            _agent: &AgentSnapshot,
        ) -> Result<ActionResult, crate::dispatch::ActionError> {
            Ok(ActionResult::new(StatDelta::new(0.0, -1.0, 1), "pottered about"))
        }

        fn name(&self) -> &str {
            "gentle"
        }
    }

    fn test_ledger(store: Arc<MemoryWorldStore>) -> Arc<WalletLedger> {
        Arc::new(WalletLedger::new(
            store,
            Arc::new(TestCustodian),
            Arc::new(TestChain),
            Arc::new(TestFunding),
            Duration::from_secs(1),
        ))
    }

    fn dispatcher_with(effect: Arc<dyn ActionEffect>) -> Arc<ActionDispatcher> {
        let mut dispatcher = ActionDispatcher::new();
        for action in ActionType::ALL {
            if action != ActionType::Idle {
                dispatcher.register(action, effect.clone());
            }
        }
        Arc::new(dispatcher)
    }

    fn test_settings() -> EngineSettings {
        EngineSettings {
            base_interval_ms: 20,
            jitter_min: 0.9,
            jitter_max: 1.1,
            unfunded_grace_secs: 1,
            respawn_delay_secs: 0,
            respawn_scan_interval_secs: 1,
            autosave_interval_secs: 60,
            rng_seed: Some(7),
            ..Default::default()
        }
    }

    fn agent_loop_for(
        agent: Agent,
        dispatcher: Arc<ActionDispatcher>,
        store: Arc<MemoryWorldStore>,
        settings: EngineSettings,
    ) -> (AgentLoop, Arc<RwLock<Agent>>) {
        let shared = Arc::new(RwLock::new(agent));
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let agent_loop = AgentLoop {
            agent: shared.clone(),
            profile: PersonalityProfiles::builtin()
                .profile(Personality::Industrious)
                .cloned()
                .unwrap(),
            selector: ActivitySelector::new(),
            dispatcher,
            ledger: test_ledger(store.clone()),
            store,
            settings,
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(5))),
            active_count: Arc::new(AtomicUsize::new(1)),
            events: events_tx,
            cancel: CancellationToken::new(),
        };
        (agent_loop, shared)
    }

    #[test]
    fn test_population_factor_floor() {
        let factor = population_factor(30, 0.02);
        assert!((factor - 0.5).abs() < 1e-9, "expected floor, got {}", factor);

        let factor = population_factor(10, 0.02);
        assert!((factor - 0.8).abs() < 1e-9, "expected 0.8, got {}", factor);
    }

    #[test]
    fn test_next_delay_within_band() {
        let settings = EngineSettings {
            base_interval_ms: 10_000,
            jitter_min: 0.75,
            jitter_max: 1.25,
            population_dampening: 0.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let delay = next_delay(&settings, 1.0, 0, &mut rng);
            assert!(delay >= Duration::from_millis(7_500), "{:?}", delay);
            assert!(delay <= Duration::from_millis(12_500), "{:?}", delay);
        }
    }

    #[tokio::test]
    async fn test_low_energy_agent_rests_then_recovers() {
        let store = Arc::new(MemoryWorldStore::new());
        let settings = test_settings();
        let mut agent = Agent::new("Resty", Personality::Industrious, "crossroads");
        agent.state = AgentState::Active;
        agent.vitals = Vitals::new(100.0, 12.0);

        let (agent_loop, shared) = agent_loop_for(
            agent,
            dispatcher_with(Arc::new(GentleEffect)),
            store,
            settings,
        );

        // Below the rest threshold: no action dispatched, agent rests
        assert_eq!(agent_loop.tick().await, TickOutcome::Continue);
        assert_eq!(shared.read().await.state, AgentState::Resting);

        // One resting tick recovers up past the threshold (12 + 10 >= 20)
        assert_eq!(agent_loop.tick().await, TickOutcome::Continue);
        let agent = shared.read().await;
        assert_eq!(agent.state, AgentState::Active);
        assert!(agent.vitals.energy() >= 20.0);
    }

    #[tokio::test]
    async fn test_depletion_stops_the_loop_immediately() {
        let store = Arc::new(MemoryWorldStore::new());
        let mut agent = Agent::new("Doomed", Personality::Industrious, "crossroads");
        agent.state = AgentState::Active;
        agent.funded = true;

        let (agent_loop, shared) = agent_loop_for(
            agent,
            dispatcher_with(Arc::new(LethalEffect)),
            store.clone(),
            test_settings(),
        );

        // Idle carries a small weight, so the mortal wound may take a few
        // draws to land
        let mut outcome = TickOutcome::Continue;
        for _ in 0..20 {
            outcome = agent_loop.tick().await;
            if outcome == TickOutcome::Depleted {
                break;
            }
        }
        assert_eq!(outcome, TickOutcome::Depleted);
        let agent = shared.read().await;
        assert_eq!(agent.state, AgentState::Depleted);
        assert_eq!(agent.vitals.health(), 0.0);
        // Depletion was persisted before the loop reported it
        let persisted = store.load_agent(agent.id).await.unwrap().unwrap();
        assert_eq!(persisted.state, AgentState::Depleted);
    }

    #[tokio::test]
    async fn test_vitals_stay_in_range_over_many_ticks() {
        let store = Arc::new(MemoryWorldStore::new());
        let mut agent = Agent::new("Steady", Personality::Industrious, "crossroads");
        agent.state = AgentState::Active;
        agent.funded = true;

        let (agent_loop, shared) = agent_loop_for(
            agent,
            dispatcher_with(Arc::new(GentleEffect)),
            store,
            test_settings(),
        );

        for _ in 0..200 {
            agent_loop.tick().await;
            let agent = shared.read().await;
            let health = agent.vitals.health();
            let energy = agent.vitals.energy();
            assert!((0.0..=100.0).contains(&health), "health {}", health);
            assert!((0.0..=100.0).contains(&energy), "energy {}", energy);
        }
    }

    #[tokio::test]
    async fn test_no_double_schedule() {
        let store = Arc::new(MemoryWorldStore::new());
        let mut scheduler = AgentScheduler::new(
            test_settings(),
            PersonalityProfiles::builtin(),
            dispatcher_with(Arc::new(GentleEffect)),
            test_ledger(store.clone()),
            store,
        )
        .unwrap();

        let agent = Agent::new("Solo", Personality::Nomadic, "crossroads");
        let copy = agent.clone();
        scheduler.launch(agent).unwrap();
        let err = scheduler.launch(copy).unwrap_err();
        assert_eq!(err.kind(), "configuration");
        assert_eq!(scheduler.live_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_isolated() {
        struct BrokenEffect;

        #[async_trait]
        impl ActionEffect for BrokenEffect {
            async fn apply(
                &self,
                _agent: &AgentSnapshot,
            ) -> Result<ActionResult, crate::dispatch::ActionError> {
                Err(crate::dispatch::ActionError::Unavailable(
                    "collaborator offline".to_string(),
                ))
            }

            fn name(&self) -> &str {
                "broken"
            }
        }

        let store = Arc::new(MemoryWorldStore::new());
        let mut agent = Agent::new("Unlucky", Personality::Industrious, "crossroads");
        agent.state = AgentState::Active;
        agent.funded = true;
        let before = agent.vitals;

        let (agent_loop, shared) = agent_loop_for(
            agent,
            dispatcher_with(Arc::new(BrokenEffect)),
            store,
            test_settings(),
        );

        // Failure is a no-op for the tick: no stat change, loop continues
        assert_eq!(agent_loop.tick().await, TickOutcome::Continue);
        let agent = shared.read().await;
        assert_eq!(agent.vitals, before);
        assert_eq!(agent.state, AgentState::Active);
    }
}
