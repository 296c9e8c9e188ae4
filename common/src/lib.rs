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

//! Hollowmere Common Types
//!
//! This crate defines shared data types used across Hollowmere:
//! - Denizen (agent) records, vitals, and lifecycle states
//! - Action types and dispatch results
//! - Opaque wallet handles

pub mod action;
pub mod agent;
pub mod wallet;

pub use self::action::{ActionResult, ActionType, StatDelta};
pub use self::agent::{Agent, AgentId, AgentState, Personality, RespawnTicket, Vitals};
pub use self::wallet::{WalletAddress, WalletHandle};
