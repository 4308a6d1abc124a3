//! # EC4X Core
//!
//! Deterministic turn-resolution engine for an asynchronous multi-player
//! 4X wargame. Players submit command packets once per strategic cycle; a
//! server-authoritative resolver folds every packet into a new state,
//! publishes fog-of-war filtered views, and tracks victory.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────┐
//! │   Players    │────▶│ CommandPackets │────▶│ resolve_turn │
//! │  (per house) │     │  (per turn)    │     │  (pure fn)   │
//! └──────────────┘     └────────────────┘     └──────┬───────┘
//!                                                    │
//!                      ┌────────────────┐     ┌──────▼───────┐
//!                      │  Projections   │◀────│  GameState   │
//!                      │ (fog-filtered) │     │ (new state)  │
//!                      └────────────────┘     └──────────────┘
//! ```
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`GameState`] | Complete game state (houses, colonies, fleets, map) |
//! | [`CommandPacket`] | One house's queued orders for a turn |
//! | [`resolve_turn`] | Pure function: `(state, packets, seed) -> outcome` |
//! | [`submit_zero_turn`] | Immediate administrative commands |
//! | [`project`] | Fog-of-war projection for one house |
//! | [`Event`] | Append-only structured event record |
//!
//! ## Determinism
//!
//! The resolver is single-threaded and deterministic end to end: map
//! iteration goes through sorted id vectors, and every dice roll draws
//! from a stream derived from `(seed, turn, subsystem, keys)`. Replaying
//! the same inputs yields byte-identical state, events, and deltas.

pub mod bounded;
pub mod colony;
pub mod config;
pub mod defines;
pub mod diplomacy;
pub mod events;
pub mod fleet;
pub mod house;
pub mod ids;
pub mod input;
pub mod intel;
pub mod projection;
pub mod rng;
pub mod starmap;
pub mod state;
pub mod step;
pub mod systems;
pub mod testing;
pub mod zero_turn;


pub use bounded::{new_prestige, new_tech_level, BoundedInt};
pub use config::{ConfigError, GameConfig};
pub use events::{Event, EventLog};
pub use fleet::{Cargo, CombatState, Fleet, MissionState, ShipClass, Squadron, StandingOrder};
pub use house::{House, HouseStatus, TechField};
pub use ids::{ColonyId, FacilityId, FleetId, HouseId, ShipId, SpyScoutId, SquadronId, SystemId};
pub use input::{CommandPacket, FleetCommand, FleetCommandKind, ThreatLevel};
pub use projection::{apply_delta, diff_projection, project, FilteredGameState, StateDelta};
pub use rng::{DiceRng, TurnRng};
pub use starmap::{HexCoord, LaneType, PlanetClass, ResourceRating, StarMap, TravelContext};
pub use state::{GameState, IntegrityError, TurnPhase};
pub use step::{resolve_turn, TurnError, TurnOutcome, ValidationError};
pub use zero_turn::{submit_zero_turn, ZeroTurnCommand, ZeroTurnOutcome};
