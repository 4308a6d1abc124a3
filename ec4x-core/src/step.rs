//! The turn resolver: `(state, packets, seed) → (state', events, deltas)`.
//!
//! Phases run Conflict → Income → Command → Maintenance, each with its
//! sub-steps in a fixed order. Iteration over houses, systems, and fleets
//! is always ascending by id, and every dice roll draws from a stream
//! derived from the turn seed, so the function is pure: the same inputs
//! produce byte-identical outputs and event traces.
//!
//! Failed commands are dropped with a `CommandRejected` event and the
//! turn completes; integrity violations abort the turn with no partial
//! state exposed.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::instrument;

use crate::colony::{ConstructionProject, ProjectKind, TerraformProject};
use crate::config::GameConfig;
use crate::defines::{colonization, construction};
use crate::diplomacy::{DiplomaticStance, ProposalKind};
use crate::events::{Event, EventLog, PrestigeReason};
use crate::fleet::{MissionState, ShipClass};
use crate::house::TechField;
use crate::ids::{FleetId, HouseId, SquadronId, SystemId};
use crate::input::{
    BuildCommand, ColonyManagement, CommandPacket, DiplomaticCommand, FleetCommand,
    FleetCommandKind, PopulationTransfer, StandingCommand, TerraformCommand,
};
use crate::projection::{self, FilteredGameState, StateDelta};
use crate::rng::TurnRng;
use crate::state::{GameState, IntegrityError, TurnPhase};
use crate::systems;

/// A command failed validation. Local: the command is dropped, an event
/// records why, and the turn continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("house not found: {house}")]
    HouseNotFound { house: HouseId },
    #[error("fleet not found: {fleet}")]
    FleetNotFound { fleet: FleetId },
    #[error("fleet {fleet} is not owned by house {house}")]
    FleetNotOwned { fleet: FleetId, house: HouseId },
    #[error("squadron not found: {squadron}")]
    SquadronNotFound { squadron: SquadronId },
    #[error("squadron {squadron} is not owned by house {house}")]
    SquadronNotOwned { squadron: SquadronId, house: HouseId },
    #[error("squadron {squadron} is not available in that container")]
    SquadronNotAvailable { squadron: SquadronId },
    #[error("no colony at system {system}")]
    ColonyNotFound { system: SystemId },
    #[error("colony {system} is not owned by house {house}")]
    ColonyNotOwned { system: SystemId, house: HouseId },
    #[error("system not found: {system}")]
    SystemNotFound { system: SystemId },
    #[error("no route from {from} to {to}")]
    NoRoute { from: SystemId, to: SystemId },
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },
    #[error("colony {system} cannot source {requested} cargo units")]
    InsufficientCargoSource { system: SystemId, requested: u32 },
    #[error("fleet {fleet} has no spacelift hull with room")]
    NoCargoSpace { fleet: FleetId },
    #[error("fleet {fleet} carries no cargo")]
    NoCargoAboard { fleet: FleetId },
    #[error("squadron {squadron} is not a carrier")]
    NotACarrier { squadron: SquadronId },
    #[error("carrier {carrier} hangar is full")]
    HangarFull { carrier: SquadronId },
    #[error("carrier {carrier} still has fighters embarked")]
    HangarNotEmpty { carrier: SquadronId },
    #[error("fleets {a} and {b} are not at the same friendly colony")]
    FleetsNotCoLocated { a: FleetId, b: FleetId },
    #[error("cannot strip fleet {fleet} of every squadron")]
    CannotEmptyFleet { fleet: FleetId },
    #[error("selection is empty")]
    EmptySelection,
    #[error("invalid tax rate: {rate}")]
    InvalidTaxRate { rate: u32 },
    #[error("fleet {fleet} is not a scout-only fleet")]
    NotScoutFleet { fleet: FleetId },
    #[error("command needs a target system")]
    MissingTarget,
    #[error("requires {field} tech level {required}")]
    TechRequirement { field: TechField, required: i32 },
    #[error("colony {system} already runs a project of that kind")]
    ProjectSlotBusy { system: SystemId },
    #[error("terraform target must be the next class up")]
    InvalidTerraformTarget,
    #[error("shipyard required at colony {system}")]
    ShipyardRequired { system: SystemId },
}

/// Fatal resolution failure. The caller keeps its original state; no
/// partially resolved turn is ever visible.
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("state integrity violated: {0}")]
    Integrity(#[from] IntegrityError),
    #[error("game is already decided (winner: house {winner})")]
    GameOver { winner: HouseId },
}

/// Everything a resolved turn produces.
#[derive(Debug)]
pub struct TurnOutcome {
    pub state: GameState,
    pub events: Vec<Event>,
    /// Per-house fog-filtered delta against the previous turn.
    pub deltas: BTreeMap<HouseId, StateDelta>,
    /// Post-resolution checksum (0 when disabled this turn).
    pub checksum: u64,
}

/// Resolve one full turn.
///
/// Pure in the mathematical sense: the input state is not touched, and
/// equal `(state, packets, seed)` triples produce identical outcomes.
#[instrument(skip_all, fields(game = %state.game_id, turn = state.turn + 1))]
pub fn resolve_turn(
    state: &GameState,
    packets: &BTreeMap<HouseId, CommandPacket>,
    seed: u64,
    config: &GameConfig,
) -> Result<TurnOutcome, TurnError> {
    if let Some(winner) = state.winner {
        return Err(TurnError::GameOver { winner });
    }

    let mut new_state = state.clone();
    new_state.turn += 1;
    new_state.rng_seed = seed;
    let rng = TurnRng::new(seed, new_state.turn);
    let mut events = EventLog::new();

    // ---- Conflict Phase ----
    new_state.phase = TurnPhase::Conflict;
    systems::movement::run_arrival_filtering(&mut new_state, &mut events); // 0 / 0b
    systems::combat::run_conflict_combat(&mut new_state, &mut events, &rng, config); // 1, 2, 4
    systems::combat::run_threat_escalation(&mut new_state, &mut events);
    systems::combat::run_blockade_bookkeeping(&mut new_state, &mut events); // 3
    systems::colonization::run_colonization(&mut new_state, &mut events); // 5
    systems::espionage::run_scout_missions(&mut new_state, &mut events, &rng); // 6a, 6a.5
    systems::espionage::run_espionage_actions(&mut new_state, packets, &mut events); // 6b
    systems::espionage::run_starbase_surveillance(&mut new_state, &mut events); // 6c
    complete_conflict_commands(&mut new_state); // 7
    debug_assert!(new_state.validate().is_ok(), "conflict phase left bad state");

    // ---- Income Phase ----
    new_state.phase = TurnPhase::Income;
    systems::economy::run_income_phase(&mut new_state, packets, &mut events, &rng, config);
    debug_assert!(new_state.validate().is_ok(), "income phase left bad state");

    // ---- Command Phase ----
    new_state.phase = TurnPhase::Command;
    run_command_phase(&mut new_state, packets, &mut events);
    debug_assert!(new_state.validate().is_ok(), "command phase left bad state");

    // ---- Maintenance Phase ----
    new_state.phase = TurnPhase::Maintenance;
    systems::maintenance::run_maintenance_phase(&mut new_state, &mut events);

    new_state.validate()?;

    // Projections and deltas, then the closing checksum marker
    let deltas = build_deltas(&mut new_state);
    let checksum = if config.checksum_frequency > 0
        && new_state.turn % config.checksum_frequency == 0
    {
        new_state.checksum()
    } else {
        0
    };
    events.emit(Event::TurnResolved { turn: new_state.turn, checksum });

    Ok(TurnOutcome {
        state: new_state,
        events: events.drain(),
        deltas,
        checksum,
    })
}

/// Conflict Phase step 7: one-shot commands that executed this phase
/// settle back to idle. Patrol and Blockade persist until overridden;
/// Salvage waits for the income phase of the following turn.
fn complete_conflict_commands(state: &mut GameState) {
    let mut fleet_ids: Vec<FleetId> = state.fleets.keys().copied().collect();
    fleet_ids.sort_unstable();

    for fleet_id in fleet_ids {
        let Some(fleet) = state.fleet(fleet_id) else {
            continue;
        };
        match fleet.mission {
            MissionState::Completed => {
                if let Some(f) = state.fleet_mut(fleet_id) {
                    f.clear_command();
                }
            }
            MissionState::Executing => {
                let Some(command) = fleet.command else {
                    if let Some(f) = state.fleet_mut(fleet_id) {
                        f.clear_command();
                    }
                    continue;
                };
                let persistent = matches!(
                    command.kind,
                    FleetCommandKind::Patrol
                        | FleetCommandKind::Blockade
                        | FleetCommandKind::Salvage
                );
                if !persistent {
                    if let Some(f) = state.fleet_mut(fleet_id) {
                        f.clear_command();
                    }
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// Command Phase
// ============================================================================

fn run_command_phase(
    state: &mut GameState,
    packets: &BTreeMap<HouseId, CommandPacket>,
    events: &mut EventLog,
) {
    // Standing-order bookkeeping from the packets comes first, so fresh
    // orders can generate this very turn
    for (&house_id, packet) in packets {
        for command in &packet.standing_commands {
            if let Err(e) = apply_standing_command(state, house_id, command) {
                reject(events, state.turn, house_id, None, &e);
            }
        }
    }

    // 1a: standing orders propose commands for idle fleets
    let proposals = systems::standing_orders::generate_commands(state);
    for proposal in proposals {
        let house = match state.fleet(proposal.fleet) {
            Some(f) => f.owner,
            None => continue,
        };
        if let Err(e) = commit_fleet_command(state, house, proposal) {
            log::debug!("standing-order proposal dropped: {e}");
        }
    }

    // 1b: explicit packet commands commit, overriding standing proposals
    for (&house_id, packet) in packets {
        for command in ordered_fleet_commands(packet) {
            if let Err(e) = commit_fleet_command(state, house_id, command) {
                reject(events, state.turn, house_id, Some(command.fleet), &e);
            }
        }
        for command in &packet.build_commands {
            if let Err(e) = process_build_command(state, house_id, command, events) {
                reject(events, state.turn, house_id, None, &e);
            }
        }
        for command in &packet.diplomatic_commands {
            if let Err(e) = process_diplomatic_command(state, house_id, *command, events) {
                reject(events, state.turn, house_id, None, &e);
            }
        }
        for transfer in &packet.population_transfers {
            if let Err(e) = process_population_transfer(state, house_id, *transfer) {
                reject(events, state.turn, house_id, None, &e);
            }
        }
        for command in &packet.terraform_commands {
            if let Err(e) = process_terraform_command(state, house_id, *command) {
                reject(events, state.turn, house_id, None, &e);
            }
        }
        for command in &packet.colony_management {
            if let Err(e) = process_colony_management(state, house_id, *command) {
                reject(events, state.turn, house_id, None, &e);
            }
        }
    }

    // 1c: one jump of travel; arrivals become Executing for next turn
    systems::movement::run_travel_step(state, events);
}

fn reject(
    events: &mut EventLog,
    turn: u32,
    house: HouseId,
    fleet: Option<FleetId>,
    error: &ValidationError,
) {
    log::debug!("command rejected for house {house}: {error}");
    events.emit(Event::CommandRejected {
        turn,
        house,
        fleet,
        reason: error.to_string(),
    });
}

/// Highest priority first per fleet; later duplicates for the same fleet
/// are dropped.
fn ordered_fleet_commands(packet: &CommandPacket) -> Vec<FleetCommand> {
    let mut commands = packet.fleet_commands.clone();
    commands.sort_by_key(|c| (c.fleet, std::cmp::Reverse(c.priority)));
    commands.dedup_by_key(|c| c.fleet);
    commands
}

/// Validate a fleet command and commit it to the fleet-command table.
pub fn commit_fleet_command(
    state: &mut GameState,
    house: HouseId,
    command: FleetCommand,
) -> Result<(), ValidationError> {
    let fleet = state
        .fleet(command.fleet)
        .ok_or(ValidationError::FleetNotFound { fleet: command.fleet })?;
    if fleet.owner != house {
        return Err(ValidationError::FleetNotOwned { fleet: command.fleet, house });
    }
    if fleet.mission == MissionState::ScoutLocked {
        return Err(ValidationError::FleetNotFound { fleet: command.fleet });
    }
    if let Some(target) = command.target_system {
        if !state.map.systems.contains_key(&target) {
            return Err(ValidationError::SystemNotFound { system: target });
        }
    }
    let scout_only = state.fleet_is_scout_only(fleet);
    if command.kind.is_spy() {
        if command.target_system.is_none() {
            return Err(ValidationError::MissingTarget);
        }
        if !scout_only {
            return Err(ValidationError::NotScoutFleet { fleet: command.fleet });
        }
    }

    // Spy missions launch from where the fleet stands; the scout entity
    // does the traveling. Everything else moves the fleet itself.
    let origin = fleet.location;
    let destination = if command.kind.is_spy() {
        origin
    } else {
        command.destination(origin)
    };

    let route = if destination == origin {
        Vec::new()
    } else {
        let fd = state
            .houses
            .get(&house)
            .map(|h| h.tech.get(TechField::Fd))
            .unwrap_or(0);
        let context = crate::starmap::TravelContext { fd_level: fd, scout_only };
        let path = state
            .map
            .shortest_path(origin, destination, context)
            .ok_or(ValidationError::NoRoute { from: origin, to: destination })?;
        path[1..].to_vec()
    };

    let fleet = state.fleet_mut(command.fleet).expect("fleet checked above");
    fleet.command = Some(command);
    fleet.route = route;
    fleet.mission = MissionState::Queued;
    Ok(())
}

fn apply_standing_command(
    state: &mut GameState,
    house: HouseId,
    command: &StandingCommand,
) -> Result<(), ValidationError> {
    let fleet_id = match command {
        StandingCommand::Set { fleet, .. } | StandingCommand::Clear { fleet } => *fleet,
    };
    let fleet = state
        .fleet(fleet_id)
        .ok_or(ValidationError::FleetNotFound { fleet: fleet_id })?;
    if fleet.owner != house {
        return Err(ValidationError::FleetNotOwned { fleet: fleet_id, house });
    }
    let fleet = state.fleet_mut(fleet_id).expect("fleet checked above");
    match command {
        StandingCommand::Set { order, .. } => fleet.standing_order = Some(order.clone()),
        StandingCommand::Clear { .. } => fleet.standing_order = None,
    }
    Ok(())
}

// ============================================================================
// Build Commands
// ============================================================================

fn build_turns(state: &GameState, system: SystemId, cost: i64) -> u32 {
    let shipyards = state
        .colony_at(system)
        .map(|c| {
            c.facilities
                .iter()
                .filter(|f| f.kind == crate::colony::FacilityKind::Shipyard && !f.crippled)
                .count() as i64
        })
        .unwrap_or(0);
    let throughput =
        construction::PP_PER_TURN_BASE + shipyards * construction::PP_PER_TURN_PER_SHIPYARD;
    ((cost + throughput - 1) / throughput).max(1) as u32
}

fn process_build_command(
    state: &mut GameState,
    house: HouseId,
    command: &BuildCommand,
    _events: &mut EventLog,
) -> Result<(), ValidationError> {
    let (colony_id, kind, cost) = match command {
        BuildCommand::Ship { colony, class } => {
            let cost = class.stats().build_cost;
            (*colony, ProjectKind::Ship(*class), cost)
        }
        BuildCommand::Facility { colony, kind } => {
            (*colony, ProjectKind::Facility(*kind), kind.build_cost())
        }
        BuildCommand::Industrial { colony, units } => (
            *colony,
            ProjectKind::Industrial { units: *units },
            i64::from(*units) * construction::IU_COST,
        ),
        BuildCommand::Infrastructure { colony } => {
            let level = state
                .colony_at(*colony)
                .map(|c| i64::from(c.infrastructure))
                .unwrap_or(0);
            (
                *colony,
                ProjectKind::Infrastructure,
                construction::INFRASTRUCTURE_BASE_COST * (level + 1),
            )
        }
        BuildCommand::GroundBatteries { colony, count } => (
            *colony,
            ProjectKind::GroundBatteries { count: *count },
            i64::from(*count) * construction::GROUND_BATTERY_COST,
        ),
        BuildCommand::ShieldUpgrade { colony } => (
            *colony,
            ProjectKind::ShieldUpgrade,
            construction::SHIELD_UPGRADE_COST,
        ),
    };

    let colony = state
        .colony_at(colony_id)
        .ok_or(ValidationError::ColonyNotFound { system: colony_id })?;
    if colony.owner != house {
        return Err(ValidationError::ColonyNotOwned { system: colony_id, house });
    }

    // Kind-specific gates
    match kind {
        ProjectKind::Ship(class) => {
            if class != ShipClass::Fighter
                && class != ShipClass::Scout
                && !colony.has_facility(crate::colony::FacilityKind::Shipyard)
            {
                return Err(ValidationError::ShipyardRequired { system: colony_id });
            }
            if class == ShipClass::PlanetBreaker {
                let cst = state
                    .houses
                    .get(&house)
                    .map(|h| h.tech.get(TechField::Cst))
                    .unwrap_or(0);
                if cst < construction::PLANET_BREAKER_MIN_CST {
                    return Err(ValidationError::TechRequirement {
                        field: TechField::Cst,
                        required: construction::PLANET_BREAKER_MIN_CST,
                    });
                }
            }
        }
        ProjectKind::ShieldUpgrade => {
            let sld = state
                .houses
                .get(&house)
                .map(|h| h.tech.get(TechField::Sld))
                .unwrap_or(0);
            let next_level = i32::from(colony.shield_level) + 1;
            if next_level > 6 || sld < next_level {
                return Err(ValidationError::TechRequirement {
                    field: TechField::Sld,
                    required: next_level,
                });
            }
        }
        ProjectKind::Infrastructure => {
            if colony.infrastructure >= crate::colony::Colony::MAX_INFRASTRUCTURE {
                return Err(ValidationError::ProjectSlotBusy { system: colony_id });
            }
        }
        _ => {}
    }

    let treasury = state
        .houses
        .get(&house)
        .map(|h| h.treasury)
        .ok_or(ValidationError::HouseNotFound { house })?;
    if treasury < cost {
        return Err(ValidationError::InsufficientFunds { required: cost, available: treasury });
    }

    let turns = build_turns(state, colony_id, cost);
    if let Some(h) = state.houses.get_mut(&house) {
        h.treasury -= cost;
    }
    if let Some(colony) = state.colony_at_mut(colony_id) {
        colony.enqueue(ConstructionProject::new(kind, cost, turns));
    }
    Ok(())
}

// ============================================================================
// Diplomatic Commands
// ============================================================================

fn process_diplomatic_command(
    state: &mut GameState,
    house: HouseId,
    command: DiplomaticCommand,
    events: &mut EventLog,
) -> Result<(), ValidationError> {
    let other = match command {
        DiplomaticCommand::ProposeNonAggression { to }
        | DiplomaticCommand::DeclareHostile { to }
        | DiplomaticCommand::DeclareEnemy { to }
        | DiplomaticCommand::OfferTruce { to } => to,
        DiplomaticCommand::AcceptProposal { from } | DiplomaticCommand::RejectProposal { from } => {
            from
        }
    };
    if other == house || !state.houses.contains_key(&other) {
        return Err(ValidationError::HouseNotFound { house: other });
    }

    let turn = state.turn;
    match command {
        DiplomaticCommand::ProposeNonAggression { to } => {
            state.diplomacy.submit_proposal(house, to, ProposalKind::NonAggression);
        }
        DiplomaticCommand::OfferTruce { to } => {
            state.diplomacy.submit_proposal(house, to, ProposalKind::Truce);
        }
        DiplomaticCommand::AcceptProposal { from } => {
            if state.diplomacy.accept_proposal(from, house) {
                let stance = state.diplomacy.stance(house, from);
                events.emit(Event::StanceChanged { turn, from: house, to: from, stance });
                events.emit(Event::StanceChanged { turn, from, to: house, stance });
            }
        }
        DiplomaticCommand::RejectProposal { from } => {
            state.diplomacy.reject_proposal(from, house);
        }
        DiplomaticCommand::DeclareHostile { to } => {
            declare_stance(state, events, house, to, DiplomaticStance::Hostile);
        }
        DiplomaticCommand::DeclareEnemy { to } => {
            declare_stance(state, events, house, to, DiplomaticStance::Enemy);
        }
    }
    Ok(())
}

/// A unilateral hostile declaration. Breaking a standing non-aggression
/// pact is a recorded violation with a prestige cost.
fn declare_stance(
    state: &mut GameState,
    events: &mut EventLog,
    house: HouseId,
    other: HouseId,
    stance: DiplomaticStance,
) {
    let turn = state.turn;
    let had_pact = state.diplomacy.stance(house, other) == DiplomaticStance::NonAggression
        && state.diplomacy.stance(other, house) == DiplomaticStance::NonAggression;

    if had_pact {
        state.diplomacy.record_pact_violation(house, other);
        state.award_prestige(
            house,
            crate::defines::prestige::PACT_VIOLATION,
            PrestigeReason::PactViolation,
        );
        events.emit(Event::DiplomaticIncident {
            turn,
            house,
            against: other,
            description: "non-aggression pact broken".into(),
        });
    }
    state.diplomacy.escalate(house, other, stance);
    events.emit(Event::StanceChanged { turn, from: house, to: other, stance });
}

// ============================================================================
// Population, Terraforming, Colony Settings
// ============================================================================

fn process_population_transfer(
    state: &mut GameState,
    house: HouseId,
    transfer: PopulationTransfer,
) -> Result<(), ValidationError> {
    if transfer.population_units <= 0 {
        return Err(ValidationError::EmptySelection);
    }
    for system in [transfer.from, transfer.to] {
        let colony = state
            .colony_at(system)
            .ok_or(ValidationError::ColonyNotFound { system })?;
        if colony.owner != house {
            return Err(ValidationError::ColonyNotOwned { system, house });
        }
    }
    let fd = state
        .houses
        .get(&house)
        .map(|h| h.tech.get(TechField::Fd))
        .unwrap_or(0);
    let context = crate::starmap::TravelContext { fd_level: fd, scout_only: false };
    if state
        .map
        .shortest_path(transfer.from, transfer.to, context)
        .is_none()
    {
        return Err(ValidationError::NoRoute { from: transfer.from, to: transfer.to });
    }

    let available = state
        .colony_at(transfer.from)
        .map(|c| c.population_units)
        .unwrap_or(0);
    if available < transfer.population_units {
        return Err(ValidationError::InsufficientCargoSource {
            system: transfer.from,
            requested: transfer.population_units as u32,
        });
    }
    let headroom = state
        .colony_at(transfer.to)
        .map(|c| (c.population_cap() - c.population_units).max(0))
        .unwrap_or(0);
    let moved = transfer.population_units.min(headroom);
    if moved == 0 {
        return Err(ValidationError::EmptySelection);
    }

    if let Some(colony) = state.colony_at_mut(transfer.from) {
        colony.population_units -= moved;
        colony.souls_millions = colony.population_units * 10;
    }
    if let Some(colony) = state.colony_at_mut(transfer.to) {
        colony.population_units += moved;
        colony.souls_millions = colony.population_units * 10;
    }
    Ok(())
}

fn process_terraform_command(
    state: &mut GameState,
    house: HouseId,
    command: TerraformCommand,
) -> Result<(), ValidationError> {
    let colony = state
        .colony_at(command.colony)
        .ok_or(ValidationError::ColonyNotFound { system: command.colony })?;
    if colony.owner != house {
        return Err(ValidationError::ColonyNotOwned { system: command.colony, house });
    }
    if colony.terraform.is_some() {
        return Err(ValidationError::ProjectSlotBusy { system: command.colony });
    }

    let ter = state
        .houses
        .get(&house)
        .map(|h| h.tech.get(TechField::Ter))
        .unwrap_or(0);
    if ter < 1 {
        return Err(ValidationError::TechRequirement { field: TechField::Ter, required: 1 });
    }

    let current = state
        .map
        .get(command.colony)
        .map(|s| s.planet_class)
        .ok_or(ValidationError::SystemNotFound { system: command.colony })?;
    if current.improved() != Some(command.target_class) {
        return Err(ValidationError::InvalidTerraformTarget);
    }

    let treasury = state
        .houses
        .get(&house)
        .map(|h| h.treasury)
        .unwrap_or(0);
    if treasury < colonization::TERRAFORM_COST {
        return Err(ValidationError::InsufficientFunds {
            required: colonization::TERRAFORM_COST,
            available: treasury,
        });
    }

    let turns = colonization::TERRAFORM_TURNS
        .saturating_sub(ter.max(0) as u32)
        .max(colonization::TERRAFORM_MIN_TURNS);
    if let Some(h) = state.houses.get_mut(&house) {
        h.treasury -= colonization::TERRAFORM_COST;
    }
    if let Some(colony) = state.colony_at_mut(command.colony) {
        colony.terraform = Some(TerraformProject {
            target_class: command.target_class,
            turns_remaining: turns,
        });
    }
    Ok(())
}

fn process_colony_management(
    state: &mut GameState,
    house: HouseId,
    command: ColonyManagement,
) -> Result<(), ValidationError> {
    let (system, rate) = match command {
        ColonyManagement::SetTaxRate { colony, rate } => (colony, Some(rate)),
        ColonyManagement::ClearTaxRate { colony } => (colony, None),
    };
    if let Some(r) = rate {
        if r > 100 {
            return Err(ValidationError::InvalidTaxRate { rate: r });
        }
    }
    let colony = state
        .colony_at(system)
        .ok_or(ValidationError::ColonyNotFound { system })?;
    if colony.owner != house {
        return Err(ValidationError::ColonyNotOwned { system, house });
    }
    if let Some(colony) = state.colony_at_mut(system) {
        colony.tax_override = rate;
    }
    Ok(())
}

// ============================================================================
// Projections
// ============================================================================

/// Project the new state per house, diff against the stored previous
/// projection, and persist the new projections for next turn's diff.
fn build_deltas(state: &mut GameState) -> BTreeMap<HouseId, StateDelta> {
    let mut deltas = BTreeMap::new();
    for house_id in state.all_house_ids() {
        let current = projection::project(state, house_id);
        let previous = state
            .last_projections
            .get(&house_id)
            .cloned()
            .unwrap_or_else(|| FilteredGameState {
                viewer: house_id,
                ..Default::default()
            });
        deltas.insert(house_id, projection::diff_projection(&previous, &current));
        state.last_projections.insert(house_id, current);
    }
    deltas
}
