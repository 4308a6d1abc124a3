//! Zero-turn administrative commands.
//!
//! These execute synchronously on submission, outside the turn cycle:
//! squadron formation from the commissioned pool, fleet split/merge and
//! squadron transfer, cargo handling, fighter embarkation, colony
//! settings. The common prerequisite is a fleet or squadron sitting at a
//! friendly colony. A blockade does not suspend them: it throttles the
//! colony's economy, not its docks.

use serde::{Deserialize, Serialize};

use crate::fleet::{Cargo, Fleet, ShipClass};
use crate::ids::{FleetId, HouseId, SquadronId, SystemId};
use crate::state::GameState;
use crate::step::ValidationError;

/// An administrative command. Executes immediately; consumes no turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZeroTurnCommand {
    /// Form a new fleet at a colony from commissioned squadrons.
    FormFleet {
        house: HouseId,
        colony: SystemId,
        squadrons: Vec<SquadronId>,
    },
    /// Move commissioned squadrons into an existing fleet at the colony.
    AssignToFleet {
        house: HouseId,
        fleet: FleetId,
        squadrons: Vec<SquadronId>,
    },
    /// Move squadrons between two fleets at the same friendly colony.
    TransferSquadrons {
        house: HouseId,
        from_fleet: FleetId,
        to_fleet: FleetId,
        squadrons: Vec<SquadronId>,
    },
    /// Detach squadrons into a new fleet.
    SplitFleet {
        house: HouseId,
        fleet: FleetId,
        squadrons: Vec<SquadronId>,
    },
    /// Fold one fleet into another.
    MergeFleets {
        house: HouseId,
        from: FleetId,
        into: FleetId,
    },
    /// Load cargo from the colony onto the fleet's spacelift hulls.
    LoadCargo {
        house: HouseId,
        fleet: FleetId,
        cargo: Cargo,
    },
    /// Unload all cargo back into the colony.
    UnloadCargo { house: HouseId, fleet: FleetId },
    /// Embark colony-based fighters into a carrier's hangar.
    EmbarkFighters {
        house: HouseId,
        carrier: SquadronId,
        fighters: Vec<SquadronId>,
    },
    /// Return embarked fighters to the colony.
    DisembarkFighters {
        house: HouseId,
        carrier: SquadronId,
    },
    /// Set or clear a colony's tax-rate override.
    SetColonyTax {
        house: HouseId,
        colony: SystemId,
        rate: Option<u32>,
    },
    /// Voluntarily disband a commissioned squadron at a friendly colony.
    DisbandSquadron {
        house: HouseId,
        squadron: SquadronId,
    },
}

/// Result of a successful zero-turn command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ZeroTurnOutcome {
    /// Fleet minted by FormFleet / SplitFleet.
    pub new_fleet: Option<FleetId>,
    pub message: String,
}

/// Execute an administrative command against live state.
pub fn submit_zero_turn(
    state: &mut GameState,
    command: ZeroTurnCommand,
) -> Result<ZeroTurnOutcome, ValidationError> {
    match command {
        ZeroTurnCommand::FormFleet { house, colony, squadrons } => {
            form_fleet(state, house, colony, squadrons)
        }
        ZeroTurnCommand::AssignToFleet { house, fleet, squadrons } => {
            assign_to_fleet(state, house, fleet, squadrons)
        }
        ZeroTurnCommand::TransferSquadrons { house, from_fleet, to_fleet, squadrons } => {
            transfer_squadrons(state, house, from_fleet, to_fleet, squadrons)
        }
        ZeroTurnCommand::SplitFleet { house, fleet, squadrons } => {
            split_fleet(state, house, fleet, squadrons)
        }
        ZeroTurnCommand::MergeFleets { house, from, into } => merge_fleets(state, house, from, into),
        ZeroTurnCommand::LoadCargo { house, fleet, cargo } => load_cargo(state, house, fleet, cargo),
        ZeroTurnCommand::UnloadCargo { house, fleet } => unload_cargo(state, house, fleet),
        ZeroTurnCommand::EmbarkFighters { house, carrier, fighters } => {
            embark_fighters(state, house, carrier, fighters)
        }
        ZeroTurnCommand::DisembarkFighters { house, carrier } => {
            disembark_fighters(state, house, carrier)
        }
        ZeroTurnCommand::SetColonyTax { house, colony, rate } => {
            set_colony_tax(state, house, colony, rate)
        }
        ZeroTurnCommand::DisbandSquadron { house, squadron } => {
            disband_squadron(state, house, squadron)
        }
    }
}

/// The colony must exist and belong to the acting house.
fn friendly_colony(
    state: &GameState,
    house: HouseId,
    system: SystemId,
) -> Result<(), ValidationError> {
    let colony = state
        .colony_at(system)
        .ok_or(ValidationError::ColonyNotFound { system })?;
    if colony.owner != house {
        return Err(ValidationError::ColonyNotOwned { system, house });
    }
    Ok(())
}

/// The fleet must belong to the house and sit at one of its colonies.
fn owned_fleet_at_friendly_colony<'a>(
    state: &'a GameState,
    house: HouseId,
    fleet_id: FleetId,
) -> Result<&'a Fleet, ValidationError> {
    let fleet = state
        .fleet(fleet_id)
        .ok_or(ValidationError::FleetNotFound { fleet: fleet_id })?;
    if fleet.owner != house {
        return Err(ValidationError::FleetNotOwned { fleet: fleet_id, house });
    }
    friendly_colony(state, house, fleet.location)?;
    Ok(fleet)
}

fn form_fleet(
    state: &mut GameState,
    house: HouseId,
    colony_id: SystemId,
    squadrons: Vec<SquadronId>,
) -> Result<ZeroTurnOutcome, ValidationError> {
    if squadrons.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    friendly_colony(state, house, colony_id)?;
    {
        let colony = state.colony_at(colony_id).expect("checked above");
        for sid in &squadrons {
            if !colony.unassigned_squadrons.contains(sid) {
                return Err(ValidationError::SquadronNotAvailable { squadron: *sid });
            }
        }
    }

    let fleet_id = state.allocate_fleet_id();
    let mut fleet = Fleet::new(fleet_id, house, colony_id);
    {
        let colony = state.colony_at_mut(colony_id).expect("checked above");
        colony.unassigned_squadrons.retain(|s| !squadrons.contains(s));
    }
    fleet.squadrons = squadrons;
    state.add_fleet(fleet);

    log::debug!("house {house} formed fleet {fleet_id} at colony {colony_id}");
    Ok(ZeroTurnOutcome {
        new_fleet: Some(fleet_id),
        message: format!("fleet {fleet_id} formed"),
    })
}

fn assign_to_fleet(
    state: &mut GameState,
    house: HouseId,
    fleet_id: FleetId,
    squadrons: Vec<SquadronId>,
) -> Result<ZeroTurnOutcome, ValidationError> {
    if squadrons.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    let location = owned_fleet_at_friendly_colony(state, house, fleet_id)?.location;
    {
        let colony = state.colony_at(location).expect("validated");
        for sid in &squadrons {
            if !colony.unassigned_squadrons.contains(sid) {
                return Err(ValidationError::SquadronNotAvailable { squadron: *sid });
            }
        }
    }
    {
        let colony = state.colony_at_mut(location).expect("validated");
        colony.unassigned_squadrons.retain(|s| !squadrons.contains(s));
    }
    let fleet = state.fleet_mut(fleet_id).expect("validated");
    fleet.squadrons.extend(squadrons);
    Ok(ZeroTurnOutcome {
        new_fleet: None,
        message: format!("squadrons assigned to fleet {fleet_id}"),
    })
}

fn transfer_squadrons(
    state: &mut GameState,
    house: HouseId,
    from_id: FleetId,
    to_id: FleetId,
    squadrons: Vec<SquadronId>,
) -> Result<ZeroTurnOutcome, ValidationError> {
    if squadrons.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    let from_location = owned_fleet_at_friendly_colony(state, house, from_id)?.location;
    let to_location = owned_fleet_at_friendly_colony(state, house, to_id)?.location;
    if from_location != to_location {
        return Err(ValidationError::FleetsNotCoLocated { a: from_id, b: to_id });
    }
    {
        let from = state.fleet(from_id).expect("validated");
        for sid in &squadrons {
            if !from.squadrons.contains(sid) {
                return Err(ValidationError::SquadronNotAvailable { squadron: *sid });
            }
        }
    }
    state
        .fleet_mut(from_id)
        .expect("validated")
        .squadrons
        .retain(|s| !squadrons.contains(s));
    state
        .fleet_mut(to_id)
        .expect("validated")
        .squadrons
        .extend(squadrons);
    Ok(ZeroTurnOutcome {
        new_fleet: None,
        message: format!("squadrons moved to fleet {to_id}"),
    })
}

fn split_fleet(
    state: &mut GameState,
    house: HouseId,
    fleet_id: FleetId,
    squadrons: Vec<SquadronId>,
) -> Result<ZeroTurnOutcome, ValidationError> {
    if squadrons.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    let source = owned_fleet_at_friendly_colony(state, house, fleet_id)?;
    let location = source.location;
    for sid in &squadrons {
        if !source.squadrons.contains(sid) {
            return Err(ValidationError::SquadronNotAvailable { squadron: *sid });
        }
    }
    if squadrons.len() == source.squadrons.len() {
        return Err(ValidationError::CannotEmptyFleet { fleet: fleet_id });
    }

    let new_id = state.allocate_fleet_id();
    state
        .fleet_mut(fleet_id)
        .expect("validated")
        .squadrons
        .retain(|s| !squadrons.contains(s));
    let mut fleet = Fleet::new(new_id, house, location);
    fleet.squadrons = squadrons;
    state.add_fleet(fleet);

    Ok(ZeroTurnOutcome {
        new_fleet: Some(new_id),
        message: format!("fleet {new_id} split from {fleet_id}"),
    })
}

fn merge_fleets(
    state: &mut GameState,
    house: HouseId,
    from_id: FleetId,
    into_id: FleetId,
) -> Result<ZeroTurnOutcome, ValidationError> {
    if from_id == into_id {
        return Err(ValidationError::FleetsNotCoLocated { a: from_id, b: into_id });
    }
    let from_location = owned_fleet_at_friendly_colony(state, house, from_id)?.location;
    let into_location = owned_fleet_at_friendly_colony(state, house, into_id)?.location;
    if from_location != into_location {
        return Err(ValidationError::FleetsNotCoLocated { a: from_id, b: into_id });
    }
    let absorbed = state.remove_fleet(from_id).expect("validated");
    state
        .fleet_mut(into_id)
        .expect("validated")
        .squadrons
        .extend(absorbed.squadrons);
    Ok(ZeroTurnOutcome {
        new_fleet: None,
        message: format!("fleet {from_id} merged into {into_id}"),
    })
}

fn load_cargo(
    state: &mut GameState,
    house: HouseId,
    fleet_id: FleetId,
    cargo: Cargo,
) -> Result<ZeroTurnOutcome, ValidationError> {
    let fleet = owned_fleet_at_friendly_colony(state, house, fleet_id)?;
    let location = fleet.location;
    let units = cargo.units();
    if units == 0 {
        return Err(ValidationError::EmptySelection);
    }

    // Find a spacelift squadron with room
    let carrier_sid = fleet
        .squadrons
        .iter()
        .copied()
        .find(|sid| {
            state.squadron(*sid).is_some_and(|s| {
                s.flagship.is_spacelift()
                    && s.cargo.is_none()
                    && s.flagship.stats().cargo_hold >= units
            })
        })
        .ok_or(ValidationError::NoCargoSpace { fleet: fleet_id })?;

    // Source the cargo from the colony
    {
        let colony = state.colony_at_mut(location).expect("validated");
        match cargo {
            Cargo::Marines(n) => {
                if colony.ground_forces < n {
                    return Err(ValidationError::InsufficientCargoSource {
                        system: location,
                        requested: n,
                    });
                }
                colony.ground_forces -= n;
            }
            Cargo::Colonists(n) | Cargo::Ptu(n) => {
                let pu_cost = i64::from(n);
                if colony.population_units < pu_cost {
                    return Err(ValidationError::InsufficientCargoSource {
                        system: location,
                        requested: n,
                    });
                }
                colony.population_units -= pu_cost;
            }
        }
    }

    state.squadron_mut(carrier_sid).expect("validated").cargo = Some(cargo);
    Ok(ZeroTurnOutcome {
        new_fleet: None,
        message: format!("cargo loaded aboard fleet {fleet_id}"),
    })
}

fn unload_cargo(
    state: &mut GameState,
    house: HouseId,
    fleet_id: FleetId,
) -> Result<ZeroTurnOutcome, ValidationError> {
    let fleet = owned_fleet_at_friendly_colony(state, house, fleet_id)?;
    let location = fleet.location;
    let squadron_ids = fleet.squadrons.clone();

    let mut unloaded = false;
    for sid in squadron_ids {
        let Some(cargo) = state.squadron(sid).and_then(|s| s.cargo) else {
            continue;
        };
        {
            let colony = state.colony_at_mut(location).expect("validated");
            match cargo {
                Cargo::Marines(n) => colony.ground_forces += n,
                Cargo::Colonists(n) | Cargo::Ptu(n) => {
                    colony.population_units += i64::from(n);
                }
            }
        }
        state.squadron_mut(sid).expect("exists").cargo = None;
        unloaded = true;
    }

    if !unloaded {
        return Err(ValidationError::NoCargoAboard { fleet: fleet_id });
    }
    Ok(ZeroTurnOutcome {
        new_fleet: None,
        message: format!("cargo unloaded from fleet {fleet_id}"),
    })
}

fn embark_fighters(
    state: &mut GameState,
    house: HouseId,
    carrier_id: SquadronId,
    fighters: Vec<SquadronId>,
) -> Result<ZeroTurnOutcome, ValidationError> {
    if fighters.is_empty() {
        return Err(ValidationError::EmptySelection);
    }
    let carrier = state
        .squadron(carrier_id)
        .ok_or(ValidationError::SquadronNotFound { squadron: carrier_id })?;
    if carrier.owner != house {
        return Err(ValidationError::SquadronNotOwned { squadron: carrier_id, house });
    }
    if carrier.flagship != ShipClass::Carrier {
        return Err(ValidationError::NotACarrier { squadron: carrier_id });
    }
    if carrier.hangar_free() < fighters.len() as u32 {
        return Err(ValidationError::HangarFull { carrier: carrier_id });
    }
    let location = carrier.location;
    friendly_colony(state, house, location)?;
    {
        let colony = state.colony_at(location).expect("validated");
        for fid in &fighters {
            if !colony.fighter_squadrons.contains(fid) {
                return Err(ValidationError::SquadronNotAvailable { squadron: *fid });
            }
        }
    }

    {
        let colony = state.colony_at_mut(location).expect("validated");
        colony.fighter_squadrons.retain(|s| !fighters.contains(s));
    }
    state
        .squadron_mut(carrier_id)
        .expect("validated")
        .embarked_fighters
        .extend(fighters);
    Ok(ZeroTurnOutcome {
        new_fleet: None,
        message: format!("fighters embarked on squadron {carrier_id}"),
    })
}

fn disembark_fighters(
    state: &mut GameState,
    house: HouseId,
    carrier_id: SquadronId,
) -> Result<ZeroTurnOutcome, ValidationError> {
    let carrier = state
        .squadron(carrier_id)
        .ok_or(ValidationError::SquadronNotFound { squadron: carrier_id })?;
    if carrier.owner != house {
        return Err(ValidationError::SquadronNotOwned { squadron: carrier_id, house });
    }
    let location = carrier.location;
    friendly_colony(state, house, location)?;
    let fighters = carrier.embarked_fighters.clone();
    if fighters.is_empty() {
        return Err(ValidationError::EmptySelection);
    }

    state
        .squadron_mut(carrier_id)
        .expect("validated")
        .embarked_fighters
        .clear();
    let colony = state.colony_at_mut(location).expect("validated");
    colony.fighter_squadrons.extend(fighters);
    Ok(ZeroTurnOutcome {
        new_fleet: None,
        message: format!("fighters disembarked from squadron {carrier_id}"),
    })
}

fn set_colony_tax(
    state: &mut GameState,
    house: HouseId,
    colony_id: SystemId,
    rate: Option<u32>,
) -> Result<ZeroTurnOutcome, ValidationError> {
    if let Some(r) = rate {
        if r > 100 {
            return Err(ValidationError::InvalidTaxRate { rate: r });
        }
    }
    friendly_colony(state, house, colony_id)?;
    state.colony_at_mut(colony_id).expect("validated").tax_override = rate;
    Ok(ZeroTurnOutcome {
        new_fleet: None,
        message: format!("colony {colony_id} tax override updated"),
    })
}

fn disband_squadron(
    state: &mut GameState,
    house: HouseId,
    squadron_id: SquadronId,
) -> Result<ZeroTurnOutcome, ValidationError> {
    let squadron = state
        .squadron(squadron_id)
        .ok_or(ValidationError::SquadronNotFound { squadron: squadron_id })?;
    if squadron.owner != house {
        return Err(ValidationError::SquadronNotOwned { squadron: squadron_id, house });
    }
    if !squadron.embarked_fighters.is_empty() {
        return Err(ValidationError::HangarNotEmpty { carrier: squadron_id });
    }
    friendly_colony(state, house, squadron.location)?;
    state.remove_squadron(squadron_id);
    Ok(ZeroTurnOutcome {
        new_fleet: None,
        message: format!("squadron {squadron_id} disbanded"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{HouseId, SystemId};
    use crate::testing::GameStateBuilder;

    fn base_state() -> GameState {
        GameStateBuilder::new()
            .with_houses(2)
            .with_colony(HouseId(1), SystemId(10))
            .with_fleet(HouseId(1), SystemId(10), &[ShipClass::Transport, ShipClass::Cruiser])
            .with_unassigned_squadron(SystemId(10), ShipClass::Corvette)
            .with_unassigned_squadron(SystemId(10), ShipClass::Destroyer)
            .build()
    }

    #[test]
    fn form_fleet_mints_id_and_empties_pool() {
        let mut state = base_state();
        let pool = state.colony_at(SystemId(10)).unwrap().unassigned_squadrons.clone();
        let outcome = submit_zero_turn(
            &mut state,
            ZeroTurnCommand::FormFleet {
                house: HouseId(1),
                colony: SystemId(10),
                squadrons: pool.clone(),
            },
        )
        .unwrap();

        let new_fleet = outcome.new_fleet.unwrap();
        assert_eq!(state.fleet(new_fleet).unwrap().squadrons, pool);
        assert!(state.colony_at(SystemId(10)).unwrap().unassigned_squadrons.is_empty());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn load_cargo_draws_from_colony() {
        let mut state = base_state();
        state.colony_at_mut(SystemId(10)).unwrap().ground_forces = 8;
        let fleet = state.fleets_owned_by(HouseId(1))[0];

        submit_zero_turn(
            &mut state,
            ZeroTurnCommand::LoadCargo {
                house: HouseId(1),
                fleet,
                cargo: Cargo::Marines(5),
            },
        )
        .unwrap();

        assert_eq!(state.colony_at(SystemId(10)).unwrap().ground_forces, 3);
        let has_cargo = state.fleets[&fleet]
            .squadrons
            .iter()
            .any(|s| state.squadrons[s].cargo == Some(Cargo::Marines(5)));
        assert!(has_cargo);
    }

    #[test]
    fn load_rejects_more_than_colony_holds() {
        let mut state = base_state();
        state.colony_at_mut(SystemId(10)).unwrap().ground_forces = 2;
        let fleet = state.fleets_owned_by(HouseId(1))[0];

        let err = submit_zero_turn(
            &mut state,
            ZeroTurnCommand::LoadCargo {
                house: HouseId(1),
                fleet,
                cargo: Cargo::Marines(5),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::InsufficientCargoSource { .. }));
        // Nothing was deducted
        assert_eq!(state.colony_at(SystemId(10)).unwrap().ground_forces, 2);
    }

    #[test]
    fn wrong_owner_is_rejected() {
        let mut state = base_state();
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        let err = submit_zero_turn(
            &mut state,
            ZeroTurnCommand::UnloadCargo { house: HouseId(2), fleet },
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::FleetNotOwned { .. }));
    }

    #[test]
    fn commands_allowed_at_blockaded_colony() {
        let mut state = base_state();
        state.colony_at_mut(SystemId(10)).unwrap().blockaded = true;
        let pool = state.colony_at(SystemId(10)).unwrap().unassigned_squadrons.clone();
        let outcome = submit_zero_turn(
            &mut state,
            ZeroTurnCommand::FormFleet {
                house: HouseId(1),
                colony: SystemId(10),
                squadrons: pool,
            },
        );
        assert!(outcome.is_ok());
    }

    #[test]
    fn split_cannot_empty_the_source() {
        let mut state = base_state();
        let fleet = state.fleets_owned_by(HouseId(1))[0];
        let all = state.fleets[&fleet].squadrons.clone();
        let err = submit_zero_turn(
            &mut state,
            ZeroTurnCommand::SplitFleet {
                house: HouseId(1),
                fleet,
                squadrons: all,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::CannotEmptyFleet { .. }));
    }

    #[test]
    fn merge_moves_all_squadrons() {
        let mut state = base_state();
        let pool = state.colony_at(SystemId(10)).unwrap().unassigned_squadrons.clone();
        let formed = submit_zero_turn(
            &mut state,
            ZeroTurnCommand::FormFleet {
                house: HouseId(1),
                colony: SystemId(10),
                squadrons: pool,
            },
        )
        .unwrap()
        .new_fleet
        .unwrap();
        let original = state.fleets_owned_by(HouseId(1))[0];

        submit_zero_turn(
            &mut state,
            ZeroTurnCommand::MergeFleets {
                house: HouseId(1),
                from: formed,
                into: original,
            },
        )
        .unwrap();

        assert!(state.fleet(formed).is_none());
        assert_eq!(state.fleets[&original].squadrons.len(), 4);
        assert!(state.validate().is_ok());
    }
}
