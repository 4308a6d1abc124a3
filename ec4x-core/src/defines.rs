//! Game mechanic constants (defines).
//!
//! Every tuneable number in the engine lives here: dice tables, costs,
//! thresholds, capacity formulae, prestige source values. Engine code must
//! not carry magic numbers; it reads them from these modules or from
//! [`crate::config::GameConfig`].

/// Combat Effectiveness Rating tables.
///
/// Each combat round, both sides roll 1d10 and map the result to a damage
/// multiplier (percent) plus a possible critical flag. Criticals bypass
/// destruction protection on the damaged side.
pub mod cer {
    /// One row of a CER table: inclusive d10 range, multiplier percent,
    /// critical flag.
    #[derive(Debug, Clone, Copy)]
    pub struct CerRow {
        pub min_roll: u8,
        pub max_roll: u8,
        pub multiplier_pct: u32,
        pub critical: bool,
    }

    /// Space / orbital combat table.
    pub const SPACE: &[CerRow] = &[
        CerRow { min_roll: 1, max_roll: 1, multiplier_pct: 25, critical: false },
        CerRow { min_roll: 2, max_roll: 3, multiplier_pct: 50, critical: false },
        CerRow { min_roll: 4, max_roll: 6, multiplier_pct: 100, critical: false },
        CerRow { min_roll: 7, max_roll: 8, multiplier_pct: 150, critical: false },
        CerRow { min_roll: 9, max_roll: 9, multiplier_pct: 200, critical: false },
        CerRow { min_roll: 10, max_roll: 10, multiplier_pct: 200, critical: true },
    ];

    /// Planetary bombardment table. Flatter than space combat: ground
    /// targets don't maneuver, but dispersal caps the upside.
    pub const BOMBARDMENT: &[CerRow] = &[
        CerRow { min_roll: 1, max_roll: 2, multiplier_pct: 50, critical: false },
        CerRow { min_roll: 3, max_roll: 7, multiplier_pct: 100, critical: false },
        CerRow { min_roll: 8, max_roll: 9, multiplier_pct: 150, critical: false },
        CerRow { min_roll: 10, max_roll: 10, multiplier_pct: 150, critical: true },
    ];

    /// Ground combat (invasion) table.
    pub const GROUND: &[CerRow] = &[
        CerRow { min_roll: 1, max_roll: 1, multiplier_pct: 25, critical: false },
        CerRow { min_roll: 2, max_roll: 4, multiplier_pct: 50, critical: false },
        CerRow { min_roll: 5, max_roll: 7, multiplier_pct: 100, critical: false },
        CerRow { min_roll: 8, max_roll: 9, multiplier_pct: 150, critical: false },
        CerRow { min_roll: 10, max_roll: 10, multiplier_pct: 200, critical: true },
    ];

    /// Look up the row for a roll (tables cover 1..=10 exhaustively).
    pub fn lookup(table: &[CerRow], roll: u8) -> CerRow {
        for row in table {
            if roll >= row.min_roll && roll <= row.max_roll {
                return *row;
            }
        }
        // Unreachable for a well-formed table; treat as a neutral hit
        CerRow { min_roll: roll, max_roll: roll, multiplier_pct: 100, critical: false }
    }
}

/// Combat resolution constants outside the dice tables.
pub mod combat {
    /// Attack strength of a crippled squadron, percent of nominal.
    pub const CRIPPLED_AS_PCT: u32 = 50;

    /// Round at which the losing side may retreat.
    pub const RETREAT_ROUND: u32 = 3;

    /// Hard cap on rounds per theater before it yields.
    pub const MAX_ROUNDS: u32 = 10;

    /// Blitz attackers resolve bombardment and invasion in one turn, at a
    /// penalty to the invasion attack strength.
    pub const BLITZ_INVASION_AS_PCT: u32 = 75;

    /// Marines' attack strength per unit in ground combat.
    pub const MARINE_AS: i64 = 2;

    /// Ground battery attack strength (fires during bombardment defense).
    pub const BATTERY_AS: i64 = 4;

    /// Ground battery hits required to destroy one battery.
    pub const BATTERY_DS: i64 = 6;

    /// Hits required to remove one ground-force unit.
    pub const GROUND_FORCE_DS: i64 = 3;

    /// Hits required to destroy one industrial unit under bombardment.
    pub const IU_DS: i64 = 2;

    /// Hits required to remove one population unit under bombardment.
    pub const PU_DS: i64 = 4;

    /// Wreckage PP value, percent of the destroyed hull's build cost.
    pub const WRECKAGE_VALUE_PCT: u32 = 30;
}

/// Planetary shield generators SLD1..SLD6.
pub mod shields {
    /// Shield behavior per level: d20 roll needed to activate, and percent
    /// of conventional hits blocked when active.
    #[derive(Debug, Clone, Copy)]
    pub struct ShieldRow {
        pub activation_roll: u8,
        pub block_pct: u32,
    }

    /// Index 0 is SLD1. Level 0 means no shield.
    pub const TABLE: &[ShieldRow] = &[
        ShieldRow { activation_roll: 14, block_pct: 30 },
        ShieldRow { activation_roll: 12, block_pct: 40 },
        ShieldRow { activation_roll: 10, block_pct: 50 },
        ShieldRow { activation_roll: 8, block_pct: 60 },
        ShieldRow { activation_roll: 6, block_pct: 70 },
        ShieldRow { activation_roll: 4, block_pct: 80 },
    ];

    pub fn row(level: u8) -> Option<ShieldRow> {
        if level == 0 {
            return None;
        }
        TABLE.get(level as usize - 1).copied()
    }
}

/// Economy: production, taxation, maintenance.
pub mod economy {
    /// PP of gross output per population unit.
    pub const PU_OUTPUT: i64 = 2;

    /// PP of gross output per industrial unit.
    pub const IU_OUTPUT: i64 = 3;

    /// Gross-output multiplier percent by planet class
    /// (Eden, Lush, Benign, Harsh, Hostile, Desolate, Extreme).
    pub const PLANET_CLASS_PCT: [u32; 7] = [150, 125, 100, 80, 60, 40, 25];

    /// Industrial-output multiplier percent by raw-resource rating
    /// (VeryPoor, Poor, Abundant, Rich, VeryRich).
    pub const RESOURCE_RATING_PCT: [u32; 5] = [50, 75, 100, 125, 150];

    /// Additional gross-output percent per EL tech level.
    pub const EL_BONUS_PCT_PER_LEVEL: u32 = 5;

    /// Default colony tax rate, percent.
    pub const DEFAULT_TAX_RATE: u32 = 50;

    /// GCO reduction applied to a blockaded colony, percent.
    pub const BLOCKADE_GCO_REDUCTION_PCT: u32 = 50;

    /// Population growth per turn, PU per 10 PU held, by planet class.
    /// Extreme worlds do not grow.
    pub const GROWTH_PER_10PU: [u32; 7] = [3, 2, 2, 1, 1, 1, 0];

    /// Hard ceiling on colony PU: infrastructure level × this.
    pub const PU_PER_INFRASTRUCTURE: i64 = 50;

    /// Price of one EBP or CIP point, in PP.
    pub const ESPIONAGE_POINT_COST: i64 = 40;

    /// Espionage spend above this percent of turn income draws a prestige
    /// penalty.
    pub const ESPIONAGE_BUDGET_PCT: u32 = 5;

    /// Fresh-game homeworld seed values.
    pub const STARTING_TREASURY: i64 = 500;
    pub const STARTING_PU: i64 = 20;
    pub const STARTING_IU: i64 = 100;
    pub const STARTING_INFRASTRUCTURE: u8 = 3;
    pub const STARTING_GROUND_FORCES: u32 = 5;
}

/// Per-turn upkeep and build costs by hull class, in PP.
pub mod ships {
    use crate::fleet::ShipClass;

    /// Static stat block shared by every hull of a class.
    #[derive(Debug, Clone, Copy)]
    pub struct ShipStats {
        /// Attack strength per combat round.
        pub attack: i64,
        /// Hits absorbed before a state transition.
        pub defense: i64,
        /// Build cost in PP.
        pub build_cost: i64,
        /// Upkeep in PP per turn.
        pub maintenance: i64,
        /// Fighter squadrons carried (carriers only).
        pub hangar: u32,
        /// Cargo capacity in marine/colonist/PTU units.
        pub cargo_hold: u32,
        /// Counts against the capital-squadron limit.
        pub is_capital: bool,
        /// Unescorted spacelift hulls are destroyed when escorts are lost.
        pub is_spacelift: bool,
    }

    pub const fn stats(class: ShipClass) -> ShipStats {
        match class {
            ShipClass::Scout => ShipStats {
                attack: 1, defense: 2, build_cost: 40, maintenance: 2,
                hangar: 0, cargo_hold: 0, is_capital: false, is_spacelift: false,
            },
            ShipClass::Corvette => ShipStats {
                attack: 4, defense: 4, build_cost: 80, maintenance: 4,
                hangar: 0, cargo_hold: 0, is_capital: false, is_spacelift: false,
            },
            ShipClass::Destroyer => ShipStats {
                attack: 8, defense: 8, build_cost: 150, maintenance: 7,
                hangar: 0, cargo_hold: 0, is_capital: false, is_spacelift: false,
            },
            ShipClass::Cruiser => ShipStats {
                attack: 14, defense: 14, build_cost: 280, maintenance: 12,
                hangar: 0, cargo_hold: 0, is_capital: false, is_spacelift: false,
            },
            ShipClass::Battleship => ShipStats {
                attack: 24, defense: 24, build_cost: 500, maintenance: 20,
                hangar: 0, cargo_hold: 0, is_capital: true, is_spacelift: false,
            },
            ShipClass::Dreadnought => ShipStats {
                attack: 36, defense: 34, build_cost: 800, maintenance: 32,
                hangar: 0, cargo_hold: 0, is_capital: true, is_spacelift: false,
            },
            ShipClass::Carrier => ShipStats {
                attack: 6, defense: 18, build_cost: 450, maintenance: 18,
                hangar: 4, cargo_hold: 0, is_capital: true, is_spacelift: false,
            },
            ShipClass::Fighter => ShipStats {
                attack: 5, defense: 3, build_cost: 50, maintenance: 2,
                hangar: 0, cargo_hold: 0, is_capital: false, is_spacelift: false,
            },
            ShipClass::Transport => ShipStats {
                attack: 0, defense: 6, build_cost: 120, maintenance: 5,
                hangar: 0, cargo_hold: 10, is_capital: false, is_spacelift: true,
            },
            ShipClass::PlanetBreaker => ShipStats {
                attack: 20, defense: 20, build_cost: 1200, maintenance: 50,
                hangar: 0, cargo_hold: 0, is_capital: true, is_spacelift: false,
            },
        }
    }

    /// Additional attack percent per WEP tech level of the squadron.
    pub const WEP_BONUS_PCT_PER_LEVEL: u32 = 10;

    /// Facility upkeep per turn, PP (starbase, spaceport, shipyard).
    pub const STARBASE_MAINTENANCE: i64 = 15;
    pub const SPACEPORT_MAINTENANCE: i64 = 5;
    pub const SHIPYARD_MAINTENANCE: i64 = 8;

    /// Starbase combat block in the orbital theater.
    pub const STARBASE_AS: i64 = 20;
    pub const STARBASE_DS: i64 = 30;

    /// Repairing a crippled squadron costs this percent of build cost.
    pub const REPAIR_COST_PCT: u32 = 25;
}

/// Squadron and fighter capacity rules.
pub mod capacity {
    /// One fighter squadron allowed per this many IU.
    pub const FIGHTER_IU_DIVISOR: i64 = 100;

    /// Fighter cap multiplier percent by FD tech level (index = level,
    /// capped at the table end).
    pub const FD_MULTIPLIER_PCT: [u32; 6] = [100, 100, 150, 200, 250, 300];

    /// Turns a fighter or total-squadron violation is tolerated.
    pub const GRACE_TURNS: u32 = 2;

    /// Capital squadrons allowed: per-colony base plus CST bonus.
    pub const CAPITAL_PER_COLONY: u32 = 2;
    pub const CAPITAL_PER_CST_LEVEL: u32 = 1;

    /// Total squadrons allowed: per-colony base plus CST bonus.
    pub const TOTAL_PER_COLONY: u32 = 6;
    pub const TOTAL_PER_CST_LEVEL: u32 = 2;

    /// Planet-breakers allowed per this many colonies (minimum 1 colony).
    pub const COLONIES_PER_PLANET_BREAKER: u32 = 5;

    pub fn fd_multiplier_pct(fd_level: i32) -> u32 {
        let idx = (fd_level.max(0) as usize).min(FD_MULTIPLIER_PCT.len() - 1);
        FD_MULTIPLIER_PCT[idx]
    }

    /// Max fighter squadrons a colony may base, given IU and FD level.
    pub fn fighter_cap(iu: i64, fd_level: i32) -> u32 {
        let base = (iu / FIGHTER_IU_DIVISOR).max(0) as u32;
        base * fd_multiplier_pct(fd_level) / 100
    }
}

/// Research: PP to RP conversion and level costs.
pub mod research {
    /// Accumulated RP required to reach level N+1 from level N.
    /// Roughly ×1.5 per level.
    pub const LEVEL_COST: [i64; 20] = [
        50, 75, 113, 169, 253, 380, 570, 854, 1281, 1922,
        2883, 4325, 6487, 9731, 14596, 21894, 32841, 49262, 73893, 110839,
    ];

    /// RP per 100 PP at SL 0.
    pub const BASE_RP_PER_100PP: i64 = 100;

    /// Additional conversion percent per SL tech level.
    pub const SL_BONUS_PCT_PER_LEVEL: u32 = 10;

    /// Conversion bonus from house scale: +1% per this much GHO.
    pub const GHO_PER_BONUS_PCT: i64 = 500;

    /// A breakthrough roll fires every this many turns.
    pub const BREAKTHROUGH_INTERVAL: u32 = 5;

    /// d10 at or above this grants bonus RP in the house's top field.
    pub const BREAKTHROUGH_ROLL: u8 = 9;

    /// Bonus RP granted by a breakthrough, percent of next level cost.
    pub const BREAKTHROUGH_BONUS_PCT: u32 = 25;
}

/// Espionage, scouting, and counter-intelligence.
pub mod espionage {
    /// Detection chance percent: BASE + SHIFT×(CIC − effective ELI),
    /// clamped to [MIN, MAX]. Rolled on d100 at each traversed system
    /// owned or patrolled by another house.
    pub const DETECTION_BASE_PCT: i32 = 30;
    pub const DETECTION_SHIFT_PCT: i32 = 10;
    pub const DETECTION_MIN_PCT: i32 = 5;
    pub const DETECTION_MAX_PCT: i32 = 95;

    /// CIP points per effective point of CIC during detection checks.
    pub const CIP_PER_CIC_POINT: i64 = 10;

    /// ELI bonus by mesh count (index = scouts merged, capped).
    pub const MESH_ELI_BONUS: [i32; 6] = [0, 0, 1, 1, 2, 2];

    pub fn mesh_bonus(mesh_count: u32) -> i32 {
        let idx = (mesh_count as usize).min(MESH_ELI_BONUS.len() - 1);
        MESH_ELI_BONUS[idx]
    }

    /// Turns an EBP sabotage effect persists.
    pub const EFFECT_DURATION_TURNS: u32 = 3;

    /// Net colony value lost to an active trade-disruption effect.
    pub const TRADE_DISRUPTION_PCT: u32 = 25;

    /// Research points lost to an active research-sabotage effect.
    pub const RESEARCH_SABOTAGE_PCT: u32 = 50;

    /// EBP cost per sabotage action.
    pub const ACTION_COST_EBP: i64 = 5;

    /// Report quality lost per turn of age, percent.
    pub const QUALITY_DECAY_PCT_PER_TURN: u32 = 10;

    /// Intel corruption jitter applied when a CIC check fails, percent.
    pub const CORRUPTION_SPREAD_PCT: i64 = 40;
}

/// Prestige source values. Seizure-style events are zero-sum: the loser
/// is debited what the winner is credited.
pub mod prestige {
    pub const COLONY_ESTABLISHED: i32 = 10;
    pub const COLONY_SEIZED: i32 = 30;
    pub const COMBAT_VICTORY: i32 = 10;
    pub const HOUSE_ELIMINATED: i32 = 50;
    pub const BLOCKADED_COLONY: i32 = -2;
    pub const MAINTENANCE_SHORTFALL: i32 = -5;
    pub const SCOUT_INCIDENT: i32 = -5;
    pub const ESPIONAGE_OVERINVEST_PER_PCT: i32 = -3;
    pub const PACT_VIOLATION: i32 = -25;

    /// Tax-rate prestige per turn, by rate bracket:
    /// 0..=20, 21..=40, 41..=60, 61..=80, 81..=100.
    pub const TAX_TIER: [i32; 5] = [2, 1, 0, -2, -5];

    /// Extra penalty when the 6-turn average rate sits in the top bracket.
    pub const SUSTAINED_HIGH_TAX: i32 = -3;

    pub fn tax_tier(rate: u32) -> i32 {
        match rate {
            0..=20 => TAX_TIER[0],
            21..=40 => TAX_TIER[1],
            41..=60 => TAX_TIER[2],
            61..=80 => TAX_TIER[3],
            _ => TAX_TIER[4],
        }
    }
}

/// Diplomatic escalation and countdown timers.
pub mod diplomacy {
    /// Turns a dishonored house suffers proposal refusal.
    pub const DISHONOR_TURNS: u32 = 6;

    /// Turns of enforced isolation after a pact violation.
    pub const ISOLATION_TURNS: u32 = 10;

    /// Turns before an unanswered proposal expires.
    pub const PROPOSAL_EXPIRY_TURNS: u32 = 3;
}

/// Fleet movement.
pub mod movement {
    /// Jumps advanced per turn by every fleet.
    pub const JUMPS_PER_TURN: u32 = 1;

    /// Minimum FD tech to traverse a restricted lane (scout-only fleets
    /// are exempt).
    pub const RESTRICTED_LANE_MIN_FD: i32 = 2;
}

/// Star-map generation.
pub mod map {
    /// Ring count by player count (2..=12 players, index = players - 2).
    pub const RINGS_BY_PLAYERS: [u32; 11] = [3, 3, 4, 4, 4, 5, 5, 5, 6, 6, 6];

    /// Percent of adjacent hex pairs joined by a lane.
    pub const LANE_DENSITY_PCT: u32 = 70;

    /// Of generated lanes: percent Major; half the remainder Minor, the
    /// rest Restricted.
    pub const MAJOR_LANE_PCT: u32 = 50;

    /// Lanes guaranteed out of each homeworld.
    pub const HOMEWORLD_LANES: u32 = 3;
}

/// Colonization and terraforming.
pub mod colonization {
    /// PTU consumed to establish a colony. ACO tech discounts one PTU
    /// per this many levels, floored at MIN_PTU.
    pub const PTU_PER_COLONY: u32 = 5;
    pub const ACO_LEVELS_PER_PTU_DISCOUNT: u32 = 3;
    pub const MIN_PTU: u32 = 2;

    /// Effective PTU requirement at a given ACO level.
    pub fn ptu_required(aco_level: i32) -> u32 {
        let discount = (aco_level.max(0) as u32) / ACO_LEVELS_PER_PTU_DISCOUNT;
        PTU_PER_COLONY.saturating_sub(discount).max(MIN_PTU)
    }

    /// PU granted to a fresh colony per PTU landed.
    pub const PU_PER_PTU: i64 = 2;

    /// Starting infrastructure of a fresh colony.
    pub const INITIAL_INFRASTRUCTURE: u8 = 1;

    /// Terraforming one planet-class step: PP cost and turns, scaled by
    /// TER tech (turns reduced one per TER level, floor 2).
    pub const TERRAFORM_COST: i64 = 600;
    pub const TERRAFORM_TURNS: u32 = 8;
    pub const TERRAFORM_MIN_TURNS: u32 = 2;
}

/// Construction costs outside ship hulls.
pub mod construction {
    /// PP per industrial unit.
    pub const IU_COST: i64 = 20;

    /// PP per infrastructure level (scales with current level).
    pub const INFRASTRUCTURE_BASE_COST: i64 = 100;

    /// Facility build costs.
    pub const STARBASE_COST: i64 = 400;
    pub const SPACEPORT_COST: i64 = 150;
    pub const SHIPYARD_COST: i64 = 250;

    /// PP per ground battery.
    pub const GROUND_BATTERY_COST: i64 = 30;

    /// PP per shield-generator level. SLD tech must be at or above the
    /// target level.
    pub const SHIELD_UPGRADE_COST: i64 = 300;

    /// CST tech required to lay down a planet-breaker hull.
    pub const PLANET_BREAKER_MIN_CST: i32 = 8;

    /// Build turns for facilities and hull classes are derived from cost.
    pub const PP_PER_TURN_PER_SHIPYARD: i64 = 100;
    pub const PP_PER_TURN_BASE: i64 = 50;
}

/// Victory, collapse, and elimination.
pub mod victory {
    /// Prestige at or above this wins outright.
    pub const PRESTIGE_VICTORY: i32 = 1000;

    /// Prestige below this starts the defensive-collapse countdown.
    pub const COLLAPSE_PRESTIGE: i32 = -200;

    /// Consecutive turns below the collapse threshold before elimination.
    pub const COLLAPSE_TURNS: u32 = 3;

    /// Default turn limit (0 = unlimited).
    pub const DEFAULT_TURN_LIMIT: u32 = 200;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cer_tables_cover_every_roll() {
        for table in [cer::SPACE, cer::BOMBARDMENT, cer::GROUND] {
            for roll in 1..=10u8 {
                let row = cer::lookup(table, roll);
                assert!(row.min_roll <= roll && roll <= row.max_roll);
            }
        }
    }

    #[test]
    fn shield_levels_monotonic() {
        let mut last_block = 0;
        for level in 1..=6u8 {
            let row = shields::row(level).unwrap();
            assert!(row.block_pct > last_block);
            last_block = row.block_pct;
        }
        assert!(shields::row(0).is_none());
        assert!(shields::row(7).is_none());
    }

    #[test]
    fn fighter_cap_uses_fd_multiplier() {
        assert_eq!(capacity::fighter_cap(100, 0), 1);
        assert_eq!(capacity::fighter_cap(100, 2), 1); // 1 × 150% floors to 1
        assert_eq!(capacity::fighter_cap(200, 2), 3); // 2 × 150%
        assert_eq!(capacity::fighter_cap(0, 5), 0);
        assert_eq!(capacity::fighter_cap(-50, 3), 0);
    }

    #[test]
    fn research_costs_strictly_increase() {
        for w in research::LEVEL_COST.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn tax_tiers_cover_all_rates() {
        assert_eq!(prestige::tax_tier(0), 2);
        assert_eq!(prestige::tax_tier(50), 0);
        assert_eq!(prestige::tax_tier(100), -5);
    }
}
