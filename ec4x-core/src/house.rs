//! Player houses: treasury, prestige, technology, espionage budget.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::bounded::{new_prestige, new_tech_level, BoundedInt};
use crate::defines::economy;
use crate::ids::{HouseId, SystemId};
use crate::intel::IntelDatabase;

/// The eleven research fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TechField {
    /// Construction: squadron limits.
    Cst,
    /// Weapons: squadron attack strength.
    Wep,
    /// Economic level: colony output.
    El,
    /// Science level: research conversion efficiency.
    Sl,
    /// Terraforming.
    Ter,
    /// Electronic intelligence: scout strength.
    Eli,
    /// Cloaking.
    Clk,
    /// Shields.
    Sld,
    /// Counter-intelligence.
    Cic,
    /// Fighter doctrine: fighter capacity, lane clearance.
    Fd,
    /// Advanced colonization.
    Aco,
}

impl TechField {
    pub const ALL: [TechField; 11] = [
        TechField::Cst,
        TechField::Wep,
        TechField::El,
        TechField::Sl,
        TechField::Ter,
        TechField::Eli,
        TechField::Clk,
        TechField::Sld,
        TechField::Cic,
        TechField::Fd,
        TechField::Aco,
    ];
}

impl std::fmt::Display for TechField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TechField::Cst => "CST",
            TechField::Wep => "WEP",
            TechField::El => "EL",
            TechField::Sl => "SL",
            TechField::Ter => "TER",
            TechField::Eli => "ELI",
            TechField::Clk => "CLK",
            TechField::Sld => "SLD",
            TechField::Cic => "CIC",
            TechField::Fd => "FD",
            TechField::Aco => "ACO",
        };
        f.write_str(s)
    }
}

/// Per-field tech levels, each clamped to 0..=20.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechLevels {
    cst: BoundedInt,
    wep: BoundedInt,
    el: BoundedInt,
    sl: BoundedInt,
    ter: BoundedInt,
    eli: BoundedInt,
    clk: BoundedInt,
    sld: BoundedInt,
    cic: BoundedInt,
    fd: BoundedInt,
    aco: BoundedInt,
}

impl Default for TechLevels {
    fn default() -> Self {
        Self {
            cst: new_tech_level(),
            wep: new_tech_level(),
            el: new_tech_level(),
            sl: new_tech_level(),
            ter: new_tech_level(),
            eli: new_tech_level(),
            clk: new_tech_level(),
            sld: new_tech_level(),
            cic: new_tech_level(),
            fd: new_tech_level(),
            aco: new_tech_level(),
        }
    }
}

impl TechLevels {
    fn slot(&self, field: TechField) -> &BoundedInt {
        match field {
            TechField::Cst => &self.cst,
            TechField::Wep => &self.wep,
            TechField::El => &self.el,
            TechField::Sl => &self.sl,
            TechField::Ter => &self.ter,
            TechField::Eli => &self.eli,
            TechField::Clk => &self.clk,
            TechField::Sld => &self.sld,
            TechField::Cic => &self.cic,
            TechField::Fd => &self.fd,
            TechField::Aco => &self.aco,
        }
    }

    fn slot_mut(&mut self, field: TechField) -> &mut BoundedInt {
        match field {
            TechField::Cst => &mut self.cst,
            TechField::Wep => &mut self.wep,
            TechField::El => &mut self.el,
            TechField::Sl => &mut self.sl,
            TechField::Ter => &mut self.ter,
            TechField::Eli => &mut self.eli,
            TechField::Clk => &mut self.clk,
            TechField::Sld => &mut self.sld,
            TechField::Cic => &mut self.cic,
            TechField::Fd => &mut self.fd,
            TechField::Aco => &mut self.aco,
        }
    }

    pub fn get(&self, field: TechField) -> i32 {
        self.slot(field).get()
    }

    pub fn set(&mut self, field: TechField, level: i32) {
        self.slot_mut(field).set(level);
    }

    /// Raise a field one level. Returns the new level, or `None` at cap.
    pub fn raise(&mut self, field: TechField) -> Option<i32> {
        let slot = self.slot_mut(field);
        if slot.is_at_max() {
            return None;
        }
        slot.add(1);
        Some(slot.get())
    }
}

/// Tax policy: current rate plus the trailing six turns of history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    /// House-wide rate percent; colonies may override individually.
    pub rate: u32,
    /// Most recent first, at most six entries.
    pub history: VecDeque<u32>,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self {
            rate: economy::DEFAULT_TAX_RATE,
            history: VecDeque::new(),
        }
    }
}

impl TaxPolicy {
    pub const HISTORY_LEN: usize = 6;

    /// Record this turn's rate, dropping the oldest past six.
    pub fn rotate(&mut self) {
        self.history.push_front(self.rate);
        while self.history.len() > Self::HISTORY_LEN {
            self.history.pop_back();
        }
    }

    /// Trailing average over the recorded history (current rate if none).
    pub fn trailing_average(&self) -> u32 {
        if self.history.is_empty() {
            return self.rate;
        }
        let sum: u32 = self.history.iter().sum();
        sum / self.history.len() as u32
    }
}

/// House life-cycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HouseStatus {
    #[default]
    Active,
    /// Prestige has collapsed; the house is on the elimination countdown.
    DefensiveCollapse,
    Eliminated,
}

/// A player house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct House {
    pub id: HouseId,
    pub name: String,
    /// Display color, 0xRRGGBB.
    pub color: u32,
    /// Treasury in PP. May go negative during a controlled-debt
    /// transition, floored at -10000 by the economy engine.
    pub treasury: i64,
    pub prestige: BoundedInt,
    /// Consecutive turns spent below the collapse threshold.
    pub collapse_turns: u32,
    pub tax_policy: TaxPolicy,
    pub tech: TechLevels,
    /// Accumulated research points per field, spent on level-ups.
    pub research_points: std::collections::BTreeMap<TechField, i64>,
    /// Espionage budget points.
    pub ebp: i64,
    /// Counter-intelligence points.
    pub cip: i64,
    pub intel: IntelDatabase,
    pub eliminated: bool,
    pub status: HouseStatus,
    /// Homeworld system, kept for reinforcement and retreat heuristics.
    pub homeworld: SystemId,
    /// House-wide total-squadron violation awaiting enforcement.
    pub squadron_violation: Option<crate::colony::CapacityViolation>,
}

impl House {
    pub fn new(id: HouseId, name: impl Into<String>, color: u32, homeworld: SystemId) -> Self {
        Self {
            id,
            name: name.into(),
            color,
            treasury: 0,
            prestige: new_prestige(),
            collapse_turns: 0,
            tax_policy: TaxPolicy::default(),
            tech: TechLevels::default(),
            research_points: std::collections::BTreeMap::new(),
            ebp: 0,
            cip: 0,
            intel: IntelDatabase::default(),
            eliminated: false,
            status: HouseStatus::Active,
            homeworld,
            squadron_violation: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.eliminated
    }

    /// Mark the house eliminated. Colonies and fleets are torn down by
    /// the caller, which also emits the elimination event.
    pub fn eliminate(&mut self) {
        self.eliminated = true;
        self.status = HouseStatus::Eliminated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tech_levels_start_at_zero_and_cap_at_twenty() {
        let mut tech = TechLevels::default();
        for field in TechField::ALL {
            assert_eq!(tech.get(field), 0);
        }
        for _ in 0..25 {
            tech.raise(TechField::Wep);
        }
        assert_eq!(tech.get(TechField::Wep), 20);
        assert_eq!(tech.raise(TechField::Wep), None);
    }

    #[test]
    fn tax_history_keeps_six_turns() {
        let mut policy = TaxPolicy::default();
        for rate in [10, 20, 30, 40, 50, 60, 70] {
            policy.rate = rate;
            policy.rotate();
        }
        assert_eq!(policy.history.len(), TaxPolicy::HISTORY_LEN);
        // Oldest (10) dropped
        assert_eq!(policy.trailing_average(), (20 + 30 + 40 + 50 + 60 + 70) / 6);
    }

    #[test]
    fn elimination_flips_both_markers() {
        let mut h = House::new(HouseId(1), "Atreides", 0x2266aa, SystemId(4));
        assert!(h.is_active());
        h.eliminate();
        assert!(!h.is_active());
        assert_eq!(h.status, HouseStatus::Eliminated);
    }
}
