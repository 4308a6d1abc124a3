//! Typed opaque identifiers for every entity kind.
//!
//! IDs are process-wide unique and never reused across deletions within a
//! game. Components refer to other entities by ID only; the `GameState`
//! container owns the entities themselves.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(
    /// A player house.
    HouseId
);
define_id!(
    /// A star system (hex on the map).
    SystemId
);
define_id!(
    /// A fleet of squadrons.
    FleetId
);
define_id!(
    /// A squadron (flagship + stats block).
    SquadronId
);
define_id!(
    /// An individual hull, used by construction tracking.
    ShipId
);
define_id!(
    /// A colony facility (starbase, spaceport, shipyard).
    FacilityId
);
define_id!(
    /// A detached scout mission.
    SpyScoutId
);

/// Colonies are keyed by the system they occupy (1:1 while they exist).
pub type ColonyId = SystemId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_by_raw_value() {
        let mut v = vec![FleetId(3), FleetId(1), FleetId(2)];
        v.sort();
        assert_eq!(v, vec![FleetId(1), FleetId(2), FleetId(3)]);
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&SystemId(42)).unwrap();
        assert_eq!(json, "42");
        let back: SystemId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SystemId(42));
    }
}
