//! Phase subsystems invoked by the turn resolver.

pub mod colonization;
pub mod combat;
pub mod economy;
pub mod espionage;
pub mod maintenance;
pub mod movement;
pub mod research;
pub mod standing_orders;
pub mod victory;
