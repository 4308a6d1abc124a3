//! # EC4X Server
//!
//! The hosted daemon around the engine: a keyed per-game store, a poll
//! loop that resolves turns when command packets are in, and the server
//! identity keypair. All I/O lives here; the resolver itself is pure and
//! is never invoked twice concurrently for the same game.

pub mod daemon;
pub mod identity;
pub mod store;

pub use daemon::{Daemon, ResolutionGuard};
pub use identity::load_identity;
pub use store::{GameStore, StoreError};
