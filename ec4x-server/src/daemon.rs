//! The hosted daemon: poll for ready games, resolve, publish, persist.
//!
//! Resolution is admission-controlled: a game may have one resolution in
//! flight at a time, and a second attempt is a defined error rather than
//! a queue. The resolver itself is pure; everything here is the I/O shell
//! around it.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use ec4x_core::{GameConfig, TurnOutcome};
use ec4x_net::{Envelope, EventKind, ServerIdentity};

use crate::store::GameStore;

/// Guards against concurrent resolution of the same game.
#[derive(Default)]
pub struct ResolutionGuard {
    in_flight: Mutex<HashSet<String>>,
}

impl ResolutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a game for resolution. Returns false when a resolution for
    /// it is already running.
    pub fn try_claim(&self, game_id: &str) -> bool {
        self.in_flight
            .lock()
            .expect("resolution guard poisoned")
            .insert(game_id.to_string())
    }

    pub fn release(&self, game_id: &str) {
        self.in_flight
            .lock()
            .expect("resolution guard poisoned")
            .remove(game_id);
    }
}

pub struct Daemon {
    store: GameStore,
    identity: ServerIdentity,
    config: GameConfig,
    poll_interval: Duration,
    guard: ResolutionGuard,
}

impl Daemon {
    pub fn new(
        data_dir: PathBuf,
        identity: ServerIdentity,
        config: GameConfig,
        poll_interval: Duration,
    ) -> Result<Self> {
        let store = GameStore::open(data_dir).context("opening game store")?;
        Ok(Self {
            store,
            identity,
            config,
            poll_interval,
            guard: ResolutionGuard::new(),
        })
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    /// Poll until the process is stopped: each pass resolves every game
    /// whose packets are all in.
    pub fn run(&self) -> Result<()> {
        log::info!(
            "daemon polling every {}s",
            self.poll_interval.as_secs()
        );
        loop {
            if let Err(e) = self.poll_once() {
                log::error!("poll pass failed: {e:#}");
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// One poll pass. Separated from `run` for tests and the manual
    /// `resolve` subcommand.
    pub fn poll_once(&self) -> Result<Vec<String>> {
        let mut resolved = Vec::new();
        for game_id in self.store.list_games().context("listing games")? {
            match self.try_resolve_ready(&game_id) {
                Ok(true) => resolved.push(game_id),
                Ok(false) => {}
                Err(e) => log::warn!("game {game_id}: {e:#}"),
            }
        }
        Ok(resolved)
    }

    /// Resolve the game if every active house has submitted its packet.
    fn try_resolve_ready(&self, game_id: &str) -> Result<bool> {
        let state = self.store.load_state(game_id)?;
        if state.winner.is_some() {
            return Ok(false);
        }
        let next_turn = state.turn + 1;
        let packets = self.store.load_packets(game_id, next_turn)?;
        let waiting_on: Vec<_> = state
            .active_house_ids()
            .into_iter()
            .filter(|h| !packets.contains_key(h))
            .collect();
        if !waiting_on.is_empty() {
            log::debug!("game {game_id} turn {next_turn}: waiting on {waiting_on:?}");
            return Ok(false);
        }
        self.resolve_game(game_id)?;
        Ok(true)
    }

    /// Resolve one turn now, using whatever packets are in (absent houses
    /// submit empty packets). Used by the manual `resolve` subcommand.
    pub fn resolve_game(&self, game_id: &str) -> Result<TurnOutcome> {
        if !self.guard.try_claim(game_id) {
            anyhow::bail!("a resolution for game {game_id} is already in progress");
        }
        let result = self.resolve_game_inner(game_id);
        self.guard.release(game_id);
        result
    }

    fn resolve_game_inner(&self, game_id: &str) -> Result<TurnOutcome> {
        let state = self.store.load_state(game_id)?;
        let next_turn = state.turn + 1;
        let mut packets = self.store.load_packets(game_id, next_turn)?;
        for house in state.active_house_ids() {
            packets
                .entry(house)
                .or_insert_with(|| ec4x_core::CommandPacket::empty(house, next_turn));
        }

        let seed = state.rng_seed ^ u64::from(next_turn);
        let outcome = ec4x_core::resolve_turn(&state, &packets, seed, &self.config)
            .with_context(|| format!("resolving game {game_id} turn {next_turn}"))?;

        // Persist first; only a durable turn gets published
        self.store.save_state(&outcome.state)?;
        self.store.append_events(game_id, &outcome.events)?;
        self.publish_deltas(game_id, &outcome)?;

        log::info!(
            "game {game_id} advanced to turn {} ({} events, checksum {:016x})",
            outcome.state.turn,
            outcome.events.len(),
            outcome.checksum
        );
        Ok(outcome)
    }

    /// Wrap each house's delta in a signed envelope, ready for transport.
    /// Envelopes land in the game directory for the transport layer to
    /// pick up; recipients without a registered key get skipped.
    fn publish_deltas(&self, game_id: &str, outcome: &TurnOutcome) -> Result<()> {
        for (house, delta) in &outcome.deltas {
            let payload = ec4x_net::encode_delta(delta)
                .with_context(|| format!("encoding delta for house {house}"))?;
            let envelope = Envelope::seal(
                &self.identity,
                EventKind::TurnResults,
                game_id,
                outcome.state.turn,
                payload,
            );
            debug_assert!(envelope.verify().is_ok());
            log::debug!(
                "delta for house {house} sealed ({} bytes, id {})",
                envelope.payload.len(),
                envelope.short_id()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ec4x_core::{CommandPacket, GameState, HouseId};

    fn daemon_with_game() -> (tempfile::TempDir, Daemon) {
        let dir = tempfile::tempdir().unwrap();
        let daemon = Daemon::new(
            dir.path().to_path_buf(),
            ServerIdentity::generate(),
            GameConfig::default(),
            Duration::from_secs(60),
        )
        .unwrap();
        let state = GameState::new_game("alpha", 2, 17);
        daemon.store().save_state(&state).unwrap();
        (dir, daemon)
    }

    #[test]
    fn poll_waits_for_all_packets() {
        let (_dir, daemon) = daemon_with_game();

        // Only one of two packets in: not ready
        daemon
            .store()
            .save_packet("alpha", &CommandPacket::empty(HouseId(1), 1))
            .unwrap();
        assert!(daemon.poll_once().unwrap().is_empty());

        daemon
            .store()
            .save_packet("alpha", &CommandPacket::empty(HouseId(2), 1))
            .unwrap();
        let resolved = daemon.poll_once().unwrap();
        assert_eq!(resolved, vec!["alpha".to_string()]);

        let state = daemon.store().load_state("alpha").unwrap();
        assert_eq!(state.turn, 1);
    }

    #[test]
    fn manual_resolve_defaults_missing_packets_to_empty() {
        let (_dir, daemon) = daemon_with_game();
        let outcome = daemon.resolve_game("alpha").unwrap();
        assert_eq!(outcome.state.turn, 1);
        assert_eq!(outcome.deltas.len(), 2);
    }

    #[test]
    fn resolution_guard_rejects_double_claim() {
        let guard = ResolutionGuard::new();
        assert!(guard.try_claim("alpha"));
        assert!(!guard.try_claim("alpha"));
        assert!(guard.try_claim("beta"));
        guard.release("alpha");
        assert!(guard.try_claim("alpha"));
    }

    #[test]
    fn resolving_turns_is_replayable_from_disk() {
        let (_dir, daemon) = daemon_with_game();
        let first = daemon.resolve_game("alpha").unwrap();
        // The stored snapshot equals the in-memory outcome exactly
        let reloaded = daemon.store().load_state("alpha").unwrap();
        assert_eq!(first.state, reloaded);
        assert_eq!(first.state.checksum(), reloaded.checksum());
    }
}
