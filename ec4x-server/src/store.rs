//! Keyed per-game storage.
//!
//! One directory per game under the data dir:
//!
//! ```text
//! <data-dir>/games/<game-id>/
//!   state.snap        current snapshot (versioned binary)
//!   events.jsonl      append-only event log
//!   commands/t<N>-h<H>.pkt   submitted packets, per turn per house
//!   invites.json      invite-code -> house mapping
//!   players.json      player-pubkey -> house mapping
//! ```
//!
//! The store knows nothing about game rules; it moves bytes and keeps the
//! directory layout honest.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ec4x_core::ids::HouseId;
use ec4x_core::input::CommandPacket;
use ec4x_core::{Event, GameState};
use ec4x_net::normalize_invite_code;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("game not found: {0}")]
    GameNotFound(String),
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("codec failure: {0}")]
    Codec(#[from] ec4x_net::CodecError),
    #[error("packet codec failure: {0}")]
    PacketCodec(#[from] bincode::Error),
    #[error("mapping file corrupt: {0}")]
    MappingCorrupt(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Handle on one data directory holding any number of games.
pub struct GameStore {
    root: PathBuf,
}

impl GameStore {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = data_dir.into();
        let games = root.join("games");
        fs::create_dir_all(&games).map_err(io_err(&games))?;
        Ok(Self { root })
    }

    fn game_dir(&self, game_id: &str) -> PathBuf {
        self.root.join("games").join(game_id)
    }

    fn commands_dir(&self, game_id: &str) -> PathBuf {
        self.game_dir(game_id).join("commands")
    }

    /// All game ids present, ascending.
    pub fn list_games(&self) -> Result<Vec<String>, StoreError> {
        let games = self.root.join("games");
        let mut out = Vec::new();
        let entries = fs::read_dir(&games).map_err(io_err(&games))?;
        for entry in entries {
            let entry = entry.map_err(io_err(&games))?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    out.push(name.to_string());
                }
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    pub fn game_exists(&self, game_id: &str) -> bool {
        self.game_dir(game_id).join("state.snap").exists()
    }

    /// Persist a game's current state snapshot.
    pub fn save_state(&self, state: &GameState) -> Result<(), StoreError> {
        let dir = self.game_dir(&state.game_id);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let bytes = ec4x_net::encode_snapshot(state)?;
        let path = dir.join("state.snap");
        // Write-then-rename: a crash never leaves a torn snapshot
        let tmp = dir.join("state.snap.tmp");
        fs::write(&tmp, &bytes).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_err(&path))?;
        Ok(())
    }

    pub fn load_state(&self, game_id: &str) -> Result<GameState, StoreError> {
        let path = self.game_dir(game_id).join("state.snap");
        if !path.exists() {
            return Err(StoreError::GameNotFound(game_id.to_string()));
        }
        let bytes = fs::read(&path).map_err(io_err(&path))?;
        Ok(ec4x_net::decode_snapshot(&bytes)?)
    }

    /// Append a turn's events to the game's JSONL log.
    pub fn append_events(&self, game_id: &str, events: &[Event]) -> Result<(), StoreError> {
        let dir = self.game_dir(game_id);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let path = dir.join("events.jsonl");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err(&path))?;
        for event in events {
            let line = serde_json::to_string(event)?;
            writeln!(file, "{line}").map_err(io_err(&path))?;
        }
        Ok(())
    }

    /// Store a submitted command packet for its turn.
    pub fn save_packet(&self, game_id: &str, packet: &CommandPacket) -> Result<(), StoreError> {
        let dir = self.commands_dir(game_id);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let path = dir.join(format!("t{}-h{}.pkt", packet.turn, packet.house));
        let bytes = bincode::serialize(packet)?;
        fs::write(&path, bytes).map_err(io_err(&path))?;
        Ok(())
    }

    /// Load every packet submitted for a turn, keyed by house.
    pub fn load_packets(
        &self,
        game_id: &str,
        turn: u32,
    ) -> Result<BTreeMap<HouseId, CommandPacket>, StoreError> {
        let dir = self.commands_dir(game_id);
        let mut out = BTreeMap::new();
        if !dir.exists() {
            return Ok(out);
        }
        let prefix = format!("t{turn}-h");
        let entries = fs::read_dir(&dir).map_err(io_err(&dir))?;
        for entry in entries {
            let entry = entry.map_err(io_err(&dir))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) || !name.ends_with(".pkt") {
                continue;
            }
            let bytes = fs::read(entry.path()).map_err(io_err(&entry.path()))?;
            let packet: CommandPacket = bincode::deserialize(&bytes)?;
            out.insert(packet.house, packet);
        }
        Ok(out)
    }

    /// Record an invite-code claim. Codes are normalized before storage
    /// and lookup.
    pub fn bind_invite(
        &self,
        game_id: &str,
        code: &str,
        house: HouseId,
    ) -> Result<(), StoreError> {
        let mut map = self.read_mapping(game_id, "invites.json")?;
        map.insert(normalize_invite_code(code), house.0);
        self.write_mapping(game_id, "invites.json", &map)
    }

    pub fn lookup_invite(&self, game_id: &str, code: &str) -> Result<Option<HouseId>, StoreError> {
        let map = self.read_mapping(game_id, "invites.json")?;
        Ok(map.get(&normalize_invite_code(code)).map(|h| HouseId(*h)))
    }

    /// Bind a player's public key (hex) to a house slot.
    pub fn bind_player(
        &self,
        game_id: &str,
        pubkey_hex: &str,
        house: HouseId,
    ) -> Result<(), StoreError> {
        let mut map = self.read_mapping(game_id, "players.json")?;
        map.insert(pubkey_hex.to_lowercase(), house.0);
        self.write_mapping(game_id, "players.json", &map)
    }

    pub fn lookup_player(
        &self,
        game_id: &str,
        pubkey_hex: &str,
    ) -> Result<Option<HouseId>, StoreError> {
        let map = self.read_mapping(game_id, "players.json")?;
        Ok(map.get(&pubkey_hex.to_lowercase()).map(|h| HouseId(*h)))
    }

    fn read_mapping(
        &self,
        game_id: &str,
        file: &str,
    ) -> Result<BTreeMap<String, u32>, StoreError> {
        let path = self.game_dir(game_id).join(file);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&path).map_err(io_err(&path))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write_mapping(
        &self,
        game_id: &str,
        file: &str,
        map: &BTreeMap<String, u32>,
    ) -> Result<(), StoreError> {
        let dir = self.game_dir(game_id);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let path = dir.join(file);
        let text = serde_json::to_string_pretty(map)?;
        fs::write(&path, text).map_err(io_err(&path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ec4x_core::ids::SystemId;
    use ec4x_core::input::{FleetCommand, FleetCommandKind};

    fn store() -> (tempfile::TempDir, GameStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = GameStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn state_round_trips_through_disk() {
        let (_dir, store) = store();
        let state = GameState::new_game("alpha", 2, 5);
        store.save_state(&state).unwrap();

        assert!(store.game_exists("alpha"));
        let loaded = store.load_state("alpha").unwrap();
        assert_eq!(state, loaded);
        assert_eq!(store.list_games().unwrap(), vec!["alpha".to_string()]);
    }

    #[test]
    fn missing_game_is_a_typed_error() {
        let (_dir, store) = store();
        assert!(matches!(
            store.load_state("nope"),
            Err(StoreError::GameNotFound(_))
        ));
    }

    #[test]
    fn packets_file_by_turn_and_house() {
        let (_dir, store) = store();
        let mut packet = CommandPacket::empty(HouseId(1), 3);
        packet.fleet_commands.push(FleetCommand {
            fleet: ec4x_core::FleetId(1),
            kind: FleetCommandKind::Move,
            target_system: Some(SystemId(5)),
            target_fleet: None,
            priority: 0,
        });
        store.save_packet("alpha", &packet).unwrap();
        store
            .save_packet("alpha", &CommandPacket::empty(HouseId(2), 3))
            .unwrap();
        store
            .save_packet("alpha", &CommandPacket::empty(HouseId(1), 4))
            .unwrap();

        let turn3 = store.load_packets("alpha", 3).unwrap();
        assert_eq!(turn3.len(), 2);
        assert_eq!(turn3[&HouseId(1)], packet);

        let turn4 = store.load_packets("alpha", 4).unwrap();
        assert_eq!(turn4.len(), 1);
    }

    #[test]
    fn events_append_as_jsonl() {
        let (dir, store) = store();
        let events = vec![
            Event::TurnResolved { turn: 1, checksum: 42 },
            Event::BlockadeLifted { turn: 1, system: SystemId(3) },
        ];
        store.append_events("alpha", &events).unwrap();
        store.append_events("alpha", &events[..1]).unwrap();

        let text =
            fs::read_to_string(dir.path().join("games/alpha/events.jsonl")).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().next().unwrap().contains("turn_resolved"));
    }

    #[test]
    fn invite_codes_normalize_on_both_sides() {
        let (_dir, store) = store();
        store.bind_invite("alpha", "AB-CD 99", HouseId(4)).unwrap();
        assert_eq!(
            store.lookup_invite("alpha", "abcd99").unwrap(),
            Some(HouseId(4))
        );
        assert_eq!(
            store.lookup_invite("alpha", " a b c d 9 9 ").unwrap(),
            Some(HouseId(4))
        );
        assert_eq!(store.lookup_invite("alpha", "other").unwrap(), None);
    }

    #[test]
    fn player_bindings_round_trip() {
        let (_dir, store) = store();
        store.bind_player("alpha", "DEADBEEF", HouseId(2)).unwrap();
        assert_eq!(
            store.lookup_player("alpha", "deadbeef").unwrap(),
            Some(HouseId(2))
        );
    }
}
