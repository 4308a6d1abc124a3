use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ec4x_core::GameConfig;
use ec4x_server::{load_identity, Daemon, GameStore};

#[derive(Parser)]
#[command(name = "ec4x-server", about = "EC4X hosted game daemon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon: poll for submitted packets and resolve turns.
    Start {
        /// Data directory holding games and the server identity.
        #[arg(long)]
        data_dir: PathBuf,
        /// Seconds between poll passes.
        #[arg(long, default_value_t = 60)]
        poll_interval: u64,
        /// Optional game-config override file (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Resolve one game's next turn immediately, with whatever packets
    /// are in.
    Resolve {
        game_id: String,
        #[arg(long)]
        data_dir: PathBuf,
    },
    /// List games in the data directory with their turn and phase.
    Status {
        #[arg(long)]
        data_dir: PathBuf,
    },
    /// Print the version and exit.
    Version,
}

fn load_config(path: Option<&PathBuf>) -> Result<GameConfig> {
    let Some(path) = path else {
        return Ok(GameConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: GameConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    config.validate().context("config rejected")?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Start {
            data_dir,
            poll_interval,
            config,
        } => {
            let identity = load_identity(&data_dir)?;
            let config = load_config(config.as_ref())?;
            let daemon = Daemon::new(
                data_dir,
                identity,
                config,
                Duration::from_secs(poll_interval.max(1)),
            )?;
            daemon.run()
        }
        Command::Resolve { game_id, data_dir } => {
            let identity = load_identity(&data_dir)?;
            let daemon = Daemon::new(
                data_dir,
                identity,
                GameConfig::default(),
                Duration::from_secs(60),
            )?;
            let outcome = daemon.resolve_game(&game_id)?;
            println!(
                "game {game_id} resolved to turn {} ({} events)",
                outcome.state.turn,
                outcome.events.len()
            );
            Ok(())
        }
        Command::Status { data_dir } => {
            let store = GameStore::open(data_dir)?;
            let games = store.list_games()?;
            if games.is_empty() {
                println!("no games");
                return Ok(());
            }
            for game_id in games {
                match store.load_state(&game_id) {
                    Ok(state) => {
                        let standing = state.active_house_ids().len();
                        let status = match state.winner {
                            Some(winner) => format!("won by house {winner}"),
                            None => format!("{standing} houses standing"),
                        };
                        println!(
                            "{game_id}: turn {} ({:?} phase), {status}",
                            state.turn, state.phase
                        );
                    }
                    Err(e) => println!("{game_id}: unreadable ({e})"),
                }
            }
            Ok(())
        }
        Command::Version => {
            println!("ec4x-server {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn main() {
    // Local .env is a convenience for development setups
    let _ = dotenvy::dotenv();
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
