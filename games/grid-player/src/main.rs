//! Reference "silly" Player: picks a uniformly random legal direction each
//! turn, falling back to a uniformly random direction (and so an invalid
//! move) when none is legal, rather than blocking itself early.

use std::io::Write;
use std::time::Duration;

use backbone_lib::board;
use backbone_lib::state::StateRegion;
use backbone_lib::sync::{ReaderGuard, SyncRegion};
use clap::Parser;
use protocol::Direction;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "grid-player")]
struct Args {
    width: u16,
    height: u16,

    /// Seeds this player's own choice engine, for reproducible test runs.
    /// Defaults to the wall clock, same as master's board seed fallback.
    #[arg(long)]
    strategy_seed: Option<u64>,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=warn", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let seed = args.strategy_seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    });

    let state = StateRegion::open(args.width, args.height).expect("opening /game_state");
    let sync = SyncRegion::open().expect("opening /game_sync");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let my_index = locate_own_slot(&state);
    tracing::debug!(index = my_index, seed, "located own slot");
    let mut stdout = std::io::stdout();

    loop {
        sync.wait_player_ready(my_index);

        let header = state.header();
        if header.game_over || header.players[my_index].blocked {
            tracing::debug!(index = my_index, "exiting: game over or blocked");
            return;
        }

        let chosen = {
            let _reader = ReaderGuard::enter(&sync);
            let header = state.header();
            let cells = state.board();
            let legal: Vec<Direction> = Direction::ALL
                .iter()
                .copied()
                .filter(|&dir| board::is_valid(header, cells, my_index, dir))
                .collect();
            legal
                .choose(&mut rng)
                .copied()
                .unwrap_or_else(|| Direction::ALL[rng.random_range(0..Direction::ALL.len())])
        };

        tracing::debug!(index = my_index, ?chosen, "submitting move");
        if stdout.write_all(&[chosen as u8]).is_err() {
            return;
        }
        if stdout.flush().is_err() {
            return;
        }
    }
}

/// Master populates `players[i].pid` only after this process has already
/// started, so the first few lookups may legitimately miss.
fn locate_own_slot(state: &StateRegion) -> usize {
    let pid = std::process::id() as i32;
    loop {
        let header = state.header();
        if let Some(index) = (0..header.player_count as usize).find(|&i| header.players[i].pid == pid) {
            return index;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
