//! Master's command-line configuration.
//!
//! Player executable paths may be given either as repeated `-p`/`--player`
//! flags or as trailing positional arguments (or both, concatenated) --
//! mirroring the two equally-supported forms of the original engine this
//! one replaces.

use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use protocol::MAX_PLAYERS;

#[derive(Parser, Debug)]
#[command(name = "master", about = "Coordinates a grid-capture match between player processes.")]
pub struct MasterConfig {
    /// Board width.
    #[arg(short = 'w', long, default_value_t = 10)]
    pub width: u16,

    /// Board height.
    #[arg(short = 'h', long, default_value_t = 10)]
    pub height: u16,

    /// Pacing delay and select timeout, in milliseconds.
    #[arg(short = 'd', long, default_value_t = 200)]
    pub delay_ms: u64,

    /// Inactivity timeout, in seconds: the game ends if no move is accepted for this long.
    #[arg(short = 't', long, default_value_t = 10)]
    pub timeout_sec: u64,

    /// Board RNG seed. Defaults to the wall clock.
    #[arg(short = 's', long)]
    pub seed: Option<u64>,

    /// Path to the View executable. Omit to run without a renderer.
    #[arg(short = 'v', long)]
    pub view_path: Option<String>,

    /// Player executable path, repeatable.
    #[arg(short = 'p', long = "player")]
    pub player_flags: Vec<String>,

    /// Player executable paths given positionally after the flags.
    #[arg(trailing_var_arg = true)]
    pub player_positional: Vec<String>,
}

impl MasterConfig {
    /// The effective, order-preserving list of player paths from `-p` flags
    /// followed by trailing positionals, truncated to [`MAX_PLAYERS`].
    pub fn player_paths(&self) -> Vec<String> {
        self.player_flags
            .iter()
            .chain(self.player_positional.iter())
            .take(MAX_PLAYERS)
            .cloned()
            .collect()
    }

    /// The seed to use: the configured value, or the current wall clock.
    pub fn seed_value(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        })
    }
}
