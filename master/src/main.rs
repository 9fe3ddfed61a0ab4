mod children;
mod config;
mod dispatch;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use backbone_lib::board;
use backbone_lib::state::StateRegion;
use backbone_lib::sync::SyncRegion;
use backbone_lib::timer::InactivityClock;
use backbone_lib::{ranking, GameError};

use crate::children::{reap_all, spawn_players, spawn_view, ViewHandle};
use crate::config::MasterConfig;

/// How the run ended, so `main` can pick the right process exit code.
enum ShutdownReason {
    /// The dispatch loop terminated the game on its own (§4.6).
    Completed,
    /// `SIGINT` arrived; cleanup ran the same as a completed game, but the
    /// process must still report non-zero (§4.7).
    Interrupted,
    /// `SIGTERM` arrived; see `Interrupted`.
    Terminated,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_file(true).with_line_number(true).with_target(true))
        .init();

    let config = MasterConfig::parse();
    let player_paths = config.player_paths();
    if player_paths.is_empty() {
        tracing::error!("at least one player must be specified");
        return ExitCode::FAILURE;
    }

    match run(config, player_paths).await {
        Ok(ShutdownReason::Completed) => ExitCode::SUCCESS,
        // Conventional shell exit codes for a signal-terminated process (128 + signal number).
        Ok(ShutdownReason::Interrupted) => ExitCode::from(130),
        Ok(ShutdownReason::Terminated) => ExitCode::from(143),
        Err(err) => {
            tracing::error!(?err, "master exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: MasterConfig, player_paths: Vec<String>) -> Result<ShutdownReason, GameError> {
    let player_count = player_paths.len() as u32;
    let seed = config.seed_value();
    let delay = Duration::from_millis(config.delay_ms);

    // A name from a previous, uncleanly-terminated run is a recovery
    // concern, not a fatal condition: best-effort destroy before creating.
    let _ = StateRegion::open(config.width, config.height).map(|r| r.destroy());
    let _ = SyncRegion::open().map(|r| r.destroy());

    let state = StateRegion::create(config.width, config.height, player_count)?;
    {
        let header = state.header_mut();
        let board = state.board_mut();
        board::initialize_board(board, seed);
        board::place_players(header, board, config.width, config.height);
    }

    let sync = match SyncRegion::create() {
        Ok(sync) => sync,
        Err(err) => {
            let _ = state.destroy();
            return Err(err);
        }
    };

    let mut view = match spawn_view(&config.view_path, config.width, config.height) {
        Ok(view) => view,
        Err(io_err) => {
            let _ = state.destroy();
            let _ = sync.destroy();
            return Err(spawn_error("spawning view", io_err));
        }
    };
    let has_view = view.is_some();
    if has_view {
        sync.notify_view();
        sync.wait_for_view_ack();
    }

    let mut players = match spawn_players(&player_paths, config.width, config.height) {
        Ok(players) => players,
        Err(io_err) => {
            kill_view(&mut view).await;
            let _ = state.destroy();
            let _ = sync.destroy();
            return Err(spawn_error("spawning players", io_err));
        }
    };
    for handle in &players {
        state.header_mut().players[handle.index].pid = handle.child.id().unwrap_or(0) as i32;
    }
    for handle in &players {
        sync.post_player_ready(handle.index);
    }

    let mut clock = InactivityClock::new(Duration::from_secs(config.timeout_sec));

    let mut signal_terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("installing SIGTERM handler");

    let mut reason = ShutdownReason::Completed;
    tokio::select! {
        _ = dispatch::run(&state, &sync, &mut players, has_view, delay, &mut clock) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("received SIGINT, shutting down");
            reason = ShutdownReason::Interrupted;
        }
        _ = signal_terminate.recv() => {
            tracing::warn!("received SIGTERM, shutting down");
            reason = ShutdownReason::Terminated;
        }
    }

    reap_all(&mut players, &mut view).await;
    print_results(&state);

    state.destroy()?;
    sync.destroy()?;
    Ok(reason)
}

fn spawn_error(context: &str, io_err: std::io::Error) -> GameError {
    GameError::ResourceCreation {
        syscall: "fork/exec",
        errno: io_err.raw_os_error().unwrap_or(0),
        context: context.to_string(),
    }
}

/// Best-effort kill-and-reap of an already-spawned View, used on a startup
/// failure path where the game never actually begins.
async fn kill_view(view: &mut Option<ViewHandle>) {
    if let Some(handle) = view.as_mut() {
        let _ = handle.child.kill().await;
        let _ = handle.child.wait().await;
    }
}

fn print_results(state: &StateRegion) {
    let header = state.header();
    let count = header.player_count as usize;
    for i in 0..count {
        let p = &header.players[i];
        tracing::info!(
            player = p.name_str(),
            score = p.score,
            valid_moves = p.valid_moves,
            invalid_moves = p.invalid_moves,
            blocked = p.blocked,
            "final standing"
        );
    }

    match ranking::rank(&header.players, count) {
        ranking::RankResult::Winner(index) => {
            tracing::info!(winner = header.players[index].name_str(), score = header.players[index].score, "game over");
        }
        ranking::RankResult::Tie(indices) => {
            let names: Vec<String> = indices.iter().map(|&i| header.players[i].name_str()).collect();
            tracing::info!(tied = ?names, "game over: tie");
        }
    }
}
