//! The event-driven dispatch loop: readiness multiplexing over every open
//! player pipe, at-most-one-outstanding move enforcement via ready tokens,
//! move validation/application, the view snapshot handshake, and
//! termination detection.

use std::time::Duration;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::io::AsyncReadExt;

use backbone_lib::board;
use backbone_lib::state::StateRegion;
use backbone_lib::sync::{SyncRegion, WriterGuard};
use backbone_lib::timer::InactivityClock;
use protocol::Direction;

use crate::children::PlayerHandle;

/// Runs the dispatch loop to completion (termination detected), mutating
/// `state` under the writer lock for every accepted byte and driving the
/// view handshake if `has_view` is set.
pub async fn run(
    state: &StateRegion,
    sync: &SyncRegion,
    players: &mut [PlayerHandle],
    has_view: bool,
    delay: Duration,
    clock: &mut InactivityClock,
) {
    loop {
        let active: Vec<usize> = players
            .iter()
            .filter(|p| p.stdout.is_some() && !state.header().players[p.index].blocked)
            .map(|p| p.index)
            .collect();

        if active.is_empty() {
            tracing::info!("no open, unblocked player pipes remain");
            break;
        }

        let outcome = {
            let mut readiness = FuturesUnordered::new();
            for &i in &active {
                let stdout = players[i].stdout.as_ref().expect("index came from active set");
                readiness.push(async move { (i, stdout.readable().await) });
            }
            tokio::time::timeout(delay, readiness.next()).await
        };

        match outcome {
            Err(_elapsed) => {
                // No pipe became ready within the delay window; fall through
                // to the termination check below.
            }
            Ok(None) => unreachable!("active set is non-empty"),
            Ok(Some((index, Ok(())))) => {
                handle_ready_pipe(state, sync, players, index, has_view, delay, clock).await;
            }
            Ok(Some((index, Err(err)))) => {
                tracing::warn!(index, ?err, "error polling player pipe readiness");
                mark_blocked(state, players, index);
            }
        }

        if is_terminated(state, clock) {
            break;
        }
    }

    state.header_mut().game_over = true;
    if has_view {
        sync.notify_view();
        sync.wait_for_view_ack();
    }
}

async fn handle_ready_pipe(
    state: &StateRegion,
    sync: &SyncRegion,
    players: &mut [PlayerHandle],
    index: usize,
    has_view: bool,
    delay: Duration,
    clock: &mut InactivityClock,
) {
    let mut byte = [0u8; 1];
    let read_result = players[index]
        .stdout
        .as_mut()
        .expect("handle_ready_pipe only called for an open pipe")
        .read(&mut byte)
        .await;

    match read_result {
        Ok(0) => {
            tracing::info!(index, "player pipe closed (EOF)");
            mark_blocked(state, players, index);
        }
        Ok(_) => {
            apply_byte(state, sync, index, byte[0], clock);
            if has_view {
                sync.notify_view();
                sync.wait_for_view_ack();
            }
            if sync.peek_player_ready(index) {
                tracing::warn!(index, "at-most-one-outstanding violated: token still present before re-arm");
            }
            sync.post_player_ready(index);
            tokio::time::sleep(delay).await;
        }
        Err(err) => {
            tracing::warn!(index, ?err, "read error on player pipe");
            mark_blocked(state, players, index);
        }
    }
}

fn apply_byte(state: &StateRegion, sync: &SyncRegion, index: usize, byte: u8, clock: &mut InactivityClock) {
    let _guard = WriterGuard::enter(sync);
    let header = state.header_mut();
    let board = state.board_mut();

    match Direction::from_move_byte(byte) {
        Some(dir) if board::is_valid(header, board, index, dir) => {
            board::apply_move(header, board, index, dir);
            clock.record_valid_move();
            tracing::debug!(index, ?dir, "accepted move");
        }
        _ => {
            header.players[index].invalid_moves += 1;
            tracing::debug!(index, byte, "rejected move");
        }
    }
}

fn mark_blocked(state: &StateRegion, players: &mut [PlayerHandle], index: usize) {
    players[index].stdout = None;
    state.header_mut().players[index].blocked = true;
}

fn is_terminated(state: &StateRegion, clock: &InactivityClock) -> bool {
    let header = state.header();
    let board = state.board();

    if clock.expired() {
        tracing::info!("inactivity timeout reached");
        return true;
    }

    let non_blocked: Vec<usize> = (0..header.player_count as usize)
        .filter(|&i| !header.players[i].blocked)
        .collect();

    if non_blocked.is_empty() {
        tracing::info!("every player is blocked");
        return true;
    }

    if non_blocked
        .iter()
        .all(|&i| !board::has_any_legal_move(header, board, i))
    {
        tracing::info!("no non-blocked player has any legal move");
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // `/game_state` and `/game_sync` are fixed POSIX names; serialize tests
    // that create them so parallel test threads don't collide on EEXIST.
    static SHM_GUARD: Mutex<()> = Mutex::new(());

    fn with_regions<F: FnOnce(&StateRegion, &SyncRegion)>(width: u16, height: u16, player_count: u32, f: F) {
        let _guard = SHM_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let state = StateRegion::create(width, height, player_count).expect("create state region");
        let sync = SyncRegion::create().expect("create sync region");
        board::initialize_board(state.board_mut(), 7);
        board::place_players(state.header_mut(), state.board_mut(), width, height);
        f(&state, &sync);
        let _ = state.destroy();
        let _ = sync.destroy();
    }

    #[test]
    fn not_terminated_fresh_game_with_legal_moves() {
        with_regions(5, 5, 1, |state, _sync| {
            let clock = InactivityClock::new(Duration::from_secs(10));
            assert!(!is_terminated(state, &clock));
        });
    }

    #[test]
    fn terminated_once_inactivity_timeout_elapses() {
        with_regions(5, 5, 1, |state, _sync| {
            let clock = InactivityClock::new(Duration::from_secs(0));
            assert!(is_terminated(state, &clock));
        });
    }

    #[test]
    fn terminated_when_every_player_is_blocked() {
        with_regions(3, 3, 2, |state, _sync| {
            let clock = InactivityClock::new(Duration::from_secs(10));
            state.header_mut().players[0].blocked = true;
            state.header_mut().players[1].blocked = true;
            assert!(is_terminated(state, &clock));
        });
    }

    #[test]
    fn apply_byte_accepts_a_valid_direction_and_resets_clock() {
        with_regions(3, 3, 1, |state, sync| {
            let mut clock = InactivityClock::new(Duration::from_secs(10));
            // Player 0 starts at (0, 0); RIGHT (code 2) is always in-bounds on a 3x3 board.
            apply_byte(state, sync, 0, 2, &mut clock);
            assert_eq!(state.header().players[0].valid_moves, 1);
            assert_eq!(state.header().players[0].invalid_moves, 0);
        });
    }

    #[test]
    fn apply_byte_counts_an_out_of_range_code_as_invalid() {
        with_regions(3, 3, 1, |state, sync| {
            let mut clock = InactivityClock::new(Duration::from_secs(10));
            apply_byte(state, sync, 0, 255, &mut clock);
            assert_eq!(state.header().players[0].invalid_moves, 1);
            assert_eq!(state.header().players[0].valid_moves, 0);
        });
    }

    #[tokio::test]
    async fn mark_blocked_closes_the_pipe_and_sets_the_flag() {
        with_regions(3, 3, 1, |state, _sync| {
            let mut players = vec![PlayerHandle {
                index: 0,
                child: tokio::process::Command::new("true")
                    .spawn()
                    .expect("spawning a throwaway child for a test fixture"),
                stdout: None,
            }];
            mark_blocked(state, &mut players, 0);
            assert!(state.header().players[0].blocked);
        });
    }
}
