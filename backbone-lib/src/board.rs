//! The board-update rules: seeding, starting placement, move validity and
//! capture application. These are pure functions over a header and a cell
//! slice so they can be exercised without any shared memory at all.

use protocol::{starting_position, Cell, Direction, GameStateHeader, MAX_PLAYERS, REWARD_MAX, REWARD_MIN};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Fills every cell with a uniform reward in `[REWARD_MIN, REWARD_MAX]`,
/// row-major, from a seeded RNG so identical seeds reproduce identical boards.
pub fn initialize_board(board: &mut [Cell], seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for cell in board.iter_mut() {
        *cell = rng.random_range(REWARD_MIN..=REWARD_MAX);
    }
}

/// Places every configured player at its deterministic starting slot and
/// marks that cell captured. Must run after [`initialize_board`].
pub fn place_players(header: &mut GameStateHeader, board: &mut [Cell], width: u16, height: u16) {
    let player_count = header.player_count as usize;
    for i in 0..player_count.min(MAX_PLAYERS) {
        let (x, y) = starting_position(i, width, height);
        header.players[i].x = x;
        header.players[i].y = y;
        let index = protocol::cell_index(x, y, width);
        board[index] = -((i as i32) + 1);
    }
}

/// Target position for `player_index` moving `dir` from its current head.
/// `None` if the target is off-board.
fn target_position(header: &GameStateHeader, player_index: usize, dir: Direction) -> Option<(u16, u16)> {
    let (dx, dy) = dir.delta();
    let x = header.players[player_index].x as i32 + dx;
    let y = header.players[player_index].y as i32 + dy;
    if x < 0 || y < 0 || x >= header.width as i32 || y >= header.height as i32 {
        return None;
    }
    Some((x as u16, y as u16))
}

/// The target must be in-bounds and the target cell's value must still be a
/// strictly positive reward.
pub fn is_valid(header: &GameStateHeader, board: &[Cell], player_index: usize, dir: Direction) -> bool {
    match target_position(header, player_index, dir) {
        None => false,
        Some((x, y)) => board[protocol::cell_index(x, y, header.width)] > 0,
    }
}

/// Applies an already-validated move: credits the reward, marks the target
/// cell captured, moves the head, increments `valid_moves`. The previously
/// occupied cell is left untouched -- it remains owned by this player.
///
/// Returns the reward captured. Panics if the move is not valid; callers
/// must check [`is_valid`] first.
pub fn apply_move(header: &mut GameStateHeader, board: &mut [Cell], player_index: usize, dir: Direction) -> i32 {
    let (x, y) = target_position(header, player_index, dir).expect("apply_move requires a validated move");
    let index = protocol::cell_index(x, y, header.width);
    let reward = board[index];
    assert!(reward > 0, "apply_move requires a validated move");

    board[index] = -((player_index as i32) + 1);
    let player = &mut header.players[player_index];
    player.score += reward as u32;
    player.x = x;
    player.y = y;
    player.valid_moves += 1;
    reward
}

/// Whether this (non-blocked) player has at least one in-bounds, still-positive
/// neighbor to move to.
pub fn has_any_legal_move(header: &GameStateHeader, board: &[Cell], player_index: usize) -> bool {
    Direction::ALL.iter().any(|&dir| is_valid(header, board, player_index, dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::PlayerRecord;

    fn header_with_players(width: u16, height: u16, count: u32) -> GameStateHeader {
        GameStateHeader {
            width,
            height,
            player_count: count,
            players: std::array::from_fn(PlayerRecord::named),
            game_over: false,
        }
    }

    #[test]
    fn move_off_grid_edge_is_invalid() {
        let header = header_with_players(3, 3, 1);
        let board = vec![5; 9];
        // Head defaults to (0, 0); UP and LEFT both run off the grid.
        assert!(!is_valid(&header, &board, 0, Direction::Up));
        assert!(!is_valid(&header, &board, 0, Direction::Left));
        assert!(is_valid(&header, &board, 0, Direction::Right));
    }

    #[test]
    fn move_onto_owned_cell_is_invalid() {
        let mut header = header_with_players(3, 3, 2);
        let mut board = vec![5; 9];
        place_players(&mut header, &mut board, 3, 3);
        // Player 1 starts at (2, 0); player 0 at (0, 0). Neither overlaps yet,
        // but capturing player 0's own starting cell again must be rejected.
        board[protocol::cell_index(1, 0, 3)] = -1; // pretend already captured by player 0
        assert!(!is_valid(&header, &board, 0, Direction::Right));
    }

    #[test]
    fn apply_move_credits_score_and_moves_head_without_freeing_origin() {
        let mut header = header_with_players(3, 3, 1);
        let mut board = vec![7; 9];
        place_players(&mut header, &mut board, 3, 3);
        let reward = apply_move(&mut header, &mut board, 0, Direction::Right);
        assert_eq!(reward, 7);
        assert_eq!(header.players[0].score, 7);
        assert_eq!((header.players[0].x, header.players[0].y), (1, 0));
        assert_eq!(header.players[0].valid_moves, 1);
        assert_eq!(board[protocol::cell_index(1, 0, 3)], -1);
        assert_eq!(board[protocol::cell_index(0, 0, 3)], -1); // origin still owned
    }

    #[test]
    fn seeded_boards_are_reproducible() {
        let mut a = vec![0; 16];
        let mut b = vec![0; 16];
        initialize_board(&mut a, 42);
        initialize_board(&mut b, 42);
        assert_eq!(a, b);
        for v in a {
            assert!((REWARD_MIN..=REWARD_MAX).contains(&v));
        }
    }

    #[test]
    fn no_legal_move_when_surrounded() {
        let mut header = header_with_players(3, 3, 1);
        let mut board = vec![-1; 9]; // everything captured
        header.players[0].x = 1;
        header.players[0].y = 1;
        let _ = &mut board;
        assert!(!has_any_legal_move(&header, &board, 0));
    }
}
