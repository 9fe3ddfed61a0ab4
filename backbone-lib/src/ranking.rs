//! End-of-game ranking: higher score wins; ties broken by fewer valid moves,
//! then by fewer invalid moves; a full tie across all three is reported as
//! such rather than arbitrarily broken.

use protocol::PlayerRecord;

/// The result of ranking the active players at game end.
#[derive(Debug, PartialEq, Eq)]
pub enum RankResult {
    /// A single player strictly outranks every other.
    Winner(usize),
    /// Every player listed here is equal on score, valid moves and invalid
    /// moves; no arbitrary pick is made.
    Tie(Vec<usize>),
}

/// Ranks `players[..player_count]`. A lone surviving player is always a
/// winner, even at zero score -- "no winner" is reserved for a genuine tie
/// among two or more players, not for an empty board.
pub fn rank(players: &[PlayerRecord], player_count: usize) -> RankResult {
    let mut indices: Vec<usize> = (0..player_count).collect();
    indices.sort_by(|&a, &b| {
        players[b]
            .score
            .cmp(&players[a].score)
            .then(players[a].valid_moves.cmp(&players[b].valid_moves))
            .then(players[a].invalid_moves.cmp(&players[b].invalid_moves))
    });

    let Some(&top) = indices.first() else {
        return RankResult::Tie(Vec::new());
    };

    let tied: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|&i| {
            players[i].score == players[top].score
                && players[i].valid_moves == players[top].valid_moves
                && players[i].invalid_moves == players[top].invalid_moves
        })
        .collect();

    if tied.len() > 1 {
        RankResult::Tie(tied)
    } else {
        RankResult::Winner(top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(score: u32, valid: u32, invalid: u32) -> PlayerRecord {
        let mut p = PlayerRecord::named(0);
        p.score = score;
        p.valid_moves = valid;
        p.invalid_moves = invalid;
        p
    }

    #[test]
    fn higher_score_wins() {
        let players = vec![player(10, 5, 0), player(20, 5, 0)];
        assert_eq!(rank(&players, 2), RankResult::Winner(1));
    }

    #[test]
    fn fewer_valid_moves_breaks_score_tie() {
        let players = vec![player(10, 3, 0), player(10, 5, 0)];
        assert_eq!(rank(&players, 2), RankResult::Winner(0));
    }

    #[test]
    fn fewer_invalid_moves_breaks_remaining_tie() {
        let players = vec![player(10, 3, 4), player(10, 3, 1)];
        assert_eq!(rank(&players, 2), RankResult::Winner(1));
    }

    #[test]
    fn full_tie_is_reported() {
        let players = vec![player(10, 3, 1), player(10, 3, 1)];
        assert_eq!(rank(&players, 2), RankResult::Tie(vec![0, 1]));
    }

    #[test]
    fn lone_zero_score_survivor_still_wins() {
        let players = vec![player(0, 0, 0)];
        assert_eq!(rank(&players, 1), RankResult::Winner(0));
    }
}
