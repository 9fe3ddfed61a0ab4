//! Draws one snapshot: the board grid followed by a per-player scoreboard.
//! Uncaptured cells show their reward digit; captured cells show the
//! capturing player's letter (A for player 0, B for player 1, ...).

use std::io::{stdout, Write};

use crossterm::cursor::MoveTo;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};

use protocol::{Cell, GameStateHeader};

pub fn draw(header: &GameStateHeader, board: &[Cell]) -> std::io::Result<()> {
    let mut out = stdout();
    queue!(out, Clear(ClearType::All))?;

    for y in 0..header.height {
        queue!(out, MoveTo(0, y))?;
        let mut row = String::with_capacity(header.width as usize * 2);
        for x in 0..header.width {
            let index = protocol::cell_index(x, y, header.width);
            let glyph = match board[index] {
                value if value > 0 => char::from_digit(value as u32 % 10, 10).unwrap_or('?'),
                value => {
                    let player_index = (-value - 1) as usize;
                    (b'A' + (player_index % 26) as u8) as char
                }
            };
            row.push(glyph);
            row.push(' ');
        }
        queue!(out, Print(row))?;
    }

    let scoreboard_row = header.height + 1;
    for i in 0..header.player_count as usize {
        let p = &header.players[i];
        queue!(out, MoveTo(0, scoreboard_row + i as u16))?;
        queue!(
            out,
            Print(format!(
                "{}: score={} valid={} invalid={}{}",
                p.name_str(),
                p.score,
                p.valid_moves,
                p.invalid_moves,
                if p.blocked { " [blocked]" } else { "" },
            ))
        )?;
    }

    if header.game_over {
        queue!(out, MoveTo(0, scoreboard_row + header.player_count as u16 + 1))?;
        queue!(out, Print("game over"))?;
    }

    execute!(out, crossterm::cursor::MoveTo(0, 0))?;
    out.flush()
}
