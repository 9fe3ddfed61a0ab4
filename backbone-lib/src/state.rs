//! Typed access to the `/game_state` region.
//!
//! The board must immediately follow the fixed-size header in the same
//! mapping so a single `mmap` call exposes both. Rather than let consumers
//! compute pointer arithmetic themselves, [`StateRegion`] is the only place
//! that does so: a typed header view plus a separately-typed slice view over
//! the tail, both derived from the stored width/height.

use std::mem::size_of;

use protocol::{Cell, GameStateHeader, PlayerRecord, MAX_PLAYERS};

use crate::error::GameError;
use crate::smrm::SharedRegion;

/// The mapped `/game_state` region, typed.
pub struct StateRegion {
    region: SharedRegion,
    width: u16,
    height: u16,
}

impl StateRegion {
    /// Creates `/game_state` sized for `width * height` and `player_count`
    /// players, with a fresh header (zeroed scores, named players,
    /// un-placed). Callers still need [`crate::board::initialize_board`] and
    /// [`crate::board::place_players`] before the region is game-ready.
    pub fn create(width: u16, height: u16, player_count: u32) -> Result<StateRegion, GameError> {
        let size = protocol::state_region_size(width, height);
        let region = SharedRegion::create(protocol::SHM_GAME_STATE, size, 0o666, false, 0)?;
        let state = StateRegion { region, width, height };

        let header = state.header_mut();
        header.width = width;
        header.height = height;
        header.player_count = player_count;
        header.game_over = false;
        for i in 0..MAX_PLAYERS {
            header.players[i] = PlayerRecord::named(i);
        }

        Ok(state)
    }

    /// Opens the existing `/game_state` region, sized from the caller's own
    /// knowledge of the board dimensions (Player/View receive `W`/`H` on argv).
    pub fn open(width: u16, height: u16) -> Result<StateRegion, GameError> {
        let size = protocol::state_region_size(width, height);
        let region = SharedRegion::open(protocol::SHM_GAME_STATE, size, false)?;
        Ok(StateRegion { region, width, height })
    }

    /// Unmaps and unlinks. Master-only.
    pub fn destroy(self) -> Result<(), GameError> {
        self.region.destroy()
    }

    /// The fixed-size header. Mutation must happen only under a
    /// [`crate::sync::WriterGuard`].
    pub fn header(&self) -> &GameStateHeader {
        unsafe { &*(self.region.data() as *const GameStateHeader) }
    }

    /// Mutable access to the header. Caller is responsible for holding the
    /// writer lock (or, during single-threaded startup before any other
    /// process can observe the region, for there being no concurrent reader).
    #[allow(clippy::mut_from_ref)]
    pub fn header_mut(&self) -> &mut GameStateHeader {
        unsafe { &mut *(self.region.data() as *mut GameStateHeader) }
    }

    /// The board, `width * height` cells in row-major order.
    pub fn board(&self) -> &[Cell] {
        unsafe {
            let ptr = self.region.data().add(size_of::<GameStateHeader>()) as *const Cell;
            std::slice::from_raw_parts(ptr, self.cell_count())
        }
    }

    /// Mutable board access; same caller responsibility as [`StateRegion::header_mut`].
    #[allow(clippy::mut_from_ref)]
    pub fn board_mut(&self) -> &mut [Cell] {
        unsafe {
            let ptr = self.region.data().add(size_of::<GameStateHeader>()) as *mut Cell;
            std::slice::from_raw_parts_mut(ptr, self.cell_count())
        }
    }

    fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}
