//! The writer-preference readers-writers protocol, plus the per-player ready
//! tokens and the Master/View snapshot handshake.
//!
//! Every semaphore here is a `sem_t` embedded directly in the `/game_sync`
//! mapping and initialized process-shared (`sem_init(..., 1, ...)`), not a
//! separately-named `sem_open` object -- the two are different POSIX
//! mechanisms and the protocol only needs the former.

use protocol::MAX_PLAYERS;

use crate::error::GameError;
use crate::smrm::SharedRegion;

/// Raw layout of the sync region. Field order matches the role table in the
/// synchronization protocol exactly; every process computes offsets into
/// this struct the same way because they all link this crate.
#[repr(C)]
pub struct SyncLayout {
    /// Master posts one unit per fresh snapshot; View waits.
    pub master_to_view: libc::sem_t,
    /// View posts once it has finished drawing a snapshot; Master waits.
    pub view_to_master: libc::sem_t,
    /// Touch-and-release gate readers queue behind when a writer is waiting.
    pub master_mutex: libc::sem_t,
    /// The writer lock on the game state.
    pub state_mutex: libc::sem_t,
    /// Guards `reader_count`.
    pub reader_count_mutex: libc::sem_t,
    /// Number of readers currently inside the reader region.
    pub reader_count: u32,
    /// `player_ready[i]`: Master posts to grant player `i` one move.
    pub player_ready: [libc::sem_t; MAX_PLAYERS],
}

/// Retries a semaphore wait transparently across `EINTR`.
fn sem_wait_retry(sem: *mut libc::sem_t) {
    loop {
        let result = unsafe { libc::sem_wait(sem) };
        if result == 0 {
            return;
        }
        let errno = unsafe { *libc::__errno_location() };
        if errno != libc::EINTR {
            panic!("sem_wait failed with errno {errno}");
        }
    }
}

fn sem_post(sem: *mut libc::sem_t) {
    if unsafe { libc::sem_post(sem) } != 0 {
        let errno = unsafe { *libc::__errno_location() };
        panic!("sem_post failed with errno {errno}");
    }
}

/// Non-blocking wait; `true` if the token was taken, `false` if the
/// semaphore's count was already zero.
fn sem_try_wait(sem: *mut libc::sem_t) -> bool {
    loop {
        let result = unsafe { libc::sem_trywait(sem) };
        if result == 0 {
            return true;
        }
        let errno = unsafe { *libc::__errno_location() };
        if errno == libc::EINTR {
            continue;
        }
        return false;
    }
}

/// The mapped `/game_sync` region, typed.
pub struct SyncRegion {
    region: SharedRegion,
}

impl SyncRegion {
    /// Creates `/game_sync` and initializes every semaphore to its documented
    /// initial value, critically `player_ready[i] = 0` for every slot.
    pub fn create() -> Result<SyncRegion, GameError> {
        let region = SharedRegion::create(
            protocol::SHM_GAME_SYNC,
            std::mem::size_of::<SyncLayout>(),
            0o666,
            false,
            0,
        )?;
        let sync = SyncRegion { region };
        let layout = sync.layout();

        init_sem(&layout.master_to_view, 0)?;
        init_sem(&layout.view_to_master, 0)?;
        init_sem(&layout.master_mutex, 1)?;
        init_sem(&layout.state_mutex, 1)?;
        init_sem(&layout.reader_count_mutex, 1)?;
        unsafe {
            std::ptr::write(std::ptr::addr_of!(layout.reader_count) as *mut u32, 0);
        }
        for slot in layout.player_ready.iter() {
            init_sem(slot, 0)?;
        }

        Ok(sync)
    }

    /// Opens the existing `/game_sync` region (Player/View).
    pub fn open() -> Result<SyncRegion, GameError> {
        let region = SharedRegion::open(protocol::SHM_GAME_SYNC, std::mem::size_of::<SyncLayout>(), false)?;
        Ok(SyncRegion { region })
    }

    /// Destroys every semaphore and unlinks the name. Master-only, called
    /// during shutdown.
    pub fn destroy(self) -> Result<(), GameError> {
        {
            let layout = self.layout();
            unsafe {
                libc::sem_destroy(&layout.master_to_view as *const _ as *mut _);
                libc::sem_destroy(&layout.view_to_master as *const _ as *mut _);
                libc::sem_destroy(&layout.master_mutex as *const _ as *mut _);
                libc::sem_destroy(&layout.state_mutex as *const _ as *mut _);
                libc::sem_destroy(&layout.reader_count_mutex as *const _ as *mut _);
                for slot in layout.player_ready.iter() {
                    libc::sem_destroy(slot as *const _ as *mut _);
                }
            }
        }
        self.region.destroy()
    }

    fn layout(&self) -> &SyncLayout {
        unsafe { &*(self.region.data() as *const SyncLayout) }
    }

    /// Grants player `index` the right to submit exactly one move.
    pub fn post_player_ready(&self, index: usize) {
        sem_post(&self.layout().player_ready[index] as *const _ as *mut _);
    }

    /// Blocks until player `index` has a ready token, consuming it.
    pub fn wait_player_ready(&self, index: usize) {
        sem_wait_retry(&self.layout().player_ready[index] as *const _ as *mut _);
    }

    /// Non-blocking check for whether player `index` currently has an
    /// outstanding ready token, without consuming it (peeks by trying to take
    /// then immediately giving it back).
    pub fn peek_player_ready(&self, index: usize) -> bool {
        let sem = &self.layout().player_ready[index] as *const _ as *mut _;
        if sem_try_wait(sem) {
            sem_post(sem);
            true
        } else {
            false
        }
    }

    /// Posts one fresh snapshot notification to View.
    pub fn notify_view(&self) {
        sem_post(&self.layout().master_to_view as *const _ as *mut _);
    }

    /// Blocks for View's acknowledgment of the snapshot it was just notified of.
    pub fn wait_for_view_ack(&self) {
        sem_wait_retry(&self.layout().view_to_master as *const _ as *mut _);
    }

    /// View's half: block for a fresh snapshot notification.
    pub fn wait_for_notification(&self) {
        sem_wait_retry(&self.layout().master_to_view as *const _ as *mut _);
    }

    /// View's half: acknowledge having drawn the snapshot.
    pub fn acknowledge_view(&self) {
        sem_post(&self.layout().view_to_master as *const _ as *mut _);
    }
}

fn init_sem(sem: &libc::sem_t, value: u32) -> Result<(), GameError> {
    let ptr = sem as *const libc::sem_t as *mut libc::sem_t;
    if unsafe { libc::sem_init(ptr, 1, value) } == -1 {
        return Err(GameError::from_errno("sem_init", "initializing sync region semaphore", protocol::SHM_GAME_SYNC));
    }
    Ok(())
}

/// Performs the full writer-entry sequence on construction and the full
/// writer-exit sequence in `Drop`, so that an early return or `?` inside the
/// guarded region can never skip releasing `state_mutex`.
///
/// Precedes entry with the `master_mutex` touch-and-release so that readers
/// queuing on `master_mutex` see writer intent.
pub struct WriterGuard<'a> {
    sync: &'a SyncRegion,
}

impl<'a> WriterGuard<'a> {
    pub fn enter(sync: &'a SyncRegion) -> WriterGuard<'a> {
        let layout = sync.layout();
        sem_wait_retry(&layout.master_mutex as *const _ as *mut _);
        sem_post(&layout.master_mutex as *const _ as *mut _);
        sem_wait_retry(&layout.state_mutex as *const _ as *mut _);
        WriterGuard { sync }
    }
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        let layout = self.sync.layout();
        sem_post(&layout.state_mutex as *const _ as *mut _);
    }
}

/// Performs the full reader-entry sequence (the `master_mutex` handshake,
/// then the first-reader-locks-the-writer bookkeeping) on construction and
/// the mirrored exit sequence in `Drop`.
pub struct ReaderGuard<'a> {
    sync: &'a SyncRegion,
}

impl<'a> ReaderGuard<'a> {
    pub fn enter(sync: &'a SyncRegion) -> ReaderGuard<'a> {
        let layout = sync.layout();

        // Queue behind any writer that has signalled intent.
        sem_wait_retry(&layout.master_mutex as *const _ as *mut _);
        sem_post(&layout.master_mutex as *const _ as *mut _);

        sem_wait_retry(&layout.reader_count_mutex as *const _ as *mut _);
        let count_ptr = &layout.reader_count as *const u32 as *mut u32;
        let new_count = unsafe { count_ptr.read() } + 1;
        unsafe { count_ptr.write(new_count) };
        if new_count == 1 {
            sem_wait_retry(&layout.state_mutex as *const _ as *mut _);
        }
        sem_post(&layout.reader_count_mutex as *const _ as *mut _);

        ReaderGuard { sync }
    }
}

impl Drop for ReaderGuard<'_> {
    fn drop(&mut self) {
        let layout = self.sync.layout();
        sem_wait_retry(&layout.reader_count_mutex as *const _ as *mut _);
        let count_ptr = &layout.reader_count as *const u32 as *mut u32;
        let new_count = unsafe { count_ptr.read() } - 1;
        unsafe { count_ptr.write(new_count) };
        if new_count == 0 {
            sem_post(&layout.state_mutex as *const _ as *mut _);
        }
        sem_post(&layout.reader_count_mutex as *const _ as *mut _);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // `/game_sync` is a fixed POSIX name; serialize tests that create it.
    static SHM_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn reader_then_writer_leave_reader_count_at_zero() {
        let _guard = SHM_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let sync = SyncRegion::create().expect("create sync region");

        {
            let _r1 = ReaderGuard::enter(&sync);
            let _r2 = ReaderGuard::enter(&sync);
            assert_eq!(unsafe { (&sync.layout().reader_count as *const u32).read() }, 2);
        }
        assert_eq!(unsafe { (&sync.layout().reader_count as *const u32).read() }, 0);

        {
            let _w = WriterGuard::enter(&sync);
        }

        let _ = sync.destroy();
    }

    #[test]
    fn player_ready_token_is_consumed_exactly_once() {
        let _guard = SHM_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let sync = SyncRegion::create().expect("create sync region");

        assert!(!sync.peek_player_ready(0));
        sync.post_player_ready(0);
        assert!(sync.peek_player_ready(0));
        sync.wait_player_ready(0);
        assert!(!sync.peek_player_ready(0));

        let _ = sync.destroy();
    }
}
