//! Shared-Memory Region Manager: creates, opens, maps and destroys named
//! POSIX shared memory objects with a uniform `[optional sem_t][data bytes]`
//! layout.
//!
//! Both regions this crate actually uses (`/game_state`, `/game_sync`) are
//! created with `with_front_sem = false`; the front-semaphore slot exists so
//! the manager matches the general contract its prior art specifies, not
//! because the core protocol needs it.

use std::ffi::CString;
use std::mem::size_of;
use std::ptr;

use crate::error::GameError;

/// A mapped, named shared memory object.
///
/// Dropping a region unmaps it but never unlinks the POSIX name; only
/// [`SharedRegion::destroy`] unlinks. This means a region a process merely
/// `open`s (Player, View) is safe to simply drop, and a Master that panics
/// mid-run does not leak its own mapping even though the name survives for
/// crash-recovery inspection.
pub struct SharedRegion {
    name: String,
    fd: i32,
    /// Length of the whole mmap, including the optional front semaphore.
    map_len: usize,
    /// Size of the caller's data region, excluding the front semaphore.
    data_size: usize,
    base: *mut u8,
    has_front_sem: bool,
}

// The mapping is process-shared by construction; sharing the handle across
// threads within one process is the caller's concern, not this type's.
unsafe impl Send for SharedRegion {}

impl SharedRegion {
    const FRONT_SEM_SIZE: usize = size_of::<libc::sem_t>();

    /// Creates and sizes the object, maps it read/write, and optionally
    /// initializes a process-shared semaphore at offset 0.
    pub fn create(
        name: &str,
        data_size: usize,
        mode: u32,
        with_front_sem: bool,
        sem_init_value: u32,
    ) -> Result<SharedRegion, GameError> {
        let cname = CString::new(name).expect("shared memory name must not contain NUL");
        let fd = unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                mode,
            )
        };
        if fd == -1 {
            return Err(GameError::from_errno("shm_open", format!("creating {name}"), name));
        }

        let front_sem_size = if with_front_sem { Self::FRONT_SEM_SIZE } else { 0 };
        let map_len = front_sem_size + data_size;
        if unsafe { libc::ftruncate(fd, map_len as libc::off_t) } == -1 {
            let err = GameError::from_errno("ftruncate", format!("sizing {name}"), name);
            unsafe {
                libc::close(fd);
                libc::shm_unlink(cname.as_ptr());
            }
            return Err(err);
        }

        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            let err = GameError::from_errno("mmap", format!("mapping {name}"), name);
            unsafe {
                libc::close(fd);
                libc::shm_unlink(cname.as_ptr());
            }
            return Err(err);
        }

        if with_front_sem {
            let sem_ptr = base as *mut libc::sem_t;
            if unsafe { libc::sem_init(sem_ptr, 1, sem_init_value) } == -1 {
                let err = GameError::from_errno("sem_init", format!("front semaphore of {name}"), name);
                unsafe {
                    libc::munmap(base, map_len);
                    libc::close(fd);
                    libc::shm_unlink(cname.as_ptr());
                }
                return Err(err);
            }
        }

        tracing::info!(name, data_size, with_front_sem, "created shared memory region");

        Ok(SharedRegion {
            name: name.to_string(),
            fd,
            map_len,
            data_size,
            base: base as *mut u8,
            has_front_sem: with_front_sem,
        })
    }

    /// Opens an existing object. If `data_size_hint` is `0`, the size is
    /// taken from the object's current status. If write access is denied and
    /// no front semaphore is required, falls back to a read-only mapping.
    pub fn open(name: &str, data_size_hint: usize, with_front_sem: bool) -> Result<SharedRegion, GameError> {
        let cname = CString::new(name).expect("shared memory name must not contain NUL");
        let mut fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDWR, 0) };
        let mut read_only = false;
        if fd == -1 {
            let errno = unsafe { *libc::__errno_location() };
            if (errno == libc::EACCES || errno == libc::EPERM) && !with_front_sem {
                fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDONLY, 0) };
                read_only = true;
            }
            if fd == -1 {
                return Err(GameError::from_errno("shm_open", format!("opening {name}"), name));
            }
        }

        let front_sem_size = if with_front_sem { Self::FRONT_SEM_SIZE } else { 0 };
        let data_size = if data_size_hint == 0 {
            let mut stat: libc::stat = unsafe { std::mem::zeroed() };
            if unsafe { libc::fstat(fd, &mut stat) } == -1 {
                let err = GameError::from_errno("fstat", format!("sizing {name}"), name);
                unsafe { libc::close(fd) };
                return Err(err);
            }
            (stat.st_size as usize).saturating_sub(front_sem_size)
        } else {
            data_size_hint
        };

        let map_len = front_sem_size + data_size;
        let prot = if read_only {
            libc::PROT_READ
        } else {
            libc::PROT_READ | libc::PROT_WRITE
        };
        let base = unsafe { libc::mmap(ptr::null_mut(), map_len, prot, libc::MAP_SHARED, fd, 0) };
        if base == libc::MAP_FAILED {
            let err = GameError::from_errno("mmap", format!("mapping {name}"), name);
            unsafe { libc::close(fd) };
            return Err(err);
        }

        Ok(SharedRegion {
            name: name.to_string(),
            fd,
            map_len,
            data_size,
            base: base as *mut u8,
            has_front_sem: with_front_sem,
        })
    }

    /// Unmaps and closes the file descriptor. Does not unlink the name.
    pub fn close(self) -> Result<(), GameError> {
        // Drop performs the same work; consuming `self` here just gives the
        // caller an explicit, fallible-looking call site.
        drop(self);
        Ok(())
    }

    /// Destroys the front semaphore if any, unmaps, and unlinks the name.
    /// Master-only: Players and View must use [`SharedRegion::close`].
    pub fn destroy(mut self) -> Result<(), GameError> {
        if self.has_front_sem {
            unsafe { libc::sem_destroy(self.base as *mut libc::sem_t) };
        }
        let cname = CString::new(self.name.clone()).expect("name validated at construction");
        let unlink_result = unsafe { libc::shm_unlink(cname.as_ptr()) };
        // Unmap/close happens via Drop once `self` goes out of scope, but we
        // null the base first so Drop's munmap still runs against the valid
        // mapping (we haven't touched it) -- Drop runs unconditionally below.
        let name = self.name.clone();
        self.has_front_sem = false;
        if unlink_result == -1 {
            return Err(GameError::from_errno("shm_unlink", format!("unlinking {name}"), &name));
        }
        tracing::info!(name, "destroyed shared memory region");
        Ok(())
    }

    /// Pointer to the start of the caller's data, past any front semaphore.
    pub fn data(&self) -> *mut u8 {
        unsafe { self.base.add(if self.has_front_sem { Self::FRONT_SEM_SIZE } else { 0 }) }
    }

    /// Size of the caller's data region (excludes the front semaphore).
    pub fn size(&self) -> usize {
        self.data_size
    }

    /// Pointer to the front semaphore, if this region was created/opened with one.
    pub fn front_sem(&self) -> Option<*mut libc::sem_t> {
        self.has_front_sem.then_some(self.base as *mut libc::sem_t)
    }

    /// The POSIX name backing this region.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        if !self.base.is_null() {
            unsafe { libc::munmap(self.base as *mut libc::c_void, self.map_len) };
        }
        if self.fd != -1 {
            unsafe { libc::close(self.fd) };
        }
    }
}
