//! Scoped process umask changes.
//!
//! The umask is process-wide. [`UmaskGuard`] sets it and restores the previous
//! mask when dropped, so every exit path (including `?` and panics) restores
//! it. A process-wide lock serialises guards and [`current_umask`] so
//! concurrent threads never observe another guard's transient mask.

use parking_lot::{Mutex, MutexGuard, const_mutex};

static UMASK_LOCK: Mutex<()> = const_mutex(());

/// Holds a temporary umask until dropped.
pub struct UmaskGuard {
    #[cfg(unix)]
    previous: libc::mode_t,
    _lock: MutexGuard<'static, ()>,
}

impl UmaskGuard {
    /// Set the umask to `mask` until the guard is dropped.
    #[must_use]
    pub fn set(mask: u32) -> Self {
        let lock = UMASK_LOCK.lock();
        #[cfg(unix)]
        {
            // SAFETY: umask(2) cannot fail and only swaps the process mask.
            let previous = unsafe { libc::umask(mask as libc::mode_t) };
            Self {
                previous,
                _lock: lock,
            }
        }
        #[cfg(not(unix))]
        {
            let _ = mask;
            Self { _lock: lock }
        }
    }

    /// Clear the umask so requested permission bits apply verbatim.
    #[must_use]
    pub fn relaxed() -> Self {
        Self::set(0)
    }

    /// Mask in effect before the guard was taken.
    #[must_use]
    pub fn previous(&self) -> u32 {
        #[cfg(unix)]
        {
            u32::from(self.previous)
        }
        #[cfg(not(unix))]
        {
            0
        }
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        // SAFETY: restores the mask read when the guard was created.
        unsafe {
            libc::umask(self.previous);
        }
    }
}

/// Read the current umask.
#[must_use]
pub fn current_umask() -> u32 {
    let _lock = UMASK_LOCK.lock();
    #[cfg(unix)]
    {
        // SAFETY: reads by swapping in a placeholder and immediately restoring.
        let mask = unsafe {
            let mask = libc::umask(0o022);
            libc::umask(mask);
            mask
        };
        u32::from(mask)
    }
    #[cfg(not(unix))]
    {
        0
    }
}
