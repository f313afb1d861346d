// [track_caller] on async fn needs nightly and the async_fn_track_caller
// feature. Build with `cargo +nightly build --features track-lock-location`
// to get the caller's location in lock events.

use std::ops::Deref;
use std::ops::DerefMut;
use std::panic::Location;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tokio::sync::RwLockReadGuard;
use tokio::sync::RwLockWriteGuard;

use super::now;
use super::LockAcquisition;
use super::LockCallbackFn;
use super::LockCallbackInfo;
use super::LockEvent;

/// An `Arc<RwLock<T>>` that reports acquisitions and releases to an optional
/// callback.
///
/// Write access takes `&mut self`: the handle doing the writing is meant to
/// be owned by a single task, while clones of it serve readers.
///
/// # Examples
/// ```
/// # use mining_pool::application::locks::tokio::AtomicRw;
/// # tokio_test::block_on(async {
/// let mut height = AtomicRw::from(7u64);
/// let reader = height.clone();
/// height.lock_mut(|h| *h += 1).await;
/// assert_eq!(8, reader.lock(|h| *h).await);
/// # })
/// ```
#[derive(Debug)]
pub struct AtomicRw<T> {
    inner: Arc<RwLock<T>>,
    callback_info: LockCallbackInfo,
}

impl<T> AtomicRw<T> {
    /// A named lock whose events go to `callback`.
    pub fn new(value: T, name: &str, callback: Option<LockCallbackFn>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
            callback_info: LockCallbackInfo::new(Some(name.to_owned()), callback),
        }
    }

    #[cfg_attr(feature = "track-lock-location", track_caller)]
    pub async fn lock_guard(&self) -> AtomicRwReadGuard<'_, T> {
        self.try_acquire_cb(LockAcquisition::Read);

        let try_acquire_at = now();
        let guard = self.inner.read().await;
        AtomicRwReadGuard::new(guard, &self.callback_info, try_acquire_at)
    }

    #[cfg_attr(feature = "track-lock-location", track_caller)]
    pub async fn lock_guard_mut(&mut self) -> AtomicRwWriteGuard<'_, T> {
        self.try_acquire_cb(LockAcquisition::Write);

        let try_acquire_at = now();
        let guard = self.inner.write().await;
        AtomicRwWriteGuard::new(guard, &self.callback_info, try_acquire_at)
    }

    /// Run `f` under the read lock. The lock is released when `f` returns.
    #[cfg_attr(feature = "track-lock-location", track_caller)]
    pub async fn lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.lock_guard().await;
        f(&guard)
    }

    /// Run `f` under the write lock. The lock is released when `f` returns.
    #[cfg_attr(feature = "track-lock-location", track_caller)]
    pub async fn lock_mut<R, F>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut guard = self.lock_guard_mut().await;
        f(&mut guard)
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.callback_info.name()
    }

    #[cfg_attr(feature = "track-lock-location", track_caller)]
    fn try_acquire_cb(&self, acquisition: LockAcquisition) {
        if let Some(cb) = self.callback_info.callback {
            cb(LockEvent::TryAcquire {
                info: self.callback_info.info(),
                acquisition,
                location: caller_location(),
            });
        }
    }
}

impl<T> From<T> for AtomicRw<T> {
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
            callback_info: LockCallbackInfo::new(None, None),
        }
    }
}

impl<T: Default> Default for AtomicRw<T> {
    fn default() -> Self {
        Self::from(T::default())
    }
}

impl<T> Clone for AtomicRw<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            callback_info: self.callback_info.clone(),
        }
    }
}

#[cfg(feature = "track-lock-location")]
#[track_caller]
fn caller_location() -> Option<&'static Location<'static>> {
    Some(Location::caller())
}

#[cfg(not(feature = "track-lock-location"))]
fn caller_location() -> Option<&'static Location<'static>> {
    None
}

/// Bookkeeping shared by both guard kinds.
#[derive(Debug)]
struct GuardMeta<'a> {
    callback_info: &'a LockCallbackInfo,
    acquisition: LockAcquisition,
    try_acquire_at: Option<Instant>,
    acquire_at: Option<Instant>,
    location: Option<&'static Location<'static>>,
}

impl<'a> GuardMeta<'a> {
    #[cfg_attr(feature = "track-lock-location", track_caller)]
    fn acquired(
        callback_info: &'a LockCallbackInfo,
        acquisition: LockAcquisition,
        try_acquire_at: Option<Instant>,
    ) -> Self {
        let meta = Self {
            callback_info,
            acquisition,
            try_acquire_at,
            acquire_at: now(),
            location: caller_location(),
        };

        if let Some(cb) = callback_info.callback {
            cb(LockEvent::Acquire {
                info: callback_info.info(),
                acquisition,
                try_acquire_at: meta.try_acquire_at,
                acquire_at: meta.acquire_at,
                location: meta.location,
            });
        }
        meta
    }
}

impl Drop for GuardMeta<'_> {
    fn drop(&mut self) {
        if let Some(cb) = self.callback_info.callback {
            cb(LockEvent::Release {
                info: self.callback_info.info(),
                acquisition: self.acquisition,
                try_acquire_at: self.try_acquire_at,
                acquire_at: self.acquire_at,
                location: self.location,
            });
        }
    }
}

/// Read guard of an [`AtomicRw`]. Reports its release on drop.
#[derive(Debug)]
pub struct AtomicRwReadGuard<'a, T> {
    // field order matters: the lock is released before the release event fires
    guard: RwLockReadGuard<'a, T>,
    _meta: GuardMeta<'a>,
}

impl<'a, T> AtomicRwReadGuard<'a, T> {
    #[cfg_attr(feature = "track-lock-location", track_caller)]
    fn new(
        guard: RwLockReadGuard<'a, T>,
        callback_info: &'a LockCallbackInfo,
        try_acquire_at: Option<Instant>,
    ) -> Self {
        Self {
            guard,
            _meta: GuardMeta::acquired(callback_info, LockAcquisition::Read, try_acquire_at),
        }
    }
}

impl<T> Deref for AtomicRwReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Write guard of an [`AtomicRw`]. Reports its release on drop.
#[derive(Debug)]
pub struct AtomicRwWriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
    _meta: GuardMeta<'a>,
}

impl<'a, T> AtomicRwWriteGuard<'a, T> {
    #[cfg_attr(feature = "track-lock-location", track_caller)]
    fn new(
        guard: RwLockWriteGuard<'a, T>,
        callback_info: &'a LockCallbackInfo,
        try_acquire_at: Option<Instant>,
    ) -> Self {
        Self {
            guard,
            _meta: GuardMeta::acquired(callback_info, LockAcquisition::Write, try_acquire_at),
        }
    }
}

impl<T> Deref for AtomicRwWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for AtomicRwWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
