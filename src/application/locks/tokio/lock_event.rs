use std::panic::Location;
use std::time::Instant;

/// Whether a lock was requested for reading or writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LockAcquisition {
    Read,
    Write,
}

/// Name of a lock as passed to callbacks.
#[derive(Debug, Clone, Copy)]
pub struct LockInfo<'a> {
    name: Option<&'a str>,
}

impl LockInfo<'_> {
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name
    }
}

#[derive(Debug, Clone)]
pub(super) struct LockCallbackInfo {
    name: Option<String>,
    pub callback: Option<LockCallbackFn>,
}

impl LockCallbackInfo {
    pub fn new(name: Option<String>, callback: Option<LockCallbackFn>) -> Self {
        Self { name, callback }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn info(&self) -> LockInfo<'_> {
        LockInfo {
            name: self.name.as_deref(),
        }
    }
}

/// Something happened to a traced lock.
///
/// Instants are `None` unless the `track-lock-time` feature is on, locations
/// are `None` unless `track-lock-location` is on (nightly only).
#[derive(Debug, Clone)]
pub enum LockEvent<'a> {
    TryAcquire {
        info: LockInfo<'a>,
        acquisition: LockAcquisition,
        location: Option<&'static Location<'static>>,
    },
    Acquire {
        info: LockInfo<'a>,
        acquisition: LockAcquisition,
        try_acquire_at: Option<Instant>,
        acquire_at: Option<Instant>,
        location: Option<&'static Location<'static>>,
    },
    Release {
        info: LockInfo<'a>,
        acquisition: LockAcquisition,
        try_acquire_at: Option<Instant>,
        acquire_at: Option<Instant>,
        location: Option<&'static Location<'static>>,
    },
}

impl LockEvent<'_> {
    pub fn event_type_name(&self) -> &'static str {
        match self {
            Self::TryAcquire { .. } => "TryAcquire",
            Self::Acquire { .. } => "Acquire",
            Self::Release { .. } => "Release",
        }
    }

    pub fn info(&self) -> &LockInfo<'_> {
        match self {
            Self::TryAcquire { info, .. }
            | Self::Acquire { info, .. }
            | Self::Release { info, .. } => info,
        }
    }

    pub fn acquisition(&self) -> LockAcquisition {
        match self {
            Self::TryAcquire { acquisition, .. }
            | Self::Acquire { acquisition, .. }
            | Self::Release { acquisition, .. } => *acquisition,
        }
    }

    pub fn location(&self) -> Option<&'static Location<'static>> {
        match self {
            Self::TryAcquire { location, .. }
            | Self::Acquire { location, .. }
            | Self::Release { location, .. } => *location,
        }
    }

    pub fn try_acquire_at(&self) -> Option<Instant> {
        match self {
            Self::TryAcquire { .. } => None,
            Self::Acquire { try_acquire_at, .. } | Self::Release { try_acquire_at, .. } => {
                *try_acquire_at
            }
        }
    }

    pub fn acquire_at(&self) -> Option<Instant> {
        match self {
            Self::TryAcquire { .. } => None,
            Self::Acquire { acquire_at, .. } | Self::Release { acquire_at, .. } => *acquire_at,
        }
    }
}

/// Called on every [`LockEvent`] of a traced lock.
pub type LockCallbackFn = fn(lock_event: LockEvent);

#[cfg(feature = "track-lock-time")]
#[expect(clippy::unnecessary_wraps)]
pub(super) fn now() -> Option<Instant> {
    Some(Instant::now())
}

#[cfg(not(feature = "track-lock-time"))]
pub(super) fn now() -> Option<Instant> {
    None
}
