//! A traced `Arc<tokio::sync::RwLock<T>>` used to share the candidate store
//! between the work loop (single writer) and `get_work` callers (readers).

mod atomic_rw;
mod lock_event;

pub use atomic_rw::AtomicRw;
pub use atomic_rw::AtomicRwReadGuard;
pub use atomic_rw::AtomicRwWriteGuard;
use lock_event::now;
pub use lock_event::LockAcquisition;
pub use lock_event::LockCallbackFn;
use lock_event::LockCallbackInfo;
pub use lock_event::LockEvent;
pub use lock_event::LockInfo;
