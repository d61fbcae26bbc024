pub mod keyed_lock;
pub mod scope_guard;

pub use keyed_lock::KeyedLocks;
pub use scope_guard::ScopeGuard;
