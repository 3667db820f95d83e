//! Catalog synchronization: the coordinator and the background refresh
//! scheduler.

mod coordinator;
mod scheduler;

pub use coordinator::SyncCoordinator;
pub use scheduler::RefreshScheduler;
