//! Process lifecycle: shutdown signals and the single-instance lock

mod instance;
mod shutdown;

pub use instance::InstanceGuard;
pub use shutdown::ShutdownSignal;
