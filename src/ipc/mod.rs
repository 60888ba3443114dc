//! IPC module for tray and view communication

mod protocol;
mod server;

pub use server::Server;
