//! Application controller and its command handle

mod controller;
mod handle;

pub use controller::{AppStatus, CategoryListing, Command, Controller};
pub use handle::{AppHandle, HandleError};
