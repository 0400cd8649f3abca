//! Session module - buy gate, daily budget, trading window and trade flow

pub mod budget;
pub mod controller;
pub mod window;

pub use budget::{Budget, Reservation};
pub use controller::{SessionController, StatsSnapshot};
pub use window::{TimeWindow, WindowTransition, WindowWatch};
