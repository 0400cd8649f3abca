//! Position management module

pub mod auto_sell;
pub mod exit;
pub mod manager;
pub mod scheduler;

pub use auto_sell::{ExitPolicy, TriggerType};
pub use exit::{ExitReason, ExitStage, FailureAction, Position, PositionState, SellOrder};
pub use manager::{DailyStats, PositionBook, PositionHandle, PositionSummary};
pub use scheduler::{ExitScheduler, Wake, WakeKind};
