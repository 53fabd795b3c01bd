pub mod controller;
pub mod review;
pub mod state;

pub use controller::{CommitOutcome, SessionController, TimerEvent, TimerSnapshot};
pub use review::Review;
pub use state::{Tick, TimerState, TimerStatus};
