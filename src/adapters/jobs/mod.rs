//! Background jobs.
//!
//! - `TimeoutSweeper` - periodically times out payment intents the provider
//!   never reported on

mod timeout_sweeper;

pub use timeout_sweeper::{TimeoutSweeper, TimeoutSweeperConfig};
