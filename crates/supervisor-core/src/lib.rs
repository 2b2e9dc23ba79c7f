pub mod error;
pub mod handoff;
pub mod heartbeat;
pub mod reporter;
pub mod retry;
pub mod state;
