pub mod backend;
pub mod error;
pub mod orchestrator;
pub mod supervisor;
