pub mod core;
pub mod execution;
pub mod io;
