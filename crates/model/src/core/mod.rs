pub mod application;
pub mod identifiers;
