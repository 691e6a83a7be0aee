//! CLI commands

pub mod genvalues;
pub mod info;
pub mod push;
pub mod release;
pub mod releases;
pub mod secrets;
pub mod setup;
