//! Subcommand implementations.

pub mod bind;
pub mod unbind;
pub mod verify;
