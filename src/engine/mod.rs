//! Tournament workflows built on top of a `TournamentGateway`.
//!
//! Each submodule takes the gateway by reference, so any implementation
//! (the HTTP client or a test double) can drive it.

pub mod capital;
pub mod dataset;
pub mod earnings;
pub mod poller;
pub mod stakes;
