//! Port traits: boundaries between the simulation core and the outside world.

pub mod config_port;
pub mod data_port;
