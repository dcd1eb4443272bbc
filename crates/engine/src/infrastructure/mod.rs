//! Infrastructure seams: config, clock/random ports, correlation ids,
//! the command-layer error taxonomy, and the `PersistencePort` adapter.

pub mod clock;
pub mod config;
pub mod correlation;
pub mod error;
pub mod persistence;
pub mod ports;
