//! Core engine for Cadence: weighted progress propagation, deadline
//! alerting, velocity history, and delivery prediction.

pub mod config;
pub mod deadline;
pub mod history;
pub mod lock;
pub mod model;
pub mod predict;
pub mod rollup;
pub mod weight;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
