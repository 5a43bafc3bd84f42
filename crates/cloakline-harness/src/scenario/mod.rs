//! Scenario-based session testing.
//!
//! A scenario sets up a simulated server, drives one client session through
//! a list of steps, and hands the resulting [`World`] to an oracle.

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use world::World;

/// Verifies the final state of a scenario.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
