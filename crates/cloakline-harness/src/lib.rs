//! Test harness for Cloakline.
//!
//! - [`sim_server::SimServer`]: the server half of the protocol, in memory
//! - [`memory_driver::MemoryDriver`]: a [`cloakline_app::Driver`] wired to it
//! - [`scenario`]: declarative session scenarios checked by oracles
//! - [`fixtures`]: shared keys and configuration

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod memory_driver;
pub mod scenario;
pub mod sim_server;

pub use memory_driver::{MemoryDriver, MemoryError};
pub use scenario::{Scenario, Step, World};
pub use sim_server::{SESSION_MAC, SimError, SimServer};
