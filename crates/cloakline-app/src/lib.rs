//! Application layer for Cloakline.
//!
//! Glues the sans-IO session from `cloakline-core` to real I/O through a
//! [`Driver`], so the same orchestration code runs in the CLI and in the
//! in-memory test harness.
//!
//! # Components
//!
//! - [`Driver`]: trait for platform-specific transport and presentation
//! - [`Runtime`]: generic orchestration loop using a Driver
//! - [`commands`]: text command parser

pub mod commands;
mod driver;
mod runtime;

pub use commands::Command;
pub use driver::Driver;
pub use runtime::{Runtime, RuntimeError};
