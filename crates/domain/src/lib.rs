//! `portero-core` — shared types for the gateway: configuration,
//! the policy/task/grant data model, the tool-name pattern matcher, and the
//! wire shape of tool definitions and call results.
//!
//! Nothing in this crate talks to a backend or the filesystem; it's the
//! vocabulary the rest of the workspace builds on.

pub mod config;
pub mod error;
pub mod model;
pub mod pattern;
pub mod tool;

pub use error::{Error, Result};
