//! Testing utilities and mock implementations
//!
//! This module provides mock collaborators for testing the bridge without a
//! radio module, a network interface or an MQTT broker.

pub mod mocks;

pub use mocks::*;
