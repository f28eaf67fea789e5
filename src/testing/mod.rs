//! Testing utilities and mock implementations
//!
//! This module provides a scripted transport for testing the publisher
//! without an MQTT broker.

pub mod mocks;

pub use mocks::*;
