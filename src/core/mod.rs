//! Core module containing the poller functionality
//!
//! This module provides:
//! - Controller wire protocol (frames, checksum, command table, register decoders)
//! - Serial link abstraction and the `serialport` backed transport
//! - Topology snapshot types
//! - Topology walker
//! - Serial port arbitration broker
//! - Virtual controller for tests and dry runs
//! - Logging setup

pub mod arbitration;
pub mod logger;
pub mod protocol;
pub mod simulator;
pub mod topology;
pub mod transport;
pub mod walker;
