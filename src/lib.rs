//! # ledwatch core library
//!
//! Health poller for LED video wall controllers reached over serial ports:
//! - Discovers sender cards on every serial port
//! - Enumerates the receiver cards daisy-chained behind each sender
//! - Decodes brightness, temperature, voltage, module and signal registers
//!   into a typed topology snapshot
//! - Serialises access to the serial ports between processes through a
//!   small TCP arbitration broker
//!
//! ## Example
//!
//! ```rust,no_run
//! use ledwatch_core::{
//!     BrokerClient, PollSettings, SerialSettings, SerialTransport, TopologyWalker, WalkPlan,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let grant = BrokerClient::default().acquire("check modules").await?;
//!
//!     let link = SerialTransport::new(SerialSettings::default());
//!     let mut walker = TopologyWalker::new(link, PollSettings::default());
//!     let topology = walker.poll(&WalkPlan::modules()).await?;
//!     println!("{}", serde_json::to_string_pretty(&topology)?);
//!
//!     grant.release().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::{ConfigError, MonitorConfig};
pub use crate::core::arbitration::{
    ArbitrationBroker, BrokerClient, BrokerConfig, BrokerError, BrokerHandle, BrokerStats,
    SerialGrant,
};
pub use crate::core::protocol::{
    Frame, ModelId, Module, ModuleHealth, Payload, Reading, RegisterKind, ResponseStatus,
};
pub use crate::core::simulator::VirtualController;
pub use crate::core::topology::{Expectations, PortOutcome, ReceiverCard, SenderCard, Topology};
pub use crate::core::transport::{
    PortCandidate, SerialLink, SerialSettings, SerialTransport, TransportError,
};
pub use crate::core::walker::{PlanPreset, PollError, PollSettings, TopologyWalker, WalkPlan};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
