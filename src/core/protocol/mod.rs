//! Controller wire protocol
//!
//! - Checksum arithmetic for outgoing frames
//! - Frame composition from command templates, response validation
//! - The register command table
//! - Register decoders

pub mod checksum;
pub mod commands;
pub mod frame;
pub mod registers;

pub use frame::{
    compose, hex_dump, validate, CommandTemplate, Frame, Patch, Payload, ResponseStatus,
};
pub use registers::{ModelId, Module, ModuleHealth, Reading, RegisterKind};
