//! Configuration parsing for the twokeys detector
//!
//! This crate parses the detector's KDL configuration: server address,
//! keyboard locking permission, and one block per logical keyboard with its
//! device paths, custom key-code mappings and hotkey table.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{parse_config, parse_config_str};
