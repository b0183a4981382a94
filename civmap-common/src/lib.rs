//! # civmap Common Library
//!
//! Shared code for the civmap crates:
//! - Error type and result alias
//! - Geographic value types (`GeoPoint`, `VillageKey`)
//! - TOML configuration loading and root folder resolution
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod geo;
pub mod logging;

pub use error::{Error, Result};
pub use geo::{GeoPoint, VillageKey};
