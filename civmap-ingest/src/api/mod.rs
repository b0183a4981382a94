//! HTTP API handlers for civmap-ingest
//!
//! Read and edit merged village records, resolve addresses, list township
//! aggregates.

pub mod health;
pub mod resolve;
pub mod townships;
pub mod villages;

pub use health::health_routes;
pub use resolve::resolve_routes;
pub use townships::township_routes;
pub use villages::village_routes;
