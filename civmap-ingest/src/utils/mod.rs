//! Utility modules for civmap-ingest

pub mod atomic_file;

pub use atomic_file::{read_json_file, write_json_atomic};
