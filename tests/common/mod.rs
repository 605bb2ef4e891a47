//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{memory_config, write_sample_events};
//!
//! let dir = tempfile::TempDir::new().unwrap();
//! write_sample_events(dir.path());
//! let config = memory_config(dir.path());
//! ```

mod fixtures;

pub use fixtures::*;
