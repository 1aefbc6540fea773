//! # Dechorder Common Library
//!
//! Shared code for the Dechorder services:
//! - Error and result types
//! - TOML bootstrap configuration
//! - Byte storage for uploaded files

pub mod config;
pub mod error;
pub mod storage;

pub use error::{Error, Result};
pub use storage::{FileStore, LocalFileStore};
