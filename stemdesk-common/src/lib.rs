//! # StemDesk Common Library
//!
//! Shared code for StemDesk services:
//! - Configuration loading (TOML file, root folder resolution)
//! - Common error type

pub mod config;
pub mod error;

pub use error::{Error, Result};
