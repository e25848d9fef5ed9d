//! # imgeval Common Library
//!
//! Shared code for the image evaluation service:
//! - Error taxonomy
//! - Bootstrap configuration loading
//! - Database initialization and entity models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
