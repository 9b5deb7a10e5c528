//! folio-core - Core types and traits for folio
//!
//! This crate provides the domain types, collaborator traits, configuration
//! and error handling shared by the chunking engine, the passage index and
//! the conversational agent.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{FolioError, Result};
pub use traits::*;
pub use types::*;
