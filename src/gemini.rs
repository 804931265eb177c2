//! Gemini API implementation
//!
//! This module provides the core implementation for interacting with Google's Gemini API.

mod client;
pub mod http;
mod models;
mod types;

pub use client::Client;
pub use models::{ModelsService, ResponseStream};

/// Re-export of types module for public use
pub mod prelude {
    pub use super::types::*;
    pub use crate::error::Error;
    pub use crate::error::Result;
}
