//! HTTP API route handlers.

pub mod search;
pub mod system;
