//! HTTP request handlers.
//!
//! Handlers return [`crate::errors::Error`], which converts to the JSON error contract.

pub mod materials;
