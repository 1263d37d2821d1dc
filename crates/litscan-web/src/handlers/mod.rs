//! HTTP handlers for the API routes.

pub mod config;
pub mod tasks;
