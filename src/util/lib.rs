//! Utility crate for the DateiLager versioned file store: error taxonomy,
//! layered configuration, time/hash helpers and tracing setup, shared by
//! every other crate in the workspace.

#[macro_use]
extern crate tracing;

pub mod auth;
pub mod config;
pub mod error;
pub mod hash;
pub mod time;
pub mod tracing_setup;
pub mod version;
