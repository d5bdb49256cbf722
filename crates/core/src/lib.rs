//! # Glimpse Core
//!
//! Domain types, traits, and error definitions for Glimpse.
//! This crate knows nothing about HTTP or configuration files; it defines
//! the contract that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! The model backend is a trait here ([`Provider`]). Implementations live in
//! `glimpse-providers`, and the reasoning pipeline receives a constructed
//! instance by injection. This enables:
//! - Swapping backends via configuration
//! - Easy testing with scripted mock providers
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod media;
pub mod provider;
pub mod schema;
pub mod structured;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result};
pub use media::ImageInput;
pub use provider::{
    CallResponse, ChunkReceiver, ERROR_MARKER, Provider, ProviderRequest, ProviderResponse,
    StreamChunk, TextStream, Usage,
};
pub use schema::Schema;
pub use structured::{extract_json, raw_text};
