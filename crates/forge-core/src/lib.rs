//! Core library for Forge Connector.
//!
//! Contains the HMAC signing protocol, the persisted connection state, input
//! sanitizers, the content store that backs the sync API, and the CTA model,
//! renderer and cached source. This crate depends on `forge-storage` for the
//! storage backend trait and knows nothing about HTTP.

pub mod connection;
pub mod content;
pub mod cta;
pub mod error;
pub mod sanitize;
pub mod signing;
