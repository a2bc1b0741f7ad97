//! Shortener - URL shortener storage core
//!
//! This library provides the storage side of a URL shortening service:
//! a deduplicating, soft-deleting URL repository and a coordinator that
//! applies delete requests in periodic batches.
//!
//! # Architecture
//! - `storage`: `UrlRepository` trait with in-memory and SeaORM backends
//! - `deletion`: Batched deferred deletion and its fallback log
//! - `config`: Configuration loaded from TOML and environment
//! - `system`: Logging and shutdown handling
//! - `cli`: Command-line definitions for the `shortener` binary

pub mod cli;
pub mod config;
pub mod deletion;
pub mod errors;
pub mod storage;
pub mod system;
pub mod utils;
