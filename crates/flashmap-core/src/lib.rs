//! Core types and registries for the Flashmap hunt tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! registries talk to storage only through [`kv::KeyValueStore`]; concrete
//! backends live in `flashmap-store-redis` and `flashmap-store-sqlite`.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod catalog;
pub mod collection;
pub mod error;
pub mod flags;
pub mod flash;
pub mod kv;
pub mod links;
pub mod memory;
pub mod registry;
pub mod target;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
