//! Redis backend for the Flashmap key-value store.
//!
//! Documents are plain Redis strings (`GET`/`SET`); allow-lists are Redis sets
//! (`SADD`/`SREM`/`SISMEMBER`/`SMEMBERS`).

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::RedisStore;
