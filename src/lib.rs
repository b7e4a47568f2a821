//! Discovers, validates and ingests RSS/Atom news feeds.
//!
//! The library never installs a tracing subscriber; the `feedscout` binary
//! does.

pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
