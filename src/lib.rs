#![forbid(unsafe_code)]

//! Personal media server: search and download online videos, then play the
//! downloaded files back through a seekable HTTP streaming endpoint.
//!
//! The streaming path is `resolver` -> `range` -> `chunks`, assembled by
//! `stream`. Everything else (library listing, remote fetching, config) is
//! glue around it.

pub mod chunks;
pub mod config;
pub mod content_type;
pub mod error;
pub mod fetch;
pub mod library;
pub mod range;
pub mod resolver;
pub mod security;
pub mod server;
pub mod stream;
