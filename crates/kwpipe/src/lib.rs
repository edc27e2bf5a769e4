//! Public facade crate for `kwpipe`.
//!
//! This crate contains no IO. It re-exports the backend-agnostic keyword types, errors and
//! the `PageFetcher` trait from `kwpipe-core`; the network pipeline lives in `kwpipe-local`.

pub use kwpipe_core::*;
