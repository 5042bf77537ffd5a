//! Transport layer (HTTP/JSON).
//!
//! Governance handlers translate request bodies into engine calls and map
//! `SentinelError` onto HTTP statuses; they hold no state of their own.

pub mod error;
pub mod http;
