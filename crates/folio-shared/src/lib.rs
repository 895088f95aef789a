//! # Folio Shared
//!
//! Wire types for the HTTP API. Independent of `folio-core` so clients can
//! depend on it alone.

pub mod dto;
pub mod response;

pub use response::ErrorResponse;
