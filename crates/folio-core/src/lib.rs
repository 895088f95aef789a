//! # Folio Core
//!
//! The domain layer of the Folio publishing backend: posts, their comments
//! and favorites, and the feed read paths built on the follow graph.
//! Storage and the social graph are reached only through the traits in
//! [`ports`], so this crate carries no infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::{DomainError, RepoError};
pub use services::{PostService, PostServiceConfig};
