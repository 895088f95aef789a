//! Application services orchestrating the ports.
//!
//! [`PostService`] is the public entry point; the comment store, favorite
//! ledger and query builder are the pieces it delegates to.

mod comments;
mod favorites;
mod posts;
mod query;
pub mod slug;

use std::sync::Arc;

pub use comments::CommentStore;
pub use favorites::FavoriteLedger;
pub use posts::PostService;
pub use query::{PostQuery, resolve_filter};
pub use slug::SlugGenerator;

use crate::domain::Post;
use crate::error::DomainError;
use crate::ports::{
    Clock, CommentRepository, FavoriteRepository, FollowGraph, PostRepository, UserDirectory,
};

/// Everything the post services need from the outside world.
#[derive(Clone)]
pub struct PostPorts {
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub favorites: Arc<dyn FavoriteRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub follows: Arc<dyn FollowGraph>,
    pub clock: Arc<dyn Clock>,
}

/// Tunables for [`PostService`].
#[derive(Debug, Clone)]
pub struct PostServiceConfig {
    /// Width of the random slug suffix.
    pub slug_suffix_len: usize,
    /// How many slugs to try before giving up on a create.
    pub slug_max_attempts: u32,
}

impl Default for PostServiceConfig {
    fn default() -> Self {
        Self {
            slug_suffix_len: slug::DEFAULT_SUFFIX_LEN,
            slug_max_attempts: 3,
        }
    }
}

async fn load_post(posts: &dyn PostRepository, slug: &str) -> Result<Post, DomainError> {
    posts
        .find_by_slug(slug)
        .await?
        .ok_or_else(|| DomainError::post_not_found(slug))
}
