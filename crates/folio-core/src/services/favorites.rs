use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::load_post;
use crate::domain::{Post, User};
use crate::error::DomainError;
use crate::ports::{Clock, FavoriteRepository, PostRepository, UserDirectory};

/// Favorite edges and the counter cached on each post.
#[derive(Clone)]
pub struct FavoriteLedger {
    posts: Arc<dyn PostRepository>,
    favorites: Arc<dyn FavoriteRepository>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
}

impl FavoriteLedger {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        favorites: Arc<dyn FavoriteRepository>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            posts,
            favorites,
            users,
            clock,
        }
    }

    /// Favorite a post. Repeating the call is a no-op.
    #[instrument(skip(self))]
    pub async fn favorite(&self, user_id: Uuid, slug: &str) -> Result<Post, DomainError> {
        let post = load_post(self.posts.as_ref(), slug).await?;
        let user = self.require_user(user_id).await?;

        let change = self
            .favorites
            .add(user.id, post.id, self.clock.now())
            .await?;
        if change.changed {
            info!(
                post_id = %post.id,
                user_id = %user.id,
                favorite_count = change.post.favorite_count,
                "post favorited"
            );
        } else {
            debug!(post_id = %post.id, user_id = %user.id, "already favorited");
        }

        Ok(change.post)
    }

    /// Remove a favorite. Unfavoriting a post that was never favorited is a
    /// no-op.
    #[instrument(skip(self))]
    pub async fn unfavorite(&self, user_id: Uuid, slug: &str) -> Result<Post, DomainError> {
        let post = load_post(self.posts.as_ref(), slug).await?;
        let user = self.require_user(user_id).await?;

        let change = self
            .favorites
            .remove(user.id, post.id, self.clock.now())
            .await?;
        if change.changed {
            info!(
                post_id = %post.id,
                user_id = %user.id,
                favorite_count = change.post.favorite_count,
                "post unfavorited"
            );
        } else {
            debug!(post_id = %post.id, user_id = %user.id, "not favorited");
        }

        Ok(change.post)
    }

    pub async fn is_favorited(&self, user_id: Uuid, slug: &str) -> Result<bool, DomainError> {
        let post = load_post(self.posts.as_ref(), slug).await?;
        Ok(self.favorites.contains(user_id, post.id).await?)
    }

    /// Which of `posts` the user has favorited, in one storage call.
    pub async fn favorited_among(
        &self,
        user_id: Uuid,
        posts: &[Post],
    ) -> Result<HashSet<Uuid>, DomainError> {
        if posts.is_empty() {
            return Ok(HashSet::new());
        }
        let post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        Ok(self
            .favorites
            .favorited_post_ids(user_id, &post_ids)
            .await?)
    }

    /// Compare the cached counter with the edge count and report a mismatch.
    pub async fn verify_count(&self, slug: &str) -> Result<Post, DomainError> {
        let post = load_post(self.posts.as_ref(), slug).await?;
        let edges = self.favorites.count_for_post(post.id).await?;

        if u64::try_from(post.favorite_count).ok() != Some(edges) {
            error!(
                post_id = %post.id,
                counter = post.favorite_count,
                edges,
                "favorite counter diverged from edges"
            );
            return Err(DomainError::ConsistencyViolation {
                post_id: post.id,
                counter: post.favorite_count,
                edges,
            });
        }

        Ok(post)
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User, DomainError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(user_id))
    }
}
