use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Comment, Post, PostChanges, PostCriteria, PostPage, User};
use crate::error::RepoError;

/// Generic repository trait for lookups by primary key.
#[async_trait]
pub trait BaseRepository<T, ID>: Send + Sync {
    /// Find an entity by its unique ID.
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, RepoError>;
}

/// Read access to users, owned by the profile service.
#[async_trait]
pub trait UserDirectory: BaseRepository<User, Uuid> {
    /// Find a user by their unique username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    /// Every user among `ids` that exists, in one lookup. Order is unspecified.
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError>;
}

/// Read access to follow edges, owned by the profile service.
#[async_trait]
pub trait FollowGraph: Send + Sync {
    /// Ids of every user that `follower_id` follows. Possibly empty.
    async fn following_ids_of(&self, follower_id: Uuid) -> Result<HashSet<Uuid>, RepoError>;
}

/// Post repository.
#[async_trait]
pub trait PostRepository: BaseRepository<Post, Uuid> {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError>;

    /// Insert a new post. A taken slug is reported as [`RepoError::Constraint`],
    /// a missing author as [`RepoError::ForeignKey`].
    async fn insert(&self, post: Post) -> Result<Post, RepoError>;

    /// Write the supplied fields and `updated_at`, leaving every other
    /// column (the favorite counter in particular) as stored.
    async fn update(
        &self,
        post_id: Uuid,
        changes: PostChanges,
        at: DateTime<Utc>,
    ) -> Result<Post, RepoError>;

    /// Delete a post together with its comments and favorite edges.
    async fn remove(&self, post_id: Uuid) -> Result<(), RepoError>;

    /// Posts matching every predicate, newest first, paginated, with the
    /// unpaginated match count.
    async fn list(&self, criteria: &PostCriteria) -> Result<PostPage, RepoError>;
}

/// Comment rows, each bound to one post.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Comments of a post, oldest first.
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError>;

    /// Persist the comment and refresh its post's `updated_at` together.
    async fn add(&self, comment: Comment) -> Result<Comment, RepoError>;

    /// Delete `comment_id` only when it belongs to `post_id`.
    /// Returns whether a row was removed.
    async fn remove_from_post(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, RepoError>;
}

/// Outcome of a favorite ledger write.
#[derive(Debug, Clone)]
pub struct FavoriteChange {
    /// The post as stored after the operation.
    pub post: Post,
    /// False when the call was a no-op.
    pub changed: bool,
}

/// Favorite edges and the counter cached on the post.
///
/// Implementations check the edge and adjust the counter as one atomic unit
/// per post, so concurrent calls cannot double count.
#[async_trait]
pub trait FavoriteRepository: Send + Sync {
    /// Create the edge and increment the counter, unless the edge exists.
    async fn add(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<FavoriteChange, RepoError>;

    /// Drop the edge and decrement the counter, unless the edge is absent.
    async fn remove(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<FavoriteChange, RepoError>;

    async fn contains(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError>;

    /// The subset of `post_ids` the user has favorited, in one lookup.
    async fn favorited_post_ids(
        &self,
        user_id: Uuid,
        post_ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, RepoError>;

    /// Number of edges referencing the post.
    async fn count_for_post(&self, post_id: Uuid) -> Result<u64, RepoError>;
}
