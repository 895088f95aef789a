use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    CommentStore, FavoriteLedger, PostPorts, PostQuery, PostServiceConfig, SlugGenerator,
    load_post,
};
use crate::domain::{
    Comment, NewPost, Post, PostChanges, PostDetail, PostFilter, PostPage, User,
};
use crate::error::{DomainError, RepoError};
use crate::ports::{Clock, PostRepository, UserDirectory};

/// Post aggregate service - the only entry point for post operations.
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    slugs: SlugGenerator,
    slug_max_attempts: u32,
    comments: CommentStore,
    favorites: FavoriteLedger,
    query: PostQuery,
}

impl PostService {
    pub fn new(ports: PostPorts, config: PostServiceConfig) -> Self {
        let comments = CommentStore::new(
            Arc::clone(&ports.posts),
            Arc::clone(&ports.comments),
            Arc::clone(&ports.clock),
        );
        let favorites = FavoriteLedger::new(
            Arc::clone(&ports.posts),
            Arc::clone(&ports.favorites),
            Arc::clone(&ports.users),
            Arc::clone(&ports.clock),
        );
        let query = PostQuery::new(
            Arc::clone(&ports.posts),
            Arc::clone(&ports.users),
            Arc::clone(&ports.follows),
        );

        Self {
            posts: ports.posts,
            users: ports.users,
            clock: ports.clock,
            slugs: SlugGenerator::new(config.slug_suffix_len),
            slug_max_attempts: config.slug_max_attempts.max(1),
            comments,
            favorites,
            query,
        }
    }

    /// Create a post for `author_id`. A slug collision is retried with a
    /// fresh suffix up to the configured number of attempts.
    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create(&self, author_id: Uuid, input: NewPost) -> Result<Post, DomainError> {
        if input.title.trim().is_empty() {
            return Err(DomainError::Validation(
                "title must not be empty".to_string(),
            ));
        }

        let author = self
            .users
            .find_by_id(author_id)
            .await?
            .ok_or_else(|| DomainError::user_not_found(author_id))?;

        let slug = self.slugs.generate(&input.title);
        let mut post = Post::new(author.id, slug, input, self.clock.now());
        let mut attempt = 1;

        loop {
            match self.posts.insert(post.clone()).await {
                Ok(created) => {
                    info!(
                        post_id = %created.id,
                        slug = %created.slug,
                        author_id = %author.id,
                        "post created"
                    );
                    return Ok(created);
                }
                Err(RepoError::Constraint(reason)) if attempt < self.slug_max_attempts => {
                    warn!(attempt, slug = %post.slug, %reason, "slug taken, regenerating");
                    post.slug = self.slugs.generate(&post.title);
                    attempt += 1;
                }
                Err(RepoError::Constraint(reason)) => {
                    return Err(DomainError::Duplicate(format!(
                        "no free slug after {attempt} attempts: {reason}"
                    )));
                }
                Err(RepoError::ForeignKey(reason)) => {
                    warn!(author_id = %author.id, %reason, "author vanished during create");
                    return Err(DomainError::user_not_found(author.id));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<PostDetail, DomainError> {
        let post = load_post(self.posts.as_ref(), slug).await?;
        self.comments.detail(post).await
    }

    pub async fn get_comments(&self, slug: &str) -> Result<Vec<Comment>, DomainError> {
        self.comments.comments(slug).await
    }

    /// Apply the supplied fields. The slug keeps its original value even
    /// when the title changes.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, slug: &str, changes: PostChanges) -> Result<Post, DomainError> {
        if changes.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(DomainError::Validation(
                "title must not be empty".to_string(),
            ));
        }

        let post = load_post(self.posts.as_ref(), slug).await?;
        let updated = match self.posts.update(post.id, changes, self.clock.now()).await {
            Ok(updated) => updated,
            Err(RepoError::NotFound) => return Err(DomainError::post_not_found(slug)),
            Err(e) => return Err(e.into()),
        };

        info!(post_id = %updated.id, "post updated");
        Ok(updated)
    }

    /// Delete the post with its comments and favorite edges.
    #[instrument(skip(self))]
    pub async fn delete(&self, slug: &str) -> Result<(), DomainError> {
        let post = load_post(self.posts.as_ref(), slug).await?;
        match self.posts.remove(post.id).await {
            Ok(()) => {
                info!(post_id = %post.id, "post deleted");
                Ok(())
            }
            Err(RepoError::NotFound) => Err(DomainError::post_not_found(slug)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn add_comment(&self, slug: &str, body: &str) -> Result<PostDetail, DomainError> {
        self.comments.add_comment(slug, body).await
    }

    pub async fn delete_comment(
        &self,
        slug: &str,
        comment_id: Uuid,
    ) -> Result<PostDetail, DomainError> {
        self.comments.delete_comment(slug, comment_id).await
    }

    pub async fn favorite(&self, user_id: Uuid, slug: &str) -> Result<Post, DomainError> {
        self.favorites.favorite(user_id, slug).await
    }

    pub async fn unfavorite(&self, user_id: Uuid, slug: &str) -> Result<Post, DomainError> {
        self.favorites.unfavorite(user_id, slug).await
    }

    pub async fn is_favorited(&self, user_id: Uuid, slug: &str) -> Result<bool, DomainError> {
        self.favorites.is_favorited(user_id, slug).await
    }

    pub async fn favorited_among(
        &self,
        user_id: Uuid,
        posts: &[Post],
    ) -> Result<HashSet<Uuid>, DomainError> {
        self.favorites.favorited_among(user_id, posts).await
    }

    /// Authors of `posts`, keyed by user id, fetched in one lookup.
    pub async fn authors_of(&self, posts: &[Post]) -> Result<HashMap<Uuid, User>, DomainError> {
        let mut ids: Vec<Uuid> = posts.iter().map(|p| p.author_id).collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let users = self.users.find_by_ids(&ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    pub async fn verify_favorite_count(&self, slug: &str) -> Result<Post, DomainError> {
        self.favorites.verify_count(slug).await
    }

    pub async fn list_posts(&self, filter: &PostFilter) -> Result<PostPage, DomainError> {
        self.query.list_posts(filter).await
    }

    pub async fn list_feed(
        &self,
        user_id: Uuid,
        filter: &PostFilter,
    ) -> Result<PostPage, DomainError> {
        self.query.list_feed(user_id, filter).await
    }
}
