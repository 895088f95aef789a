use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::load_post;
use crate::domain::{Comment, Post, PostDetail};
use crate::error::DomainError;
use crate::ports::{Clock, CommentRepository, PostRepository};

/// Comments of a post. Every lookup is scoped to the owning post.
#[derive(Clone)]
pub struct CommentStore {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    clock: Arc<dyn Clock>,
}

impl CommentStore {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            posts,
            comments,
            clock,
        }
    }

    pub async fn comments(&self, slug: &str) -> Result<Vec<Comment>, DomainError> {
        let post = load_post(self.posts.as_ref(), slug).await?;
        Ok(self.comments.list_for_post(post.id).await?)
    }

    /// Attach the comment collection to an already loaded post.
    pub async fn detail(&self, post: Post) -> Result<PostDetail, DomainError> {
        let comments = self.comments.list_for_post(post.id).await?;
        Ok(PostDetail { post, comments })
    }

    #[instrument(skip(self, body))]
    pub async fn add_comment(&self, slug: &str, body: &str) -> Result<PostDetail, DomainError> {
        if body.trim().is_empty() {
            return Err(DomainError::Validation(
                "comment body must not be empty".to_string(),
            ));
        }

        let post = load_post(self.posts.as_ref(), slug).await?;
        let comment = Comment::new(post.id, body.to_string(), self.clock.now());
        let comment = self.comments.add(comment).await?;
        info!(post_id = %post.id, comment_id = %comment.id, "comment added");

        let post = self.reload(post.id, slug).await?;
        self.detail(post).await
    }

    /// Remove a comment from the post. A comment id that does not belong to
    /// this post leaves it unchanged.
    #[instrument(skip(self))]
    pub async fn delete_comment(
        &self,
        slug: &str,
        comment_id: Uuid,
    ) -> Result<PostDetail, DomainError> {
        let post = load_post(self.posts.as_ref(), slug).await?;
        let removed = self
            .comments
            .remove_from_post(post.id, comment_id, self.clock.now())
            .await?;

        let post = if removed {
            info!(post_id = %post.id, %comment_id, "comment deleted");
            self.reload(post.id, slug).await?
        } else {
            debug!(post_id = %post.id, %comment_id, "comment not on post, nothing deleted");
            post
        };

        self.detail(post).await
    }

    async fn reload(&self, post_id: Uuid, slug: &str) -> Result<Post, DomainError> {
        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::post_not_found(slug))
    }
}
