use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{PostCriteria, PostFilter, PostPage, PostPredicate, User};
use crate::error::DomainError;
use crate::ports::{FollowGraph, PostRepository, UserDirectory};

/// Builds post listings from filters and from the follow graph.
#[derive(Clone)]
pub struct PostQuery {
    posts: Arc<dyn PostRepository>,
    users: Arc<dyn UserDirectory>,
    follows: Arc<dyn FollowGraph>,
}

impl PostQuery {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        users: Arc<dyn UserDirectory>,
        follows: Arc<dyn FollowGraph>,
    ) -> Self {
        Self {
            posts,
            users,
            follows,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_posts(&self, filter: &PostFilter) -> Result<PostPage, DomainError> {
        let criteria = resolve_filter(self.users.as_ref(), filter).await?;
        Ok(self.posts.list(&criteria).await?)
    }

    /// Posts written by the users `user_id` follows. Only the pagination
    /// fields of `filter` apply.
    #[instrument(skip(self))]
    pub async fn list_feed(
        &self,
        user_id: Uuid,
        filter: &PostFilter,
    ) -> Result<PostPage, DomainError> {
        let following = self.follows.following_ids_of(user_id).await?;
        if following.is_empty() {
            debug!(%user_id, "feed empty, user follows nobody");
            return Ok(PostPage::empty());
        }

        let mut authors: Vec<Uuid> = following.into_iter().collect();
        authors.sort();
        let criteria =
            PostCriteria::new(filter.page()).with(PostPredicate::AuthoredByAny(authors));

        Ok(self.posts.list(&criteria).await?)
    }
}

/// Turn a caller filter into storage criteria, resolving usernames to ids.
/// Only the fields that are present contribute a predicate.
pub async fn resolve_filter(
    users: &dyn UserDirectory,
    filter: &PostFilter,
) -> Result<PostCriteria, DomainError> {
    let mut criteria = PostCriteria::new(filter.page());

    if let Some(tag) = &filter.tag {
        let tag = non_blank("tag", tag)?;
        criteria = criteria.with(PostPredicate::HasTag(tag.to_string()));
    }
    if let Some(author) = &filter.author {
        let user = user_by_name(users, non_blank("author", author)?).await?;
        criteria = criteria.with(PostPredicate::AuthoredBy(user.id));
    }
    if let Some(favorited) = &filter.favorited {
        let user = user_by_name(users, non_blank("favorited", favorited)?).await?;
        criteria = criteria.with(PostPredicate::FavoritedBy(user.id));
    }

    Ok(criteria)
}

fn non_blank<'a>(field: &str, value: &'a str) -> Result<&'a str, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::Validation(format!(
            "{field} filter must not be blank"
        )));
    }
    Ok(value)
}

async fn user_by_name(users: &dyn UserDirectory, username: &str) -> Result<User, DomainError> {
    users
        .find_by_username(username)
        .await?
        .ok_or_else(|| DomainError::user_not_found(username))
}
