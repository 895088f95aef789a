//! PostgreSQL repository implementations.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Query, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, Unchanged,
};
use uuid::Uuid;

use folio_core::domain::{Comment, Post, PostChanges, PostCriteria, PostPage, PostPredicate, User};
use folio_core::error::RepoError;
use folio_core::ports::{
    CommentRepository, FavoriteChange, FavoriteRepository, FollowGraph, PostRepository,
    UserDirectory,
};

use super::entity::comment::{self, Entity as CommentEntity};
use super::entity::favorite::{self, Entity as FavoriteEntity};
use super::entity::follow::{self, Entity as FollowEntity};
use super::entity::post::{self, Entity as PostEntity};
use super::entity::user::{self, Entity as UserEntity};
use super::postgres_base::{PostgresBaseRepository, db_err};

/// PostgreSQL post repository.
pub type PostgresPostRepository = PostgresBaseRepository<PostEntity>;

/// PostgreSQL comment repository.
pub type PostgresCommentRepository = PostgresBaseRepository<CommentEntity>;

/// PostgreSQL favorite ledger.
pub type PostgresFavoriteRepository = PostgresBaseRepository<FavoriteEntity>;

/// PostgreSQL user lookups.
pub type PostgresUserDirectory = PostgresBaseRepository<UserEntity>;

/// PostgreSQL follow-edge lookups.
pub type PostgresFollowGraph = PostgresBaseRepository<FollowEntity>;

/// Translate one predicate into a SQL condition on `posts`.
fn predicate_expr(predicate: &PostPredicate) -> SimpleExpr {
    match predicate {
        PostPredicate::HasTag(tag) => Expr::cust_with_values("? = ANY(tag_list)", [tag.clone()]),
        PostPredicate::AuthoredBy(author_id) => post::Column::AuthorId.eq(*author_id),
        PostPredicate::AuthoredByAny(author_ids) => {
            post::Column::AuthorId.is_in(author_ids.iter().copied())
        }
        PostPredicate::FavoritedBy(user_id) => post::Column::Id.in_subquery(
            Query::select()
                .column(favorite::Column::PostId)
                .from(FavoriteEntity)
                .and_where(favorite::Column::UserId.eq(*user_id))
                .to_owned(),
        ),
    }
}

/// Bump `updated_at` on a post; `NotFound` when the post is gone.
async fn touch_post<C>(db: &C, post_id: Uuid, at: DateTime<Utc>) -> Result<(), RepoError>
where
    C: ConnectionTrait,
{
    let result = PostEntity::update_many()
        .col_expr(post::Column::UpdatedAt, Expr::value(at))
        .filter(post::Column::Id.eq(post_id))
        .exec(db)
        .await
        .map_err(db_err)?;

    if result.rows_affected == 0 {
        return Err(RepoError::NotFound);
    }
    Ok(())
}

/// Load the post row with `FOR UPDATE` so the favorite check and counter
/// write below it are serialized per post.
async fn lock_post(txn: &DatabaseTransaction, post_id: Uuid) -> Result<post::Model, RepoError> {
    PostEntity::find_by_id(post_id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(db_err)?
        .ok_or(RepoError::NotFound)
}

async fn write_favorite_count(
    txn: &DatabaseTransaction,
    post_id: Uuid,
    favorite_count: i64,
    at: DateTime<Utc>,
) -> Result<post::Model, RepoError> {
    post::ActiveModel {
        id: Unchanged(post_id),
        favorite_count: Set(favorite_count),
        updated_at: Set(at.into()),
        ..Default::default()
    }
    .update(txn)
    .await
    .map_err(db_err)
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let result = PostEntity::find()
            .filter(post::Column::Slug.eq(slug))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(result.map(Into::into))
    }

    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        let model = post::ActiveModel::from(post)
            .insert(&self.db)
            .await
            .map_err(db_err)?;

        Ok(model.into())
    }

    async fn update(
        &self,
        post_id: Uuid,
        changes: PostChanges,
        at: DateTime<Utc>,
    ) -> Result<Post, RepoError> {
        let mut active = post::ActiveModel {
            id: Unchanged(post_id),
            updated_at: Set(at.into()),
            ..Default::default()
        };
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(body) = changes.body {
            active.body = Set(body);
        }
        if let Some(tag_list) = changes.tag_list {
            active.tag_list = Set(tag_list);
        }

        let model = active.update(&self.db).await.map_err(db_err)?;
        Ok(model.into())
    }

    async fn remove(&self, post_id: Uuid) -> Result<(), RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        CommentEntity::delete_many()
            .filter(comment::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        FavoriteEntity::delete_many()
            .filter(favorite::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        let result = PostEntity::delete_by_id(post_id)
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepoError::NotFound);
        }

        txn.commit().await.map_err(db_err)
    }

    async fn list(&self, criteria: &PostCriteria) -> Result<PostPage, RepoError> {
        let condition = criteria
            .predicates
            .iter()
            .fold(Condition::all(), |cond, predicate| {
                cond.add(predicate_expr(predicate))
            });
        let matching = PostEntity::find().filter(condition);

        let total_count = matching.clone().count(&self.db).await.map_err(db_err)?;

        let mut select = matching
            .order_by_desc(post::Column::CreatedAt)
            .order_by_asc(post::Column::Id);
        if criteria.page.offset > 0 {
            select = select.offset(criteria.page.offset);
        }
        if let Some(limit) = criteria.page.limit {
            select = select.limit(limit);
        }

        let posts = select.all(&self.db).await.map_err(db_err)?;
        tracing::debug!(total_count, returned = posts.len(), "Listed posts");

        Ok(PostPage {
            posts: posts.into_iter().map(Into::into).collect(),
            total_count,
        })
    }
}

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let result = CommentEntity::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }

    async fn add(&self, comment: Comment) -> Result<Comment, RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        touch_post(&txn, comment.post_id, comment.created_at).await?;
        let model = comment::ActiveModel::from(comment)
            .insert(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(model.into())
    }

    async fn remove_from_post(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let result = CommentEntity::delete_many()
            .filter(comment::Column::Id.eq(comment_id))
            .filter(comment::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Ok(false);
        }

        touch_post(&txn, post_id, at).await?;
        txn.commit().await.map_err(db_err)?;
        Ok(true)
    }
}

#[async_trait]
impl FavoriteRepository for PostgresFavoriteRepository {
    async fn add(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<FavoriteChange, RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let post = lock_post(&txn, post_id).await?;

        let existing = FavoriteEntity::find_by_id((user_id, post_id))
            .one(&txn)
            .await
            .map_err(db_err)?;
        if existing.is_some() {
            txn.commit().await.map_err(db_err)?;
            return Ok(FavoriteChange {
                post: post.into(),
                changed: false,
            });
        }

        favorite::ActiveModel {
            user_id: Set(user_id),
            post_id: Set(post_id),
            created_at: Set(at.into()),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;
        let post = write_favorite_count(&txn, post_id, post.favorite_count + 1, at).await?;

        txn.commit().await.map_err(db_err)?;
        Ok(FavoriteChange {
            post: post.into(),
            changed: true,
        })
    }

    async fn remove(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<FavoriteChange, RepoError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let post = lock_post(&txn, post_id).await?;

        let result = FavoriteEntity::delete_by_id((user_id, post_id))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            txn.commit().await.map_err(db_err)?;
            return Ok(FavoriteChange {
                post: post.into(),
                changed: false,
            });
        }

        let count = (post.favorite_count - 1).max(0);
        let post = write_favorite_count(&txn, post_id, count, at).await?;

        txn.commit().await.map_err(db_err)?;
        Ok(FavoriteChange {
            post: post.into(),
            changed: true,
        })
    }

    async fn contains(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError> {
        let edge = FavoriteEntity::find_by_id((user_id, post_id))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(edge.is_some())
    }

    async fn favorited_post_ids(
        &self,
        user_id: Uuid,
        post_ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, RepoError> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let edges = FavoriteEntity::find()
            .filter(favorite::Column::UserId.eq(user_id))
            .filter(favorite::Column::PostId.is_in(post_ids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(edges.into_iter().map(|edge| edge.post_id).collect())
    }

    async fn count_for_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        FavoriteEntity::find()
            .filter(favorite::Column::PostId.eq(post_id))
            .count(&self.db)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        tracing::debug!(%username, "Finding user by username");

        let result = UserEntity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(db_err)?;

        Ok(result.map(Into::into))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let result = UserEntity::find()
            .filter(user::Column::Id.is_in(ids.iter().copied()))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(result.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl FollowGraph for PostgresFollowGraph {
    async fn following_ids_of(&self, follower_id: Uuid) -> Result<HashSet<Uuid>, RepoError> {
        let edges = FollowEntity::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(edges.into_iter().map(|edge| edge.following_id).collect())
    }
}
