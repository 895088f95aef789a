//! In-memory storage - used when no database is configured, and by tests.
//!
//! Every port is backed by one `RwLock`, so each write operation is atomic
//! with respect to every other. Data is lost on process restart.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use folio_core::domain::{Comment, Post, PostChanges, PostCriteria, PostPage, PostPredicate, User};
use folio_core::error::RepoError;
use folio_core::ports::{
    BaseRepository, Clock, CommentRepository, FavoriteChange, FavoriteRepository, FollowGraph,
    PostRepository, UserDirectory,
};
use folio_core::services::PostPorts;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    /// (follower, following)
    follows: HashSet<(Uuid, Uuid)>,
    posts: HashMap<Uuid, Post>,
    /// Comment arena in insertion order; `post_id` is the owner.
    comments: Vec<Comment>,
    /// (user, post) -> favorited at
    favorites: HashMap<(Uuid, Uuid), DateTime<Utc>>,
}

impl State {
    fn matches(&self, post: &Post, predicate: &PostPredicate) -> bool {
        match predicate {
            PostPredicate::HasTag(tag) => post.has_tag(tag),
            PostPredicate::AuthoredBy(author_id) => post.author_id == *author_id,
            PostPredicate::AuthoredByAny(author_ids) => author_ids.contains(&post.author_id),
            PostPredicate::FavoritedBy(user_id) => {
                self.favorites.contains_key(&(*user_id, post.id))
            }
        }
    }

    fn post_mut(&mut self, post_id: Uuid) -> Result<&mut Post, RepoError> {
        self.posts.get_mut(&post_id).ok_or(RepoError::NotFound)
    }
}

/// In-memory implementation of every storage port.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user. Usernames are unique.
    pub async fn insert_user(&self, user: User) -> Result<User, RepoError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(RepoError::Constraint(format!(
                "username {} already taken",
                user.username
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Record that `follower_id` follows `following_id`.
    pub async fn follow(&self, follower_id: Uuid, following_id: Uuid) {
        let mut state = self.state.write().await;
        state.follows.insert((follower_id, following_id));
    }

    /// Wire every post port to this store.
    pub fn post_ports(self: &Arc<Self>, clock: Arc<dyn Clock>) -> PostPorts {
        PostPorts {
            posts: Arc::clone(self) as Arc<dyn PostRepository>,
            comments: Arc::clone(self) as Arc<dyn CommentRepository>,
            favorites: Arc::clone(self) as Arc<dyn FavoriteRepository>,
            users: Arc::clone(self) as Arc<dyn UserDirectory>,
            follows: Arc::clone(self) as Arc<dyn FollowGraph>,
            clock,
        }
    }
}

#[async_trait]
impl BaseRepository<User, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, RepoError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FollowGraph for InMemoryStore {
    async fn following_ids_of(&self, follower_id: Uuid) -> Result<HashSet<Uuid>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .follows
            .iter()
            .filter(|(follower, _)| *follower == follower_id)
            .map(|(_, following)| *following)
            .collect())
    }
}

#[async_trait]
impl BaseRepository<Post, Uuid> for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
        Ok(self.state.read().await.posts.get(&id).cloned())
    }
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Post>, RepoError> {
        let state = self.state.read().await;
        Ok(state.posts.values().find(|p| p.slug == slug).cloned())
    }

    async fn insert(&self, post: Post) -> Result<Post, RepoError> {
        let mut state = self.state.write().await;
        if state.posts.contains_key(&post.id) {
            return Err(RepoError::Constraint(format!("post id {} exists", post.id)));
        }
        if state.posts.values().any(|p| p.slug == post.slug) {
            return Err(RepoError::Constraint(format!("slug {} exists", post.slug)));
        }
        if !state.users.contains_key(&post.author_id) {
            return Err(RepoError::ForeignKey(format!(
                "author {} does not exist",
                post.author_id
            )));
        }
        state.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update(
        &self,
        post_id: Uuid,
        changes: PostChanges,
        at: DateTime<Utc>,
    ) -> Result<Post, RepoError> {
        let mut state = self.state.write().await;
        let post = state.post_mut(post_id)?;
        post.apply(changes, at);
        Ok(post.clone())
    }

    async fn remove(&self, post_id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        state.posts.remove(&post_id).ok_or(RepoError::NotFound)?;
        state.comments.retain(|c| c.post_id != post_id);
        state.favorites.retain(|(_, post), _| *post != post_id);
        Ok(())
    }

    async fn list(&self, criteria: &PostCriteria) -> Result<PostPage, RepoError> {
        let state = self.state.read().await;
        let mut matching: Vec<Post> = state
            .posts
            .values()
            .filter(|post| {
                criteria
                    .predicates
                    .iter()
                    .all(|predicate| state.matches(post, predicate))
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total_count = matching.len() as u64;
        Ok(PostPage {
            posts: criteria.page.slice(matching),
            total_count,
        })
    }
}

#[async_trait]
impl CommentRepository for InMemoryStore {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Comment>, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn add(&self, comment: Comment) -> Result<Comment, RepoError> {
        let mut state = self.state.write().await;
        state.post_mut(comment.post_id)?.updated_at = comment.created_at;
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn remove_from_post(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.write().await;
        let Some(index) = state
            .comments
            .iter()
            .position(|c| c.id == comment_id && c.post_id == post_id)
        else {
            return Ok(false);
        };

        state.comments.remove(index);
        state.post_mut(post_id)?.updated_at = at;
        Ok(true)
    }
}

#[async_trait]
impl FavoriteRepository for InMemoryStore {
    async fn add(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<FavoriteChange, RepoError> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&post_id) {
            return Err(RepoError::NotFound);
        }

        let changed = !state.favorites.contains_key(&(user_id, post_id));
        if changed {
            state.favorites.insert((user_id, post_id), at);
        }

        let post = state.post_mut(post_id)?;
        if changed {
            post.favorite_count += 1;
            post.updated_at = at;
        }
        Ok(FavoriteChange {
            post: post.clone(),
            changed,
        })
    }

    async fn remove(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<FavoriteChange, RepoError> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&post_id) {
            return Err(RepoError::NotFound);
        }

        let changed = state.favorites.remove(&(user_id, post_id)).is_some();

        let post = state.post_mut(post_id)?;
        if changed {
            post.favorite_count = (post.favorite_count - 1).max(0);
            post.updated_at = at;
        }
        Ok(FavoriteChange {
            post: post.clone(),
            changed,
        })
    }

    async fn contains(&self, user_id: Uuid, post_id: Uuid) -> Result<bool, RepoError> {
        let state = self.state.read().await;
        Ok(state.favorites.contains_key(&(user_id, post_id)))
    }

    async fn favorited_post_ids(
        &self,
        user_id: Uuid,
        post_ids: &[Uuid],
    ) -> Result<HashSet<Uuid>, RepoError> {
        let state = self.state.read().await;
        Ok(post_ids
            .iter()
            .copied()
            .filter(|post_id| state.favorites.contains_key(&(user_id, *post_id)))
            .collect())
    }

    async fn count_for_post(&self, post_id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.read().await;
        Ok(state
            .favorites
            .keys()
            .filter(|(_, post)| *post == post_id)
            .count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use folio_core::domain::NewPost;
    use folio_core::ports::SystemClock;
    use folio_core::{DomainError, PostService, PostServiceConfig};

    use super::*;

    async fn seeded() -> (Arc<InMemoryStore>, PostService, User) {
        let store = Arc::new(InMemoryStore::new());
        let alice = store
            .insert_user(User::new("alice".into(), "alice@example.com".into()))
            .await
            .unwrap();
        let service = PostService::new(
            store.post_ports(Arc::new(SystemClock)),
            PostServiceConfig::default(),
        );
        (store, service, alice)
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let (store, _, _) = seeded().await;
        let result = store
            .insert_user(User::new("alice".into(), "other@example.com".into()))
            .await;

        assert!(matches!(result, Err(RepoError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_insert_rejects_taken_slug() {
        let (store, _, alice) = seeded().await;
        let now = Utc::now();
        let input = NewPost {
            title: "Same".into(),
            ..Default::default()
        };
        let first = Post::new(alice.id, "same-slug".into(), input.clone(), now);
        let second = Post::new(alice.id, "same-slug".into(), input, now);

        PostRepository::insert(store.as_ref(), first).await.unwrap();
        let result = PostRepository::insert(store.as_ref(), second).await;

        assert!(matches!(result, Err(RepoError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_insert_rejects_missing_author_as_foreign_key() {
        let (store, _, _) = seeded().await;
        let orphan = Post::new(
            Uuid::new_v4(),
            "orphan".into(),
            NewPost {
                title: "Orphan".into(),
                ..Default::default()
            },
            Utc::now(),
        );

        let result = PostRepository::insert(store.as_ref(), orphan).await;

        assert!(matches!(result, Err(RepoError::ForeignKey(_))));
    }

    #[tokio::test]
    async fn test_batch_lookups_skip_unknown_ids() {
        let (store, service, alice) = seeded().await;
        let bob = store
            .insert_user(User::new("bob".into(), "bob@example.com".into()))
            .await
            .unwrap();
        let mut posts = Vec::new();
        for title in ["One", "Two", "Three"] {
            let input = NewPost {
                title: title.into(),
                ..Default::default()
            };
            posts.push(service.create(alice.id, input).await.unwrap());
        }
        service.favorite(bob.id, &posts[0].slug).await.unwrap();
        service.favorite(bob.id, &posts[2].slug).await.unwrap();

        let mut post_ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();
        post_ids.push(Uuid::new_v4());
        let favorited = store.favorited_post_ids(bob.id, &post_ids).await.unwrap();
        assert_eq!(favorited, HashSet::from([posts[0].id, posts[2].id]));

        let users = store
            .find_by_ids(&[alice.id, Uuid::new_v4(), bob.id])
            .await
            .unwrap();
        let mut names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        names.sort();
        assert_eq!(names, ["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_verify_count_surfaces_divergence() {
        let (store, service, alice) = seeded().await;
        let post = service
            .create(
                alice.id,
                NewPost {
                    title: "Counted".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service.favorite(alice.id, &post.slug).await.unwrap();
        assert!(service.verify_favorite_count(&post.slug).await.is_ok());

        store
            .state
            .write()
            .await
            .posts
            .get_mut(&post.id)
            .unwrap()
            .favorite_count = 5;

        let err = service.verify_favorite_count(&post.slug).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::ConsistencyViolation {
                counter: 5,
                edges: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_remove_post_drops_children() {
        let (store, service, alice) = seeded().await;
        let post = service
            .create(
                alice.id,
                NewPost {
                    title: "Doomed".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        service.add_comment(&post.slug, "bye").await.unwrap();
        service.favorite(alice.id, &post.slug).await.unwrap();

        service.delete(&post.slug).await.unwrap();

        let state = store.state.read().await;
        assert!(state.posts.is_empty());
        assert!(state.comments.is_empty());
        assert!(state.favorites.is_empty());
    }
}
