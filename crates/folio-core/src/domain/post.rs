use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Comment;

/// Post entity - the aggregate root for comments and favorites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    /// External lookup key, fixed at creation.
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tag_list: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Cached number of favorite edges pointing at this post.
    pub favorite_count: i64,
    pub author_id: Uuid,
}

/// Fields accepted when creating a post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub description: Option<String>,
    pub body: Option<String>,
    pub tag_list: Option<Vec<String>>,
}

/// Partial update; only `Some` fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub tag_list: Option<Vec<String>>,
}

impl Post {
    /// Build a fresh post with defaults applied.
    pub fn new(author_id: Uuid, slug: String, input: NewPost, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            slug,
            title: input.title,
            description: input.description.unwrap_or_default(),
            body: input.body.unwrap_or_default(),
            tag_list: input.tag_list.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            favorite_count: 0,
            author_id,
        }
    }

    /// Merge `changes` onto this post. The slug is left untouched even when
    /// the title changes.
    pub fn apply(&mut self, changes: PostChanges, now: DateTime<Utc>) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(body) = changes.body {
            self.body = body;
        }
        if let Some(tag_list) = changes.tag_list {
            self.tag_list = tag_list;
        }
        self.updated_at = now;
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_list.iter().any(|t| t == tag)
    }
}

/// A post together with its ordered comment collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>) -> Post {
        Post::new(
            Uuid::new_v4(),
            "hello-world-abc123".to_string(),
            NewPost {
                title: "Hello World".to_string(),
                ..Default::default()
            },
            now,
        )
    }

    #[test]
    fn test_new_post_defaults() {
        let now = Utc::now();
        let post = sample(now);

        assert_eq!(post.description, "");
        assert_eq!(post.body, "");
        assert!(post.tag_list.is_empty());
        assert_eq!(post.favorite_count, 0);
        assert_eq!(post.created_at, post.updated_at);
    }

    #[test]
    fn test_apply_only_touches_supplied_fields() {
        let created = Utc::now();
        let mut post = sample(created);
        let later = created + chrono::TimeDelta::seconds(5);

        post.apply(
            PostChanges {
                title: Some("Renamed".to_string()),
                tag_list: Some(vec!["rust".to_string()]),
                ..Default::default()
            },
            later,
        );

        assert_eq!(post.title, "Renamed");
        assert_eq!(post.slug, "hello-world-abc123");
        assert_eq!(post.body, "");
        assert!(post.has_tag("rust"));
        assert_eq!(post.updated_at, later);
        assert_eq!(post.created_at, created);
    }
}
