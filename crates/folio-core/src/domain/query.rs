use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Post;

/// Listing options accepted from callers. Every field is optional and the
/// present ones are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilter {
    /// Keep posts whose tag list contains this exact tag.
    pub tag: Option<String>,
    /// Keep posts written by the user with this username.
    pub author: Option<String>,
    /// Keep posts favorited by the user with this username.
    pub favorited: Option<String>,
    /// Page size; `None` means unbounded.
    pub limit: Option<u64>,
    /// Rows to skip; `None` means 0.
    pub offset: Option<u64>,
}

impl PostFilter {
    pub fn page(&self) -> Page {
        Page {
            limit: self.limit,
            offset: self.offset.unwrap_or(0),
        }
    }
}

/// Pagination window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u64>,
    pub offset: u64,
}

impl Page {
    /// Cut an already ordered sequence down to this window.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let skipped = items.into_iter().skip(self.offset as usize);
        match self.limit {
            Some(limit) => skipped.take(limit as usize).collect(),
            None => skipped.collect(),
        }
    }
}

/// A single resolved restriction on the post listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostPredicate {
    HasTag(String),
    AuthoredBy(Uuid),
    AuthoredByAny(Vec<Uuid>),
    FavoritedBy(Uuid),
}

/// Predicates (ANDed) plus pagination, with usernames already resolved to
/// ids. Storage adapters fold the predicates into their own query form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostCriteria {
    pub predicates: Vec<PostPredicate>,
    pub page: Page,
}

impl PostCriteria {
    pub fn new(page: Page) -> Self {
        Self {
            predicates: Vec::new(),
            page,
        }
    }

    pub fn with(mut self, predicate: PostPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

/// One page of posts and the number of matches before pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub total_count: u64,
}

impl PostPage {
    pub fn empty() -> Self {
        Self::default()
    }
}
