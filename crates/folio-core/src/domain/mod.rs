//! Domain entities - the core business objects.

mod comment;
mod post;
mod query;
mod user;

pub use comment::Comment;
pub use post::{NewPost, Post, PostChanges, PostDetail};
pub use query::{Page, PostCriteria, PostFilter, PostPage, PostPredicate};
pub use user::User;
