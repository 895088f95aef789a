//! PostgreSQL storage.

mod connections;

#[cfg(feature = "postgres")]
mod postgres_base;
#[cfg(feature = "postgres")]
pub mod postgres_repo;

#[cfg(feature = "postgres")]
pub mod entity;

pub use connections::DatabaseConfig;

#[cfg(feature = "postgres")]
pub use connections::connect;
#[cfg(feature = "postgres")]
pub use postgres_repo::{
    PostgresCommentRepository, PostgresFavoriteRepository, PostgresFollowGraph,
    PostgresPostRepository, PostgresUserDirectory,
};

#[cfg(feature = "postgres")]
use std::sync::Arc;

#[cfg(feature = "postgres")]
use folio_core::ports::Clock;
#[cfg(feature = "postgres")]
use folio_core::services::PostPorts;

/// Wire every post port to one PostgreSQL pool.
#[cfg(feature = "postgres")]
pub fn post_ports(db: sea_orm::DbConn, clock: Arc<dyn Clock>) -> PostPorts {
    PostPorts {
        posts: Arc::new(PostgresPostRepository::new(db.clone())),
        comments: Arc::new(PostgresCommentRepository::new(db.clone())),
        favorites: Arc::new(PostgresFavoriteRepository::new(db.clone())),
        users: Arc::new(PostgresUserDirectory::new(db.clone())),
        follows: Arc::new(PostgresFollowGraph::new(db)),
        clock,
    }
}
