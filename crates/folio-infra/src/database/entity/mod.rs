//! SeaORM entities.

pub mod comment;
pub mod favorite;
pub mod follow;
pub mod post;
pub mod user;
