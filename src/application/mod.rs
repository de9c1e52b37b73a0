//! Application services layer.

pub mod categories;
pub mod category_posts;
pub mod error;
pub mod pagination;
pub mod repos;
pub mod viewer;
pub mod visitors;
