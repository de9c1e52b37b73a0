mod categories;
mod health;
mod posts;
mod visitors;

pub use categories::{
    create_category, create_child_category, delete_category, get_category, list_categories,
    patch_category, replace_category,
};
pub use health::health;
pub use posts::list_category_posts;
pub use visitors::visitor_summary;
