//! Folio cache layer.
//!
//! Listings are cached per entity type under `<prefix>:<entity>` keys and
//! dropped whenever any instance of that type is written:
//!
//! - [`CachedListings`] reads through the cache and fills it on a miss,
//!   tagging each entry with the entity generation it was loaded under.
//! - [`CacheInvalidator`] bumps `<prefix>:<entity>:generation` and deletes the
//!   entity-type key after a write.
//!
//! The backing [`CacheStore`] is Redis when `cache.redis_url` is configured and
//! an in-process map otherwise.

mod invalidator;
mod keys;
mod listing;
mod store;

pub use invalidator::CacheInvalidator;
pub use keys::{CacheKeys, EntityType};
pub use listing::CachedListings;
pub use store::{CacheError, CacheStore, MemoryCacheStore};
