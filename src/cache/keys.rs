//! Cache key definitions.
//!
//! Keys are derived from the entity type alone: a write to any instance of a
//! type invalidates every cached listing of that type.

use std::fmt;

/// Entity types whose listings are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Category,
    VisitRecord,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Category => "category",
            EntityType::VisitRecord => "visit_record",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, entity: EntityType) -> String {
        if self.prefix.is_empty() {
            entity.as_str().to_string()
        } else {
            format!("{}:{}", self.prefix, entity.as_str())
        }
    }

    /// Counter bumped on every invalidation of `entity`.
    pub fn generation_key(&self, entity: EntityType) -> String {
        format!("{}:generation", self.key(entity))
    }
}
