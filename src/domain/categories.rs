use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{CategoryId, CategoryRecord, UserId};
use crate::domain::error::DomainError;

/// Deepest nesting accepted when creating or moving categories.
pub const MAX_CATEGORY_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub id: CategoryId,
    pub title: String,
    pub parent_id: Option<CategoryId>,
    pub author_id: UserId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    /// Number of nodes in this subtree, including the node itself.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(CategoryNode::subtree_size).sum::<usize>()
    }
}

impl From<CategoryRecord> for CategoryNode {
    fn from(record: CategoryRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            parent_id: record.parent_id,
            author_id: record.author_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CategoryTreeError {
    #[error("category `{id}` references itself as a parent")]
    SelfParent { id: CategoryId },
    #[error("category `{child}` references missing parent `{parent}`")]
    MissingParent {
        child: CategoryId,
        parent: CategoryId,
    },
    #[error("duplicate category id `{id}` detected")]
    DuplicateId { id: CategoryId },
    #[error("category `{id}` is disconnected from any root")]
    Disconnected { id: CategoryId },
    #[error("category `{id}` could not be materialised while building tree")]
    MissingNode { id: CategoryId },
}

/// Build the full category forest. Roots are categories without a parent.
pub fn build_category_forest(
    records: Vec<CategoryRecord>,
) -> Result<Vec<CategoryNode>, CategoryTreeError> {
    assemble_forest(records, |record| record.parent_id.is_none())
}

/// Build the subtree rooted at `root_id` from the records of that subtree.
///
/// Every record other than the root must hang below it; anything else is
/// reported as disconnected rather than silently dropped.
pub fn build_category_subtree(
    records: Vec<CategoryRecord>,
    root_id: CategoryId,
) -> Result<CategoryNode, CategoryTreeError> {
    let mut roots = assemble_forest(records, |record| record.id == root_id)?;
    roots
        .pop()
        .ok_or(CategoryTreeError::MissingNode { id: root_id })
}

fn assemble_forest<F>(
    records: Vec<CategoryRecord>,
    is_root: F,
) -> Result<Vec<CategoryNode>, CategoryTreeError>
where
    F: Fn(&CategoryRecord) -> bool,
{
    let mut nodes: HashMap<CategoryId, CategoryNode> = HashMap::with_capacity(records.len());
    let mut children: HashMap<CategoryId, Vec<CategoryId>> = HashMap::new();
    let mut links: Vec<(CategoryId, CategoryId)> = Vec::new();
    let mut roots: Vec<CategoryId> = Vec::new();

    for record in records {
        if record.parent_id == Some(record.id) {
            return Err(CategoryTreeError::SelfParent { id: record.id });
        }

        if nodes.contains_key(&record.id) {
            return Err(CategoryTreeError::DuplicateId { id: record.id });
        }

        if is_root(&record) {
            roots.push(record.id);
        } else if let Some(parent_id) = record.parent_id {
            children.entry(parent_id).or_default().push(record.id);
            links.push((record.id, parent_id));
        }

        nodes.insert(record.id, CategoryNode::from(record));
    }

    for &(child, parent) in &links {
        if !nodes.contains_key(&parent) {
            return Err(CategoryTreeError::MissingParent { child, parent });
        }
    }

    roots.sort_unstable();
    for ids in children.values_mut() {
        ids.sort_unstable();
    }

    let mut forest = Vec::with_capacity(roots.len());
    for root_id in roots {
        forest.push(assemble(root_id, &mut nodes, &children)?);
    }

    if let Some(&id) = nodes.keys().min() {
        return Err(CategoryTreeError::Disconnected { id });
    }

    Ok(forest)
}

fn assemble(
    id: CategoryId,
    nodes: &mut HashMap<CategoryId, CategoryNode>,
    children: &HashMap<CategoryId, Vec<CategoryId>>,
) -> Result<CategoryNode, CategoryTreeError> {
    let mut node = nodes
        .remove(&id)
        .ok_or(CategoryTreeError::MissingNode { id })?;

    if let Some(child_ids) = children.get(&id) {
        for &child_id in child_ids {
            let child = assemble(child_id, nodes, children)?;
            node.children.push(child);
        }
    }

    Ok(node)
}

/// Materialized path of a category placed under `parent_path`.
pub fn child_path(parent_path: Option<&str>, id: CategoryId) -> String {
    match parent_path {
        Some(parent) => format!("{parent}{id}/"),
        None => format!("/{id}/"),
    }
}

pub fn path_depth(path: &str) -> usize {
    path.split('/').filter(|segment| !segment.is_empty()).count()
}

/// True when `path` equals `ancestor_path` or lies below it.
pub fn is_within(path: &str, ancestor_path: &str) -> bool {
    path.starts_with(ancestor_path)
}

/// Reject a parent that is the node itself or one of its descendants.
pub fn ensure_parent_allowed(
    node: &CategoryRecord,
    parent: &CategoryRecord,
) -> Result<(), DomainError> {
    if parent.id == node.id || is_within(&parent.path, &node.path) {
        return Err(DomainError::validation(
            "parent",
            format!(
                "category {} cannot be moved under itself or its descendant {}",
                node.id, parent.id
            ),
        ));
    }
    Ok(())
}

/// Reject placements that would push any node past [`MAX_CATEGORY_DEPTH`].
///
/// `subtree_height` is the number of levels below and including the moved node.
pub fn ensure_depth_allowed(
    parent_path: Option<&str>,
    subtree_height: usize,
) -> Result<(), DomainError> {
    let depth = parent_path.map(path_depth).unwrap_or(0) + subtree_height;
    if depth > MAX_CATEGORY_DEPTH {
        return Err(DomainError::validation(
            "parent",
            format!("category nesting is limited to {MAX_CATEGORY_DEPTH} levels"),
        ));
    }
    Ok(())
}
