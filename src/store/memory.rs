//! In-memory fragment store with a folder hierarchy.
//!
//! Folders live in one adjacency map `folder -> children`; a child is
//! a fragment label or another folder label. Parents are derived from
//! that map, so there is exactly one place to mutate.

use std::collections::HashSet;

use indexmap::IndexMap;
use ptree::TreeBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Fragment, FragmentStore, StoreError};

/// Label of the implicit root of `FolderTree`
pub const ROOT_LABEL: &str = "fragments";

/// Snapshot of the folder hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderTree
{
    pub label: String,
    pub is_folder: bool,
    pub children: Vec<FolderTree>,
}

impl FolderTree
{
    fn leaf(label: &str) -> Self
    {
        Self { label: label.to_string(), is_folder: false, children: Vec::new() }
    }

    /// Build a printable ptree, decorating labels with `paint`
    pub fn to_ptree<F>(
        &self,
        paint: F,
    ) -> ptree::item::StringItem
    where
        F: Fn(&FolderTree) -> String,
    {
        let mut builder = TreeBuilder::new(paint(self));
        add_children(&mut builder, &self.children, &paint);
        builder.build()
    }
}

fn add_children<F>(
    builder: &mut TreeBuilder,
    children: &[FolderTree],
    paint: &F,
) where
    F: Fn(&FolderTree) -> String,
{
    for child in children
    {
        if child
            .children
            .is_empty()
        {
            builder.add_empty_child(paint(child));
        }
        else
        {
            builder.begin_child(paint(child));
            add_children(builder, &child.children, paint);
            builder.end_child();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore
{
    fragments: IndexMap<String, Fragment>,
    folders: IndexMap<String, Vec<String>>,
}

impl MemoryStore
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Rebuild from persisted parts, dropping dangling child labels
    pub fn from_parts(
        fragments: impl IntoIterator<Item = Fragment>,
        folders: IndexMap<String, Vec<String>>,
    ) -> Self
    {
        let mut store = Self::new();
        for f in fragments
        {
            store
                .fragments
                .insert(f.label.clone(), f);
        }
        for label in folders.keys()
        {
            store
                .folders
                .insert(label.clone(), Vec::new());
        }
        for (label, children) in folders
        {
            let kept: Vec<String> = children
                .into_iter()
                .filter(|c| store.exists(c) && *c != label)
                .collect();
            if let Some(slot) = store
                .folders
                .get_mut(&label)
            {
                *slot = kept;
            }
        }
        store
    }

    /// Folder adjacency map in creation order
    pub fn folders(&self) -> &IndexMap<String, Vec<String>>
    {
        &self.folders
    }

    fn exists(
        &self,
        label: &str,
    ) -> bool
    {
        self.fragments
            .contains_key(label)
            || self
                .folders
                .contains_key(label)
    }

    /// Child → parent, derived from the adjacency map
    pub fn parents(&self) -> IndexMap<String, String>
    {
        let mut out = IndexMap::new();
        for (folder, children) in &self.folders
        {
            for child in children
            {
                out.entry(child.clone())
                    .or_insert_with(|| folder.clone());
            }
        }
        out
    }

    /// Create a folder; false if the label is taken.
    pub fn add_folder(
        &mut self,
        label: &str,
        parent: Option<&str>,
    ) -> Result<bool, StoreError>
    {
        if let Some(p) = parent
            && !self
                .folders
                .contains_key(p)
        {
            return Err(StoreError::Folder(format!("no folder named `{p}`")));
        }

        if self.exists(label)
        {
            return Ok(false);
        }

        self.folders
            .insert(label.to_string(), Vec::new());
        if let Some(children) = parent.and_then(|p| self.folders.get_mut(p))
        {
            children.push(label.to_string());
        }

        debug!(label, ?parent, "folder added");
        Ok(true)
    }

    /// Delete a folder; its children move into its parent (or to the
    /// top level). False if no such folder.
    pub fn delete_folder(
        &mut self,
        label: &str,
    ) -> bool
    {
        let Some(children) = self
            .folders
            .shift_remove(label)
        else
        {
            return false;
        };

        for siblings in self
            .folders
            .values_mut()
        {
            if let Some(pos) = siblings
                .iter()
                .position(|c| c == label)
            {
                siblings.splice(pos..=pos, children.iter().cloned());
                break;
            }
        }

        debug!(label, moved = children.len(), "folder deleted");
        true
    }

    /// Replace the children of `label`.
    ///
    /// Every child must exist and must not be `label` itself or one
    /// of its ancestors. A child keeps a single parent: it leaves any
    /// other folder it was in. Duplicates are dropped.
    pub fn set_children(
        &mut self,
        label: &str,
        children: &[String],
    ) -> Result<(), StoreError>
    {
        if !self
            .folders
            .contains_key(label)
        {
            return Err(StoreError::Folder(format!("no folder named `{label}`")));
        }

        let ancestors = self.ancestors(label);
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(children.len());

        for child in children
        {
            if !self.exists(child)
            {
                return Err(StoreError::Folder(format!("unknown label `{child}`")));
            }
            if child == label || ancestors.contains(child.as_str())
            {
                return Err(StoreError::Folder(format!(
                    "`{child}` cannot be placed inside `{label}`: it would form a cycle"
                )));
            }
            if seen.insert(child.clone())
            {
                kept.push(child.clone());
            }
        }

        for (folder, list) in &mut self.folders
        {
            if folder != label
            {
                list.retain(|c| !seen.contains(c));
            }
        }
        if let Some(slot) = self
            .folders
            .get_mut(label)
        {
            *slot = kept;
        }

        Ok(())
    }

    /// Labels of every folder above `label`
    fn ancestors(
        &self,
        label: &str,
    ) -> HashSet<String>
    {
        let parents = self.parents();
        let mut out = HashSet::new();
        let mut cur = label.to_string();

        while let Some(p) = parents.get(&cur)
        {
            if !out.insert(p.clone())
            {
                break;
            }
            cur = p.clone();
        }
        out
    }

    /// Hierarchy rooted at the implicit root folder. Entries that are
    /// nobody's child hang off the root: folders first, then
    /// fragments, each in store order.
    pub fn tree(&self) -> FolderTree
    {
        let parents = self.parents();
        let mut visited = HashSet::new();

        let top = self
            .folders
            .keys()
            .chain(self.fragments.keys())
            .filter(|l| !parents.contains_key(*l))
            .filter_map(|l| self.subtree(l, &mut visited))
            .collect();

        FolderTree { label: ROOT_LABEL.to_string(), is_folder: true, children: top }
    }

    fn subtree(
        &self,
        label: &str,
        visited: &mut HashSet<String>,
    ) -> Option<FolderTree>
    {
        if !visited.insert(label.to_string())
        {
            return None;
        }

        match self
            .folders
            .get(label)
        {
            Some(children) => Some(FolderTree {
                label: label.to_string(),
                is_folder: true,
                children: children
                    .iter()
                    .filter_map(|c| self.subtree(c, visited))
                    .collect(),
            }),
            None => Some(FolderTree::leaf(label)),
        }
    }
}

impl FragmentStore for MemoryStore
{
    fn fragments(&self) -> Vec<Fragment>
    {
        self.fragments
            .values()
            .cloned()
            .collect()
    }

    fn get(
        &self,
        label: &str,
    ) -> Option<Fragment>
    {
        self.fragments
            .get(label)
            .cloned()
    }

    fn add_fragment(
        &mut self,
        fragment: Fragment,
    ) -> bool
    {
        if fragment
            .label
            .is_empty()
            || self.exists(&fragment.label)
        {
            return false;
        }

        self.fragments
            .insert(fragment.label.clone(), fragment);
        true
    }

    fn update_fragment(
        &mut self,
        fragment: Fragment,
    ) -> bool
    {
        match self
            .fragments
            .get_mut(&fragment.label)
        {
            Some(slot) =>
            {
                *slot = fragment;
                true
            }
            None => false,
        }
    }

    fn delete_fragment(
        &mut self,
        label: &str,
    ) -> bool
    {
        if self
            .fragments
            .shift_remove(label)
            .is_none()
        {
            return false;
        }

        for children in self
            .folders
            .values_mut()
        {
            children.retain(|c| c != label);
        }
        true
    }
}
