//! A navigable directory tree rebuilt from the secondary table.

use std::collections::{HashMap, HashSet};

use crate::archive::ArcFile;
use crate::error::{ConsistencyWarning, FormatError, WarningKind};
use crate::hash::HashKey;
use crate::registry::HashRegistry;
use crate::secondary::SecondaryTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

#[derive(Debug, Clone)]
pub struct FsNode {
    pub id: usize,
    pub kind: NodeKind,
    pub path_hash: HashKey,
    pub parent_hash: HashKey,
    pub name_hash: HashKey,
    pub extension_hash: HashKey,
    pub path_text: Option<String>,
    pub parent_text: Option<String>,
    pub name_text: Option<String>,
    pub extension_text: Option<String>,
    pub display_name: String,
    pub display_path: String,
    pub child_count: usize,
    pub child_file_count: usize,
    pub child_directory_count: usize,
    child_start: usize,
    parent: Option<usize>,
    next_sibling: Option<usize>,
    first_child: Option<usize>,
}

impl FsNode {
    fn new(id: usize, kind: NodeKind) -> FsNode {
        FsNode {
            id,
            kind,
            path_hash: HashKey::EMPTY,
            parent_hash: HashKey::EMPTY,
            name_hash: HashKey::EMPTY,
            extension_hash: HashKey::EMPTY,
            path_text: None,
            parent_text: None,
            name_text: None,
            extension_text: None,
            display_name: String::new(),
            display_path: String::new(),
            child_count: 0,
            child_file_count: 0,
            child_directory_count: 0,
            child_start: 0,
            parent: None,
            next_sibling: None,
            first_child: None,
        }
    }

    #[inline(always)]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    #[inline(always)]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    #[inline(always)]
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    #[inline(always)]
    pub fn next_sibling(&self) -> Option<usize> {
        self.next_sibling
    }

    #[inline(always)]
    pub fn first_child(&self) -> Option<usize> {
        self.first_child
    }

    /// The `(template, wildcard length)` that would recover this node's
    /// missing text by brute force, if one applies.
    pub fn search_template(&self) -> Option<(String, usize)> {
        match self.kind {
            NodeKind::File if self.name_text.is_none() => {
                let ext = self.extension_text.as_deref()?;
                let len = (self.name_hash.len() as usize).checked_sub(ext.len() + 1)?;
                Some((format!("%s.{}", ext), len))
            }
            NodeKind::Directory if self.path_text.is_none() => {
                let parent = self.parent_text.as_deref()?;
                let len = (self.path_hash.len() as usize).checked_sub(parent.len() + 1)?;
                Some((format!("{}/%s", parent), len))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct FsTree {
    nodes: Vec<FsNode>,
    root: usize,
    by_path: HashMap<HashKey, usize>,
    warnings: Vec<ConsistencyWarning>,
}

impl FsTree {
    pub fn from_archive<R>(arc: &ArcFile<R>, registry: &HashRegistry) -> Result<FsTree, FormatError> {
        FsTree::build(&arc.secondary, registry)
    }

    pub fn build(secondary: &SecondaryTable, registry: &HashRegistry) -> Result<FsTree, FormatError> {
        let mut tree = FsTree::default();

        tree.import_directories(secondary);
        let entry_nodes = tree.import_entries(secondary, registry)?;
        tree.link_nodes(secondary, &entry_nodes)?;
        tree.populate_strings(registry);
        tree.set_display_names();

        tracing::debug!(
            nodes = tree.nodes.len(),
            warnings = tree.warnings.len(),
            "built filesystem tree"
        );

        Ok(tree)
    }

    fn import_directories(&mut self, secondary: &SecondaryTable) {
        for dir in secondary.directories() {
            let id = self.nodes.len();
            let mut node = FsNode::new(id, NodeKind::Directory);
            node.path_hash = dir.path;
            node.parent_hash = dir.parent;
            node.name_hash = dir.name;
            node.child_start = dir.entry_start as usize;
            node.child_count = dir.entry_count as usize;
            node.child_directory_count = dir.child_directory_count.get() as usize;
            node.child_file_count = dir.child_file_count.get() as usize;

            self.nodes.push(node);
            self.by_path.entry(dir.path).or_insert(id);
        }
    }

    /// Returns the node of each entry by entry index. Entries without a path
    /// have no node.
    fn import_entries(
        &mut self,
        secondary: &SecondaryTable,
        registry: &HashRegistry,
    ) -> Result<Vec<Option<usize>>, FormatError> {
        let mut entry_nodes = vec![None; secondary.entries().len()];

        for (index, entry) in secondary.entries().iter().enumerate() {
            if entry.path.is_empty() {
                continue;
            }

            if entry.is_directory() {
                let id = *self
                    .by_path
                    .get(&entry.path)
                    .ok_or(FormatError::UnknownDirectory {
                        index,
                        path: entry.path,
                    })?;

                let node = &self.nodes[id];
                if node.name_hash != entry.name || node.parent_hash != entry.parent {
                    let text = registry
                        .text(entry.path)
                        .map(str::to_string)
                        .unwrap_or_else(|| entry.path.to_string());
                    tracing::warn!(index, "importing hash mismatch: {}", text);
                    self.warnings.push(ConsistencyWarning {
                        kind: WarningKind::ImportMismatch,
                        key: entry.path,
                        text,
                        evicted: false,
                    });
                }

                entry_nodes[index] = Some(id);
            } else {
                let id = self.nodes.len();
                let mut node = FsNode::new(id, NodeKind::File);
                node.path_hash = entry.path;
                node.parent_hash = entry.parent;
                node.name_hash = entry.name;
                node.extension_hash = entry.extension;

                self.nodes.push(node);
                self.by_path.entry(entry.path).or_insert(id);
                entry_nodes[index] = Some(id);
            }
        }

        Ok(entry_nodes)
    }

    fn link_nodes(
        &mut self,
        secondary: &SecondaryTable,
        entry_nodes: &[Option<usize>],
    ) -> Result<(), FormatError> {
        let first_child = |node: &FsNode| {
            if node.child_count == 0 {
                None
            } else {
                entry_nodes.get(node.child_start).copied().flatten()
            }
        };

        for (index, id) in entry_nodes.iter().enumerate() {
            let id = match id {
                Some(id) => *id,
                None => continue,
            };

            let parent_hash = self.nodes[id].parent_hash;
            let parent = *self
                .by_path
                .get(&parent_hash)
                .filter(|&&p| self.nodes[p].is_dir())
                .ok_or(FormatError::UnknownParent {
                    index,
                    parent: parent_hash,
                })?;

            let next_sibling = secondary
                .entry_sibling(index)
                .and_then(|x| entry_nodes[x]);

            let node = &mut self.nodes[id];
            node.parent = Some(parent);
            node.next_sibling = next_sibling;
            if node.is_dir() {
                node.first_child = first_child(node);
            }
        }

        // The root is the only directory outside the entry array.
        let root = self
            .by_path
            .get(&HashKey::of("/"))
            .copied()
            .filter(|&x| self.nodes[x].is_dir())
            .ok_or(FormatError::MissingRoot)?;
        let node = &mut self.nodes[root];
        node.parent = None;
        node.first_child = first_child(node);
        self.root = root;

        Ok(())
    }

    fn populate_strings(&mut self, registry: &HashRegistry) {
        let text = |key: HashKey| registry.text(key).map(str::to_string);

        for node in &mut self.nodes {
            node.path_text = text(node.path_hash);
            node.parent_text = text(node.parent_hash);
            node.name_text = text(node.name_hash);
            if node.is_file() {
                node.extension_text = text(node.extension_hash);
            }
        }

        let root = &mut self.nodes[self.root];
        if root.path_text.is_none() {
            root.path_text = Some("/".to_string());
        }
    }

    fn set_display_names(&mut self) {
        let mut done = vec![false; self.nodes.len()];

        for id in 0..self.nodes.len() {
            let mut chain = Vec::new();
            let mut cur = Some(id);
            while let Some(c) = cur {
                if done[c] || chain.len() > self.nodes.len() {
                    break;
                }
                chain.push(c);
                cur = self.nodes[c].parent;
            }

            for c in chain.into_iter().rev() {
                let parent_display = self.nodes[c]
                    .parent
                    .filter(|&p| done[p])
                    .map(|p| self.nodes[p].display_path.clone());
                let node = &mut self.nodes[c];

                node.display_name = match &node.name_text {
                    Some(name) => name.clone(),
                    None => node.name_hash.to_string(),
                };

                node.display_path = match (&node.path_text, parent_display) {
                    (Some(path), _) => path.clone(),
                    (None, Some(parent)) => format!("{}/{}", parent, node.display_name),
                    (None, None) => node.display_name.clone(),
                };

                if node.is_file() && node.name_text.is_none() {
                    if let Some(ext) = &node.extension_text {
                        node.display_path.push_str(&format!("(*.{})", ext));
                    }
                }

                done[c] = true;
            }
        }
    }

    #[inline(always)]
    pub fn root(&self) -> &FsNode {
        &self.nodes[self.root]
    }

    #[inline(always)]
    pub fn node(&self, id: usize) -> Option<&FsNode> {
        self.nodes.get(id)
    }

    #[inline(always)]
    pub fn nodes(&self) -> &[FsNode] {
        &self.nodes
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Mismatches found while unifying directory entries with directories.
    #[inline(always)]
    pub fn warnings(&self) -> &[ConsistencyWarning] {
        &self.warnings
    }

    /// Node whose path checksum matches `path`.
    pub fn find(&self, path: &str) -> Option<&FsNode> {
        self.by_path
            .get(&HashKey::checked(path)?)
            .map(|&id| &self.nodes[id])
    }

    /// Direct children of `id`, in sibling order.
    pub fn children(&self, id: usize) -> impl Iterator<Item = &FsNode> + '_ {
        let mut next = self.nodes.get(id).and_then(|x| x.first_child);
        let mut remaining = self.nodes.len();

        std::iter::from_fn(move || {
            let id = next?;
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let node = &self.nodes[id];
            next = node.next_sibling;
            Some(node)
        })
    }

    /// Depth-first from the root, siblings pushed before children so a
    /// node's subtree is visited before its next sibling.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            tree: self,
            stack: if self.nodes.is_empty() {
                Vec::new()
            } else {
                vec![self.root]
            },
            visited: vec![false; self.nodes.len()],
        }
    }

    fn validate_node(&self, node: &FsNode) -> bool {
        if let (Some(ext), Some(name)) = (&node.extension_text, &node.name_text) {
            if !name.ends_with(ext.as_str()) {
                return false;
            }
        }

        if let (Some(name), Some(path)) = (&node.name_text, &node.path_text) {
            if !path.ends_with(name.as_str()) {
                return false;
            }
        }

        if let Some(path) = &node.path_text {
            let mut parent = node.parent;
            let mut hops = 0;

            // Stop before the root.
            while let Some(p) = parent {
                let ancestor = &self.nodes[p];
                if ancestor.parent.is_none() || hops > self.nodes.len() {
                    break;
                }
                if let Some(prefix) = &ancestor.path_text {
                    if !path.starts_with(prefix.as_str()) {
                        return false;
                    }
                }
                parent = ancestor.parent;
                hops += 1;
            }
        }

        true
    }

    /// Suffix and prefix checks for every reachable node.
    pub fn validate(&self) -> Vec<ConsistencyWarning> {
        self.iter()
            .filter(|node| !self.validate_node(node))
            .map(|node| {
                tracing::warn!(
                    path = ?node.path_text,
                    parent = ?node.parent_text,
                    name = ?node.name_text,
                    "invalid entry"
                );
                ConsistencyWarning {
                    kind: WarningKind::InvalidNode,
                    key: node.path_hash,
                    text: node.display_path.clone(),
                    evicted: false,
                }
            })
            .collect()
    }

    /// Distinct brute-force templates for nodes with missing text.
    pub fn search_templates(&self) -> Vec<(String, usize)> {
        let mut seen = HashSet::new();
        self.iter()
            .filter_map(FsNode::search_template)
            .filter(|x| seen.insert(x.clone()))
            .collect()
    }
}

pub struct Iter<'a> {
    tree: &'a FsTree,
    stack: Vec<usize>,
    visited: Vec<bool>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a FsNode;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.stack.pop()?;
            if std::mem::replace(&mut self.visited[id], true) {
                continue;
            }

            let node = &self.tree.nodes[id];
            if let Some(sibling) = node.next_sibling {
                self.stack.push(sibling);
            }
            if let Some(child) = node.first_child {
                self.stack.push(child);
            }
            return Some(node);
        }
    }
}
