/*!
 * Device tree manager.
 *
 * Owns the root devices; everything else hangs off them. All mutation goes
 * through `insert` and `remove`, which are only ever called from the daemon's
 * event-processing task. Queries borrow the tree, so a view taken before a
 * removal cannot outlive it.
 *
 * Paths are only unique among siblings, so one path may name several nodes.
 * Lookups by path resolve to the first of them in pre-order.
 */
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use ldm_core::error::{Error, Result};

use crate::device::{DeviceAttribute, DeviceNode, DeviceType};

/// Chain of paths from a root down to a node, the node's own path last
type Position = Vec<String>;

/// The full device tree
#[derive(Debug, Default, Clone)]
pub struct DeviceTree {
    roots: BTreeMap<String, DeviceNode>,
    // every position each path is attached at
    index: HashMap<String, Vec<Position>>,
}

impl DeviceTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node: as a root when it has no parent, otherwise under the
    /// node its parent path names. A node already registered under the same
    /// path at that position is replaced along with its subtree.
    ///
    /// Returns the node as attached.
    pub fn insert(&mut self, node: DeviceNode) -> Result<&DeviceNode> {
        let mut position = match node.parent_path() {
            Some(parent_path) => self
                .position(parent_path)
                .cloned()
                .ok_or_else(|| Error::not_found(format!("parent device {}", parent_path)))?,
            None => Position::new(),
        };
        let depth = position.len();
        position.push(node.path().to_string());

        if let Some(old) = lookup(&self.roots, &position) {
            debug!(
                "Replacing {} ({} descendants dropped)",
                old.path(),
                old.descendant_count()
            );
            unindex_subtree(&mut self.index, &mut position.clone(), old);
        }

        let attached = if depth == 0 {
            attach_root(&mut self.roots, node)
        } else {
            let parent_path = &position[depth - 1];
            lookup_mut(&mut self.roots, &position[..depth])
                .ok_or_else(|| Error::not_found(format!("parent device {}", parent_path)))?
                .add_child(node)?
        };
        index_subtree(&mut self.index, &mut position, attached);
        Ok(attached)
    }

    /// Remove the node at `path`, wherever it sits, destroying its subtree.
    /// Returns `false` when no such node exists.
    pub fn remove(&mut self, path: &str) -> bool {
        self.take(path).is_some()
    }

    /// Detach the node at `path` and hand it back with its subtree
    pub fn take(&mut self, path: &str) -> Option<DeviceNode> {
        let mut position = self.position(path)?.clone();
        let depth = position.len() - 1;
        let taken = if depth == 0 {
            self.roots.remove(path)?
        } else {
            lookup_mut(&mut self.roots, &position[..depth])?.take_child(path)?
        };
        unindex_subtree(&mut self.index, &mut position, &taken);
        Some(taken)
    }

    /// Find a node anywhere in the tree
    pub fn get(&self, path: &str) -> Option<&DeviceNode> {
        lookup(&self.roots, self.position(path)?)
    }

    /// Whether a node with this path exists anywhere in the tree
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Parent of `node`, `None` for roots
    pub fn parent_of(&self, node: &DeviceNode) -> Option<&DeviceNode> {
        node.parent_path().and_then(|parent| self.get(parent))
    }

    /// The root registered under `path`
    pub fn root(&self, path: &str) -> Option<&DeviceNode> {
        self.roots.get(path)
    }

    /// Root devices, ordered by path
    pub fn roots(&self) -> Vec<&DeviceNode> {
        self.roots.values().collect()
    }

    /// Total number of nodes
    pub fn len(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }

    /// Whether the tree holds no devices
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Pre-order walk over every node, roots and siblings ordered by path
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: self.roots.values().rev().collect(),
        }
    }

    /// Top-most nodes whose subtree satisfies the type mask. Matching nodes
    /// are not descended into, but every other branch is searched.
    pub fn devices_with_type(&self, mask: DeviceType) -> Vec<&DeviceNode> {
        let mut found = Vec::new();
        let matches = |node: &DeviceNode| node.has_type(mask);
        collect_top_most(self.roots.values(), &matches, &mut found);
        found
    }

    /// Top-most nodes whose subtree satisfies the attribute mask
    pub fn devices_with_attribute(&self, mask: DeviceAttribute) -> Vec<&DeviceNode> {
        let mut found = Vec::new();
        let matches = |node: &DeviceNode| node.has_attribute(mask);
        collect_top_most(self.roots.values(), &matches, &mut found);
        found
    }

    // Positions order the same way as the pre-order walk
    fn position(&self, path: &str) -> Option<&Position> {
        self.index.get(path)?.iter().min()
    }
}

fn attach_root(roots: &mut BTreeMap<String, DeviceNode>, node: DeviceNode) -> &DeviceNode {
    match roots.entry(node.path().to_string()) {
        Entry::Occupied(mut slot) => {
            slot.insert(node);
            slot.into_mut()
        }
        Entry::Vacant(slot) => slot.insert(node),
    }
}

fn lookup<'a>(
    roots: &'a BTreeMap<String, DeviceNode>,
    position: &[String],
) -> Option<&'a DeviceNode> {
    let (root, rest) = position.split_first()?;
    rest.iter()
        .try_fold(roots.get(root)?, |node, path| node.get_child_by_path(path))
}

fn lookup_mut<'a>(
    roots: &'a mut BTreeMap<String, DeviceNode>,
    position: &[String],
) -> Option<&'a mut DeviceNode> {
    let (root, rest) = position.split_first()?;
    rest.iter()
        .try_fold(roots.get_mut(root)?, |node, path| node.child_mut(path))
}

fn index_subtree(
    index: &mut HashMap<String, Vec<Position>>,
    position: &mut Position,
    node: &DeviceNode,
) {
    index
        .entry(node.path().to_string())
        .or_default()
        .push(position.clone());
    for child in node.children() {
        position.push(child.path().to_string());
        index_subtree(index, position, child);
        position.pop();
    }
}

fn unindex_subtree(
    index: &mut HashMap<String, Vec<Position>>,
    position: &mut Position,
    node: &DeviceNode,
) {
    if let Some(positions) = index.get_mut(node.path()) {
        positions.retain(|p| p.as_slice() != position.as_slice());
        if positions.is_empty() {
            index.remove(node.path());
        }
    }
    for child in node.children() {
        position.push(child.path().to_string());
        unindex_subtree(index, position, child);
        position.pop();
    }
}

fn collect_top_most<'a, I>(
    nodes: I,
    matches: &dyn Fn(&DeviceNode) -> bool,
    out: &mut Vec<&'a DeviceNode>,
) where
    I: Iterator<Item = &'a DeviceNode>,
{
    for node in nodes {
        if matches(node) {
            out.push(node);
        } else {
            collect_top_most(node.children().into_iter(), matches, out);
        }
    }
}

/// Pre-order iterator over a [`DeviceTree`]
#[derive(Debug)]
pub struct Iter<'a> {
    stack: Vec<&'a DeviceNode>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a DeviceNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().into_iter().rev());
        Some(node)
    }
}

impl<'a> IntoIterator for &'a DeviceTree {
    type Item = &'a DeviceNode;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
