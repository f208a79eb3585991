//! Folder Tree Arena
//!
//! A remote folder hierarchy represented as an arena of nodes addressed by
//! index, with parent *indices* rather than parent pointers — no cycles,
//! no shared ownership, cheap to hand across an FFI or UI boundary.

use bridge_traits::storage::RemoteEntry;

/// Index of a node inside a [`FolderTree`].
pub type NodeIndex = usize;

/// One node of the tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub entry: RemoteEntry,
    /// Parent index; `None` only for the root
    pub parent: Option<NodeIndex>,
    /// Child indices in insertion order
    pub children: Vec<NodeIndex>,
}

/// An arena-backed folder tree rooted at a single entry.
#[derive(Debug)]
pub struct FolderTree {
    nodes: Vec<TreeNode>,
}

impl FolderTree {
    /// Create a tree with the given root entry at index 0.
    pub fn new(root: RemoteEntry) -> Self {
        Self {
            nodes: vec![TreeNode {
                entry: root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The root node index.
    pub fn root(&self) -> NodeIndex {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: NodeIndex) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// Insert an entry under `parent` and return the new node's index.
    ///
    /// Returns `None` when the parent index is out of bounds.
    pub fn insert(&mut self, parent: NodeIndex, entry: RemoteEntry) -> Option<NodeIndex> {
        if parent >= self.nodes.len() {
            return None;
        }
        let index = self.nodes.len();
        self.nodes.push(TreeNode {
            entry,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(index);
        Some(index)
    }

    /// Indices of the direct children of a node.
    pub fn children_of(&self, index: NodeIndex) -> &[NodeIndex] {
        self.nodes
            .get(index)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// The `/`-joined name path from the root to a node (root name
    /// excluded).
    pub fn path_of(&self, index: NodeIndex) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.nodes.get(index)?;
        let mut cursor = index;

        while let Some(parent) = current.parent {
            names.push(current.entry.name.clone());
            cursor = parent;
            current = self.nodes.get(cursor)?;
        }

        names.reverse();
        Some(names.join("/"))
    }

    /// Depth-first iteration over all node indices, starting at the root.
    pub fn iter_depth_first(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(index) = stack.pop() {
            order.push(index);
            // Reverse so children come out in insertion order
            for &child in self.children_of(index).iter().rev() {
                stack.push(child);
            }
        }
        order
    }
}
