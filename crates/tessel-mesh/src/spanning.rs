//! Breadth-first spanning tree over the triangle adjacency graph.
//!
//! The traversal order is the `.tri` encoding order: every non-root
//! triangle is written relative to the triangle it was discovered from.
//! Visited state and parent links are side tables indexed by triangle
//! position, so two distinct triangles with identical coordinates can
//! never be merged.

use std::collections::VecDeque;

use crate::adjacency::{AdjacencyTable, Face};
use crate::types::{MeshError, Triangle};

/// How a non-root triangle hangs off its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLink {
    /// Index of the triangle this one was discovered from.
    pub parent: usize,
    /// The shared edge in the parent's slot numbering.
    pub parent_face: Face,
    /// The shared edge in this triangle's slot numbering.
    pub child_face: Face,
}

/// One triangle in visitation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeNode {
    /// Index into the input triangle list.
    pub index: usize,
    /// `None` for the root.
    pub link: Option<TreeLink>,
    /// Number of neighbours first discovered from this triangle.
    pub children: usize,
}

/// The result of a breadth-first traversal from a root triangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanningTree {
    nodes: Vec<TreeNode>,
    root_adjacency: usize,
    total: usize,
}

impl SpanningTree {
    /// Traverse `triangles` breadth-first from `root`.
    ///
    /// Triangles are expected to be canonicalized already; the face
    /// numbers recorded here refer to the slot order as given.
    ///
    /// # Errors
    ///
    /// - [`MeshError::Empty`] if `triangles` is empty.
    /// - [`MeshError::RootOutOfBounds`] if `root` is not a valid index.
    /// - [`MeshError::DuplicateTriangle`] from the adjacency analysis.
    /// - [`MeshError::Disconnected`] if some triangle cannot be reached
    ///   from `root`.
    pub fn build(triangles: &[Triangle], root: usize) -> Result<Self, MeshError> {
        if triangles.is_empty() {
            return Err(MeshError::Empty);
        }
        if root >= triangles.len() {
            return Err(MeshError::RootOutOfBounds {
                root,
                len: triangles.len(),
            });
        }

        let table = AdjacencyTable::build(triangles)?;
        let tree = Self::traverse(&table, root);
        if tree.nodes.len() != tree.total {
            return Err(MeshError::Disconnected {
                reached: tree.nodes.len(),
                total: tree.total,
            });
        }
        Ok(tree)
    }

    /// Breadth-first walk over a prebuilt table. Only the component
    /// containing `root` is visited.
    fn traverse(table: &AdjacencyTable, root: usize) -> Self {
        let total = table.len();
        let mut visited = vec![false; total];
        let mut links: Vec<Option<TreeLink>> = vec![None; total];
        let mut nodes = Vec::with_capacity(total);
        let mut frontier = VecDeque::from([root]);
        visited[root] = true;

        while let Some(index) = frontier.pop_front() {
            let mut children = 0;
            for neighbor in table.neighbors(index) {
                if visited[neighbor.index] {
                    continue;
                }
                visited[neighbor.index] = true;
                links[neighbor.index] = Some(TreeLink {
                    parent: index,
                    parent_face: neighbor.edge.on_a,
                    child_face: neighbor.edge.on_b,
                });
                frontier.push_back(neighbor.index);
                children += 1;
            }
            nodes.push(TreeNode {
                index,
                link: links[index],
                children,
            });
        }

        Self {
            nodes,
            root_adjacency: table.adjacency_count(root),
            total,
        }
    }

    /// Nodes in visitation order; the first is the root.
    #[must_use]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &TreeNode {
        &self.nodes[0]
    }

    /// Number of triangles adjacent to the root in the whole set.
    #[must_use]
    pub const fn root_adjacency(&self) -> usize {
        self.root_adjacency
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false` for a successfully built tree.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Canonicalize every triangle in place (Y then X within each triangle).
pub fn canonicalize_all(triangles: &mut [Triangle]) {
    for triangle in triangles {
        triangle.canonicalize();
    }
}
