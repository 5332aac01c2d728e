//! Triangle adjacency: which triangles share an edge, and which vertex
//! slots that edge occupies on each side.
//!
//! ## Face numbering
//!
//! A triangle has three vertex slots `0, 1, 2`. An edge is a pair of
//! slots, and the pair is named by the sum of its slot indices:
//!
//! | slots  | sum | face |
//! |--------|-----|------|
//! | `0, 1` | 1   | 0    |
//! | `1, 2` | 3   | 1    |
//! | `0, 2` | 2   | 2    |
//!
//! The `.tri` format stores face numbers directly, so this table is
//! part of the wire contract.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{MeshError, Point, Triangle};

/// One of a triangle's three edges, named by the vertex slots it spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    /// Slots 0 and 1 (face 0).
    Edge01,
    /// Slots 1 and 2 (face 1).
    Edge12,
    /// Slots 0 and 2 (face 2).
    Edge02,
}

impl Face {
    /// All faces in index order.
    pub const ALL: [Self; 3] = [Self::Edge01, Self::Edge12, Self::Edge02];

    /// The face number stored on disk.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Edge01 => 0,
            Self::Edge12 => 1,
            Self::Edge02 => 2,
        }
    }

    /// Inverse of [`index`](Self::index).
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Edge01),
            1 => Some(Self::Edge12),
            2 => Some(Self::Edge02),
            _ => None,
        }
    }

    /// Map the sum of two distinct slot indices to the face they span.
    #[must_use]
    pub const fn from_slot_sum(sum: usize) -> Option<Self> {
        match sum {
            1 => Some(Self::Edge01),
            3 => Some(Self::Edge12),
            2 => Some(Self::Edge02),
            _ => None,
        }
    }

    /// The two vertex slots on this edge.
    #[must_use]
    pub const fn slots(self) -> [usize; 2] {
        match self {
            Self::Edge01 => [0, 1],
            Self::Edge12 => [1, 2],
            Self::Edge02 => [0, 2],
        }
    }

    /// The slot not on this edge: the vertex revealed when a traversal
    /// crosses this edge into the triangle.
    #[must_use]
    pub const fn opposite_slot(self) -> usize {
        match self {
            Self::Edge02 => 1,
            Self::Edge01 => 2,
            Self::Edge12 => 0,
        }
    }
}

/// The edge two adjacent triangles share, seen from each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedEdge {
    /// Face of the shared edge in the first triangle's slot numbering.
    pub on_a: Face,
    /// Face of the shared edge in the second triangle's slot numbering.
    pub on_b: Face,
}

impl SharedEdge {
    /// The same edge seen from the other side.
    #[must_use]
    pub const fn swapped(self) -> Self {
        Self {
            on_a: self.on_b,
            on_b: self.on_a,
        }
    }
}

/// Counts matching vertex pairs between `a` and `b` and accumulates the
/// matched slot indices on each side.
fn match_vertices(a: &Triangle, b: &Triangle) -> (usize, usize, usize) {
    let mut common = 0;
    let mut sum_a = 0;
    let mut sum_b = 0;
    for (i, pa) in a.vertices.iter().enumerate() {
        for (j, pb) in b.vertices.iter().enumerate() {
            if pa == pb {
                common += 1;
                sum_a += i;
                sum_b += j;
            }
        }
    }
    (common, sum_a, sum_b)
}

/// Decide whether `a` and `b` share exactly one edge.
///
/// Two triangles are adjacent iff exactly two of the nine vertex pairs
/// are equal. Triangles with repeated vertices can match two pairs on
/// the same slot; those slot sums do not name a face and the pair is
/// reported as not adjacent.
#[must_use]
pub fn adjacent(a: &Triangle, b: &Triangle) -> Option<SharedEdge> {
    let (common, sum_a, sum_b) = match_vertices(a, b);
    if common != 2 {
        return None;
    }
    Some(SharedEdge {
        on_a: Face::from_slot_sum(sum_a)?,
        on_b: Face::from_slot_sum(sum_b)?,
    })
}

/// A neighbour of some triangle in an [`AdjacencyTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// Index of the neighbouring triangle.
    pub index: usize,
    /// The shared edge; `on_a` is the owner's face, `on_b` the neighbour's.
    pub edge: SharedEdge,
}

/// Per-triangle neighbour lists over an arena of triangles.
///
/// Each list is ordered by ascending neighbour index, which is the
/// order a linear scan over the whole triangle list would find them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyTable {
    neighbors: Vec<Vec<Neighbor>>,
}

/// Undirected edge key: the two endpoints in a fixed order.
fn edge_key(p: Point, q: Point) -> (Point, Point) {
    if (p.y, p.x) <= (q.y, q.x) { (p, q) } else { (q, p) }
}

impl AdjacencyTable {
    /// Build the table for `triangles`.
    ///
    /// Candidate pairs are found through the edges they have in common
    /// and then confirmed with [`adjacent`].
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::DuplicateTriangle`] if two triangles share
    /// all three vertices.
    pub fn build(triangles: &[Triangle]) -> Result<Self, MeshError> {
        let mut by_edge: HashMap<(Point, Point), Vec<usize>> = HashMap::new();
        for (index, triangle) in triangles.iter().enumerate() {
            let [p0, p1, p2] = triangle.vertices;
            for (p, q) in [(p0, p1), (p1, p2), (p0, p2)] {
                let owners = by_edge.entry(edge_key(p, q)).or_default();
                if owners.last() != Some(&index) {
                    owners.push(index);
                }
            }
        }

        let mut neighbors: Vec<Vec<Neighbor>> = vec![Vec::new(); triangles.len()];
        for (index, triangle) in triangles.iter().enumerate() {
            let [p0, p1, p2] = triangle.vertices;
            let mut candidates: Vec<usize> = [(p0, p1), (p1, p2), (p0, p2)]
                .into_iter()
                .filter_map(|(p, q)| by_edge.get(&edge_key(p, q)))
                .flatten()
                .copied()
                .filter(|&other| other != index)
                .collect();
            candidates.sort_unstable();
            candidates.dedup();

            for other in candidates {
                let (common, _, _) = match_vertices(triangle, &triangles[other]);
                if common >= 3 {
                    return Err(MeshError::DuplicateTriangle {
                        first: index.min(other),
                        second: index.max(other),
                    });
                }
                if let Some(edge) = adjacent(triangle, &triangles[other]) {
                    neighbors[index].push(Neighbor { index: other, edge });
                }
            }
        }

        Ok(Self { neighbors })
    }

    /// Neighbours of triangle `index`, in ascending index order.
    #[must_use]
    pub fn neighbors(&self, index: usize) -> &[Neighbor] {
        self.neighbors.get(index).map_or(&[], Vec::as_slice)
    }

    /// Number of triangles adjacent to triangle `index`.
    #[must_use]
    pub fn adjacency_count(&self, index: usize) -> usize {
        self.neighbors(index).len()
    }

    /// Number of triangles in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Returns `true` if the table covers no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tri(a: (i32, i32), b: (i32, i32), c: (i32, i32)) -> Triangle {
        Triangle::new(
            Point::new(a.0, a.1),
            Point::new(b.0, b.1),
            Point::new(c.0, c.1),
        )
    }

    #[test]
    fn slot_sum_mapping_matches_wire_table() {
        assert_eq!(Face::from_slot_sum(1), Some(Face::Edge01));
        assert_eq!(Face::from_slot_sum(3), Some(Face::Edge12));
        assert_eq!(Face::from_slot_sum(2), Some(Face::Edge02));
        assert_eq!(Face::from_slot_sum(0), None);
        assert_eq!(Face::from_slot_sum(4), None);
    }

    #[test]
    fn opposite_slot_is_not_on_the_edge() {
        for face in Face::ALL {
            assert!(!face.slots().contains(&face.opposite_slot()));
            let sum: usize = face.slots().iter().sum();
            assert_eq!(Face::from_slot_sum(sum), Some(face));
        }
        assert_eq!(Face::Edge02.opposite_slot(), 1);
        assert_eq!(Face::Edge01.opposite_slot(), 2);
        assert_eq!(Face::Edge12.opposite_slot(), 0);
    }

    #[test]
    fn index_round_trips() {
        for face in Face::ALL {
            assert_eq!(Face::from_index(face.index()), Some(face));
        }
        assert_eq!(Face::from_index(3), None);
    }

    #[test]
    fn shared_edge_is_detected_with_faces() {
        // Shared edge (0,0)-(10,0): slots 0,1 on both.
        let a = tri((0, 0), (10, 0), (0, 10));
        let b = tri((0, 0), (10, 0), (5, -10));
        let edge = adjacent(&a, &b).unwrap();
        assert_eq!(edge.on_a, Face::Edge01);
        assert_eq!(edge.on_b, Face::Edge01);
    }

    #[test]
    fn faces_follow_slot_positions() {
        // a: shared points at slots 1 and 2 -> face 1.
        // b: shared points at slots 0 and 2 -> face 2.
        let a = tri((9, 9), (0, 0), (10, 0));
        let b = tri((0, 0), (5, -10), (10, 0));
        let edge = adjacent(&a, &b).unwrap();
        assert_eq!(edge.on_a, Face::Edge12);
        assert_eq!(edge.on_b, Face::Edge02);
    }

    #[test]
    fn adjacency_is_symmetric() {
        let a = tri((9, 9), (0, 0), (10, 0));
        let b = tri((0, 0), (5, -10), (10, 0));
        assert_eq!(adjacent(&b, &a), adjacent(&a, &b).map(SharedEdge::swapped));
    }

    #[test]
    fn single_shared_vertex_is_not_adjacent() {
        let a = tri((0, 0), (10, 0), (0, 10));
        let b = tri((0, 0), (-10, 0), (0, -10));
        assert_eq!(adjacent(&a, &b), None);
    }

    #[test]
    fn identical_triangles_are_not_adjacent() {
        let a = tri((0, 0), (10, 0), (0, 10));
        assert_eq!(adjacent(&a, &a), None);
    }

    #[test]
    fn table_lists_neighbors_in_index_order() {
        // A fan of three triangles around the edge-sharing centre one.
        let triangles = [
            tri((0, 0), (10, 0), (5, 10)),   // 0: centre
            tri((0, 0), (5, 10), (-5, 10)),  // 1: shares (0,0)-(5,10)
            tri((10, 0), (5, 10), (15, 10)), // 2: shares (10,0)-(5,10)
            tri((0, 0), (10, 0), (5, -10)),  // 3: shares (0,0)-(10,0)
        ];
        let table = AdjacencyTable::build(&triangles).unwrap();
        let indices: Vec<usize> = table.neighbors(0).iter().map(|n| n.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(table.adjacency_count(0), 3);
        assert_eq!(table.adjacency_count(1), 1);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn table_matches_brute_force_scan() {
        let triangles = [
            tri((0, 0), (10, 0), (0, 10)),
            tri((10, 0), (10, 10), (0, 10)),
            tri((10, 0), (20, 0), (10, 10)),
            tri((20, 0), (20, 10), (10, 10)),
        ];
        let table = AdjacencyTable::build(&triangles).unwrap();
        for (i, a) in triangles.iter().enumerate() {
            let expected: Vec<Neighbor> = triangles
                .iter()
                .enumerate()
                .filter_map(|(j, b)| adjacent(a, b).map(|edge| Neighbor { index: j, edge }))
                .collect();
            assert_eq!(table.neighbors(i), expected.as_slice(), "triangle {i}");
        }
    }

    #[test]
    fn duplicate_triangles_are_rejected() {
        let triangles = [
            tri((0, 0), (10, 0), (0, 10)),
            tri((10, 0), (10, 10), (0, 10)),
            tri((0, 10), (0, 0), (10, 0)),
        ];
        assert_eq!(
            AdjacencyTable::build(&triangles),
            Err(MeshError::DuplicateTriangle {
                first: 0,
                second: 2
            }),
        );
    }

    #[test]
    fn out_of_range_index_has_no_neighbors() {
        let table = AdjacencyTable::build(&[]).unwrap();
        assert!(table.is_empty());
        assert!(table.neighbors(7).is_empty());
    }
}
