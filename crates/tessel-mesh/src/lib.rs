//! tessel-mesh: triangle mesh data model and adjacency analysis (sans-IO).
//!
//! Holds the types shared by every tessel crate (points, triangles,
//! colors) and the two graph passes the `.tri` codec is built on:
//!
//! - [`adjacency`]: which triangles share exactly one edge, and which
//!   vertex slots ("faces") that edge occupies on each side.
//! - [`spanning`]: a breadth-first spanning tree over that adjacency
//!   graph, which fixes the encoding order.
//!
//! This crate has **no I/O dependencies**.

pub mod adjacency;
pub mod spanning;
pub mod types;

pub use adjacency::{AdjacencyTable, Face, Neighbor, SharedEdge, adjacent};
pub use spanning::{SpanningTree, TreeLink, TreeNode, canonicalize_all};
pub use types::{
    Color, ColoredTriangle, Dimensions, MeshError, NormPoint, Point, Rgb8, Triangle,
};
