//! Stage 3: exact polygon boolean combination (union/intersect/difference/
//! xor/offset), hole/island nesting, and near-coincident-geometry cleanup.

pub mod engine;
pub mod polytree;
pub mod tangency;

pub use engine::{BooleanEngine, EndType, FillRule, JoinType};
pub use polytree::{execute_poly_tree, point_in_polygon, ClipType, PolyTree, PolyTreeNode};
pub use tangency::TangencyResolver;
