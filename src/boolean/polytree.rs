//! Hierarchical hole/island nesting on top of the Boolean Engine's flat
//! path results. Nesting is a pure containment query, so it is built once
//! here rather than depending on whatever internal tree type the clipping
//! backend happens to expose.

use crate::error::Result;
use crate::geometry::{Path, Point};

use super::engine::{BooleanEngine, FillRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipType {
    Union,
    Intersection,
    Difference,
    Xor,
}

#[derive(Debug, Clone)]
pub struct PolyTreeNode {
    pub path: Path,
    pub is_hole: bool,
    pub children: Vec<PolyTreeNode>,
}

#[derive(Debug, Clone, Default)]
pub struct PolyTree {
    pub roots: Vec<PolyTreeNode>,
}

impl PolyTree {
    /// Flatten back to the outer-contour-plus-hole-labeled shape the
    /// Offset Generator and Toolpath Compiler consume.
    pub fn flatten(&self) -> Vec<(Path, bool)> {
        let mut out = Vec::new();
        for root in &self.roots {
            flatten_node(root, &mut out);
        }
        out
    }
}

fn flatten_node(node: &PolyTreeNode, out: &mut Vec<(Path, bool)>) {
    out.push((node.path.clone(), node.is_hole));
    for child in &node.children {
        flatten_node(child, out);
    }
}

pub fn execute_poly_tree(
    engine: &BooleanEngine,
    subjects: &[Path],
    clips: &[Path],
    clip_type: ClipType,
    fill_rule: FillRule,
) -> Result<PolyTree> {
    let flat = match clip_type {
        ClipType::Union => engine.union(subjects, clips, fill_rule)?,
        ClipType::Intersection => engine.intersect(subjects, clips, fill_rule)?,
        ClipType::Difference => engine.difference(subjects, clips, fill_rule)?,
        ClipType::Xor => engine.xor(subjects, clips, fill_rule)?,
    };
    Ok(build_poly_tree(flat))
}

fn build_poly_tree(mut paths: Vec<Path>) -> PolyTree {
    paths.sort_by(|a, b| {
        b.signed_area()
            .abs()
            .partial_cmp(&a.signed_area().abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut tree = PolyTree::default();
    for path in paths {
        let probe = match path.points.first() {
            Some(p) => *p,
            None => continue,
        };
        let node = PolyTreeNode {
            path,
            is_hole: false,
            children: Vec::new(),
        };
        if !try_insert(&mut tree.roots, node.clone(), probe, false) {
            tree.roots.push(node);
        }
    }
    tree
}

/// Attempt to place `node` as a descendant of the deepest existing node
/// whose contour contains `probe`. Returns true if placed.
fn try_insert(siblings: &mut Vec<PolyTreeNode>, mut node: PolyTreeNode, probe: Point, parent_is_hole: bool) -> bool {
    for existing in siblings.iter_mut() {
        if point_in_polygon(probe, &existing.path) {
            if try_insert(&mut existing.children, node.clone(), probe, existing.is_hole) {
                return true;
            }
            node.is_hole = !existing.is_hole;
            existing.children.push(node);
            return true;
        }
    }
    let _ = parent_is_hole;
    false
}

/// Even-odd ray-casting point-in-polygon test.
pub fn point_in_polygon(point: Point, path: &Path) -> bool {
    let n = path.points.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = path.points[i];
        let pj = path.points[j];
        let intersects = (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, side: f64) -> Path {
        Path::new(
            vec![
                Point::new(x, y),
                Point::new(x + side, y),
                Point::new(x + side, y + side),
                Point::new(x, y + side),
            ],
            true,
        )
    }

    #[test]
    fn point_in_polygon_detects_containment() {
        let sq = square(0.0, 0.0, 10.0);
        assert!(point_in_polygon(Point::new(5.0, 5.0), &sq));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &sq));
    }

    #[test]
    fn nested_square_becomes_a_hole_child() {
        let outer = square(0.0, 0.0, 10.0);
        let inner = square(2.0, 2.0, 3.0);
        let tree = build_poly_tree(vec![outer, inner]);
        assert_eq!(tree.roots.len(), 1);
        assert!(!tree.roots[0].is_hole);
        assert_eq!(tree.roots[0].children.len(), 1);
        assert!(tree.roots[0].children[0].is_hole);
    }

    #[test]
    fn disjoint_squares_are_both_roots() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(100.0, 100.0, 1.0);
        let tree = build_poly_tree(vec![a, b]);
        assert_eq!(tree.roots.len(), 2);
        assert!(tree.roots.iter().all(|r| !r.is_hole));
    }

    #[test]
    fn triply_nested_island_alternates_hole_flag() {
        let outer = square(0.0, 0.0, 10.0);
        let hole = square(2.0, 2.0, 6.0);
        let island = square(3.0, 3.0, 2.0);
        let tree = build_poly_tree(vec![outer, hole, island]);
        let hole_node = &tree.roots[0].children[0];
        assert!(hole_node.is_hole);
        let island_node = &hole_node.children[0];
        assert!(!island_node.is_hole);
    }
}
