//! Deterministic tangency resolution: near-coincident vertices or
//! overlapping collinear edges are nudged apart by a small outward
//! micro-offset before a boolean operation runs, so the clipping backend
//! never has to resolve an ambiguous near-zero-width sliver itself.

use crate::config::TangencyConfig;
use crate::geometry::{Path, Point};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

use super::engine::{BooleanEngine, EndType, JoinType};

pub struct TangencyResolver {
    config: TangencyConfig,
    rng: StdRng,
}

impl TangencyResolver {
    pub fn new(config: TangencyConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
        }
    }

    /// Detect near-tangent paths and apply a small outward inflate to each
    /// affected path. Always succeeds: epsilon is clamped, never raised as
    /// an error. Returns diagnostic messages for the caller's warnings log.
    pub fn resolve(&mut self, engine: &BooleanEngine, paths: &mut Vec<Path>) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.config.enabled || paths.len() < 2 {
            return warnings;
        }

        let scale = engine.scale;
        let threshold_mm = self.config.threshold as f64 / scale;
        let affected = detect_affected(paths, threshold_mm);
        if affected.is_empty() {
            return warnings;
        }

        let epsilon_units = self
            .rng
            .gen_range(self.config.min_offset..=self.config.max_offset)
            .clamp(self.config.min_offset, self.config.max_offset);
        let epsilon_mm = epsilon_units as f64 / scale;

        for &idx in &affected {
            let single = vec![paths[idx].clone()];
            match engine.offset(&single, epsilon_mm, JoinType::Round, EndType::Polygon, 2.0) {
                Ok(result) if !result.is_empty() => {
                    paths[idx] = result.into_iter().next().unwrap();
                }
                _ => {}
            }
        }
        warnings.push(format!(
            "tangency resolution nudged {} path(s) outward by {epsilon_mm:.6} mm",
            affected.len()
        ));
        warnings
    }
}

fn detect_affected(paths: &[Path], threshold_mm: f64) -> HashSet<usize> {
    let mut affected = HashSet::new();
    let threshold_sqr = threshold_mm * threshold_mm;

    // (a) O(V^2) vertex proximity across distinct paths.
    for (i, j) in (0..paths.len()).tuple_combinations() {
        'outer: for p in &paths[i].points {
            for q in &paths[j].points {
                if p.distance_sqr(q) < threshold_sqr {
                    affected.insert(i);
                    affected.insert(j);
                    break 'outer;
                }
            }
        }
    }

    // (b) pairwise edge collinearity with AABB overlap.
    let edges: Vec<(usize, Point, Point)> = paths
        .iter()
        .enumerate()
        .flat_map(|(idx, path)| edges_of(path).into_iter().map(move |(a, b)| (idx, a, b)))
        .collect();

    for (a, b) in (0..edges.len()).tuple_combinations() {
        let (ia, a0, a1) = edges[a];
        let (ib, b0, b1) = edges[b];
        if ia == ib {
            continue;
        }
        if !aabb_overlap(a0, a1, b0, b1, threshold_mm) {
            continue;
        }
        let da = Point::new(a1.x - a0.x, a1.y - a0.y);
        let db = Point::new(b1.x - b0.x, b1.y - b0.y);
        if normalized_cross(da, db) < 0.01 {
            affected.insert(ia);
            affected.insert(ib);
        }
    }

    affected
}

fn edges_of(path: &Path) -> Vec<(Point, Point)> {
    if path.points.len() < 2 {
        return Vec::new();
    }
    let n = path.points.len();
    let count = if path.closed { n } else { n - 1 };
    (0..count)
        .map(|i| (path.points[i], path.points[(i + 1) % n]))
        .collect()
}

fn aabb_overlap(a0: Point, a1: Point, b0: Point, b1: Point, margin: f64) -> bool {
    let a_min_x = a0.x.min(a1.x) - margin;
    let a_max_x = a0.x.max(a1.x) + margin;
    let a_min_y = a0.y.min(a1.y) - margin;
    let a_max_y = a0.y.max(a1.y) + margin;
    let b_min_x = b0.x.min(b1.x);
    let b_max_x = b0.x.max(b1.x);
    let b_min_y = b0.y.min(b1.y);
    let b_max_y = b0.y.max(b1.y);
    a_min_x <= b_max_x && a_max_x >= b_min_x && a_min_y <= b_max_y && a_max_y >= b_min_y
}

fn normalized_cross(d1: Point, d2: Point) -> f64 {
    let l1 = d1.x.hypot(d1.y);
    let l2 = d2.x.hypot(d2.y);
    if l1 < 1e-12 || l2 < 1e-12 {
        return 0.0;
    }
    ((d1.x * d2.y - d1.y * d2.x).abs()) / (l1 * l2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

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
    fn near_coincident_squares_are_detected_as_affected() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(1.0000001, 0.0, 1.0);
        let affected = detect_affected(&[a, b], 0.01);
        assert_eq!(affected.len(), 2);
    }

    #[test]
    fn well_separated_squares_are_not_affected() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(10.0, 10.0, 1.0);
        let affected = detect_affected(&[a, b], 0.01);
        assert!(affected.is_empty());
    }

    #[test]
    fn resolver_is_deterministic_for_a_fixed_seed() {
        let config = Config::default();
        let engine = BooleanEngine::new(&config);
        let a = square(0.0, 0.0, 1.0);
        let b = square(1.0000001, 0.0, 1.0);

        let mut r1 = TangencyResolver::new(config.tangency);
        let mut paths1 = vec![a.clone(), b.clone()];
        r1.resolve(&engine, &mut paths1);

        let mut r2 = TangencyResolver::new(config.tangency);
        let mut paths2 = vec![a, b];
        r2.resolve(&engine, &mut paths2);

        for (p1, p2) in paths1.iter().zip(paths2.iter()) {
            assert_eq!(p1.points.len(), p2.points.len());
        }
    }

    #[test]
    fn disabled_resolver_never_modifies_paths() {
        let mut config = Config::default();
        config.tangency.enabled = false;
        let engine = BooleanEngine::new(&config);
        let a = square(0.0, 0.0, 1.0);
        let b = square(1.0000001, 0.0, 1.0);
        let mut paths = vec![a.clone(), b.clone()];
        let mut resolver = TangencyResolver::new(config.tangency);
        let warnings = resolver.resolve(&engine, &mut paths);
        assert!(warnings.is_empty());
        assert_eq!(paths[0], a);
        assert_eq!(paths[1], b);
    }
}
