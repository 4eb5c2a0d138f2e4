//! Stage 4: given a tool diameter, pass count, and step-over fraction,
//! produce an ordered set of offset polygon layers — positive delta for
//! external isolation, negative for internal pocket/drill-milling
//! clearance. Each pass runs independently against the cleaned source
//! polygon set, grounded on the same `clipper2::inflate` call the
//! teacher's `pocket.rs` iterates to clear a pocket, generalized here to
//! an explicit pass count/step-over instead of "shrink until empty".

use crate::boolean::engine::{BooleanEngine, EndType, JoinType};
use crate::error::{PcbCamError, Result};
use crate::geometry::Path;

/// One pass's worth of offset geometry, carrying the metadata the
/// optimizer partitions and clusters by.
#[derive(Debug, Clone)]
pub struct OffsetLayer {
    pub pass: usize,
    pub paths: Vec<Path>,
    pub group_key: String,
    pub step_over: f64,
    pub tool_diameter: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetDirection {
    /// Positive delta: isolation routing around the outside of copper.
    External,
    /// Negative delta: pocket clearing / drill milling on the inside.
    Internal,
}

pub struct OffsetGenerator<'a> {
    engine: &'a BooleanEngine,
}

impl<'a> OffsetGenerator<'a> {
    pub fn new(engine: &'a BooleanEngine) -> Self {
        Self { engine }
    }

    /// `delta_i = sign * (d/2 + i*(d*(1-s)))` for `i` in `[0, passes)`.
    pub fn deltas(diameter: f64, passes: u32, step_over: f64, direction: OffsetDirection) -> Vec<f64> {
        let sign = match direction {
            OffsetDirection::External => 1.0,
            OffsetDirection::Internal => -1.0,
        };
        let step = diameter * (1.0 - step_over);
        (0..passes)
            .map(|i| sign * (diameter / 2.0 + (i as f64) * step))
            .collect()
    }

    /// Run every pass independently against `source`, returning one layer
    /// per pass plus any duplicate-pass warning (step-over = 100% collapses
    /// every pass to the same two offsets).
    pub fn generate(
        &self,
        source: &[Path],
        diameter: f64,
        passes: u32,
        step_over: f64,
        direction: OffsetDirection,
        group_key: &str,
    ) -> Result<(Vec<OffsetLayer>, Vec<String>)> {
        if diameter <= 0.0 {
            return Err(PcbCamError::InvalidParameter(
                "tool diameter must be > 0".into(),
            ));
        }
        if passes < 1 {
            return Err(PcbCamError::InvalidParameter("passes must be >= 1".into()));
        }
        if !(step_over > 0.0 && step_over <= 1.0) {
            return Err(PcbCamError::InvalidParameter(
                "step-over must be in (0, 1]".into(),
            ));
        }

        let mut warnings = Vec::new();
        if (step_over - 1.0).abs() < 1e-9 && passes > 1 {
            warnings.push(format!(
                "step-over of 100% collapses {passes} passes to duplicate offsets for tool {diameter}"
            ));
        }

        let deltas = Self::deltas(diameter, passes, step_over, direction);
        let mut layers = Vec::with_capacity(deltas.len());
        for (pass, delta) in deltas.into_iter().enumerate() {
            let paths = self.engine.offset(
                source,
                delta,
                JoinType::Round,
                EndType::Polygon,
                2.0,
            )?;
            layers.push(OffsetLayer {
                pass,
                paths,
                group_key: group_key.to_string(),
                step_over,
                tool_diameter: diameter,
                delta,
            });
        }
        Ok((layers, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geometry::Point;

    fn square(side: f64) -> Path {
        Path::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(side, 0.0),
                Point::new(side, side),
                Point::new(0.0, side),
            ],
            true,
        )
    }

    #[test]
    fn deltas_match_the_external_isolation_formula() {
        let deltas = OffsetGenerator::deltas(0.2, 3, 0.5, OffsetDirection::External);
        assert_eq!(deltas.len(), 3);
        assert!((deltas[0] - 0.1).abs() < 1e-9);
        assert!((deltas[1] - 0.2).abs() < 1e-9);
        assert!((deltas[2] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn internal_direction_negates_every_delta() {
        let deltas = OffsetGenerator::deltas(0.2, 2, 0.5, OffsetDirection::Internal);
        assert!(deltas.iter().all(|d| *d < 0.0));
    }

    #[test]
    fn trace_isolation_offset_area_matches_scenario_one() {
        // §8 scenario 1: 10mm trace, width 0.2, offset at +0.1. Approximated
        // here as a plain rectangle (no stroke end caps); offset area should
        // still land near the spec's ~4.2 mm^2 figure within tessellation
        // and end-cap error.
        let config = Config::default();
        let engine = BooleanEngine::new(&config);
        let rect = Path::new(
            vec![
                Point::new(0.0, -0.1),
                Point::new(10.0, -0.1),
                Point::new(10.0, 0.1),
                Point::new(0.0, 0.1),
            ],
            true,
        );
        let generator = OffsetGenerator::new(&engine);
        let (layers, _) = generator
            .generate(&[rect], 0.2, 1, 0.5, OffsetDirection::External, "0.200000")
            .unwrap();
        let area: f64 = layers[0].paths.iter().map(|p| p.signed_area()).sum();
        // (10+0.2)*0.4 = 4.08 plus rounded corners; generous tolerance.
        assert!(area > 3.8 && area < 4.6, "area={area}");
    }

    #[test]
    fn invalid_diameter_is_rejected() {
        let config = Config::default();
        let engine = BooleanEngine::new(&config);
        let generator = OffsetGenerator::new(&engine);
        let err = generator
            .generate(&[square(1.0)], 0.0, 1, 0.5, OffsetDirection::External, "k")
            .unwrap_err();
        assert!(matches!(err, PcbCamError::InvalidParameter(_)));
    }

    #[test]
    fn full_step_over_warns_about_duplicate_passes() {
        let config = Config::default();
        let engine = BooleanEngine::new(&config);
        let generator = OffsetGenerator::new(&engine);
        let (_, warnings) = generator
            .generate(&[square(5.0)], 0.2, 2, 1.0, OffsetDirection::External, "k")
            .unwrap();
        assert_eq!(warnings.len(), 1);
    }
}
