use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecisionConfig {
    pub coordinate: f64,
    pub zero_length: f64,
    pub epsilon: f64,
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            coordinate: 1e-6,
            zero_length: 1e-4,
            epsilon: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TangencyStrategy {
    MicroOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TangencyConfig {
    pub enabled: bool,
    /// Fixed-point units at the configured scale; default offset applied
    /// when a tangency is detected. Clamped to [min_offset, max_offset].
    pub epsilon: i64,
    /// Vertex-proximity / edge-collinearity detection threshold, same units.
    pub threshold: i64,
    pub strategy: TangencyStrategy,
    pub min_offset: i64,
    pub max_offset: i64,
    pub seed: u64,
}

impl Default for TangencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            epsilon: 50,
            threshold: 50,
            strategy: TangencyStrategy::MicroOffset,
            min_offset: 10,
            max_offset: 1000,
            seed: 0x5EED_5EED_5EED_5EED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub path_ordering: bool,
    pub segment_simplification: bool,
    pub z_level_grouping: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            path_ordering: true,
            segment_simplification: true,
            z_level_grouping: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplificationConfig {
    pub curve_tolerance_fallback: f64,
    pub straight_tolerance_fallback: f64,
    pub sharp_corner_tolerance: f64,
    pub straight_angle_threshold_degrees: f64,
    pub sharp_angle_threshold_degrees: f64,
}

impl Default for SimplificationConfig {
    fn default() -> Self {
        Self {
            curve_tolerance_fallback: 0.02,
            straight_tolerance_fallback: 0.01,
            sharp_corner_tolerance: 0.002,
            straight_angle_threshold_degrees: 5.0,
            sharp_angle_threshold_degrees: 150.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RapidCostConfig {
    pub z_travel_threshold: f64,
    pub z_cost_factor: f64,
    pub base_cost: f64,
}

impl Default for RapidCostConfig {
    fn default() -> Self {
        Self {
            z_travel_threshold: 5.0,
            z_cost_factor: 1.5,
            base_cost: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineHeightsConfig {
    pub safe_z: f64,
    pub travel_z: f64,
    /// Feed rate (mm/min) the Metadata Calculator charges for Rapid moves,
    /// which carry no feed rate of their own.
    pub rapid_feed: f64,
}

impl Default for MachineHeightsConfig {
    fn default() -> Self {
        Self {
            safe_z: 10.0,
            travel_z: 2.0,
            rapid_feed: 3000.0,
        }
    }
}

/// The abstract CLI/config surface from the external-interfaces contract,
/// threaded through the pipeline by value or shared reference. Never read
/// from ambient/global state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub precision: PrecisionConfig,
    pub tangency: TangencyConfig,
    pub optimization: OptimizationConfig,
    pub simplification: SimplificationConfig,
    pub rapid_cost: RapidCostConfig,
    pub machine_heights: MachineHeightsConfig,
    /// Fixed-point units per millimeter used by the boolean engine.
    pub fixed_point_scale: f64,
    /// Longest air hop (mm) within a staydown cluster allowed before it's
    /// considered two separate clusters, as a tolerance added on top of the
    /// theoretical step distance.
    pub staydown_tolerance: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            precision: PrecisionConfig::default(),
            tangency: TangencyConfig::default(),
            optimization: OptimizationConfig::default(),
            simplification: SimplificationConfig::default(),
            rapid_cost: RapidCostConfig::default(),
            machine_heights: MachineHeightsConfig::default(),
            fixed_point_scale: 100_000.0,
            staydown_tolerance: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = Config::default();
        let json = serde_json::to_string(&cfg).expect("serialize");
        let back: Config = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(cfg, back);
    }

    #[test]
    fn default_tangency_epsilon_is_within_clamp_range() {
        let t = TangencyConfig::default();
        assert!(t.epsilon >= t.min_offset && t.epsilon <= t.max_offset);
    }
}
