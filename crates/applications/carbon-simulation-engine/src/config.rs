//! Versioned simulation configuration
//!
//! A single JSON schema covers the region table, user-location mix, latency
//! matrix, workload table and simulation parameters. Configuration is validated
//! once at load and never mutated afterwards; every component borrows it.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SimError};

/// Current configuration schema version
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Allowed deviation of a probability vector sum from 1.0
pub const PROBABILITY_TOLERANCE: f64 = 1e-3;

/// A cloud region and its average grid carbon intensity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    /// Base carbon intensity (gCO2eq/kWh)
    pub base_carbon: f64,
}

/// Origin of requests with its share of traffic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLocationConfig {
    pub name: String,
    pub probability: f64,
}

/// An inference workload (model) class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Stable identifier used in output tables
    pub id: String,
    /// Human-readable model name
    pub name: String,
    pub mean_inference_ms: f64,
    pub std_inference_ms: f64,
    /// Service level objective for end-to-end latency
    pub slo_ms: f64,
    /// Share of the request mix
    pub mix_probability: f64,
}

/// Shape of the multiplicative carbon noise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseDistribution {
    /// Uniform on [1 - f, 1 + f]
    Uniform,
    /// Normal with mean 1 and standard deviation f
    Normal,
}

/// Simulation-wide parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub hours: usize,
    pub requests_per_hour: usize,
    pub seed: u64,

    // Carbon trace shape
    pub diurnal_amplitude: f64,
    pub diurnal_phase_hours: f64,
    pub noise_fraction: f64,
    pub noise_distribution: NoiseDistribution,
    pub carbon_floor: f64,

    // Network jitter (ms)
    pub jitter_mean_ms: f64,
    pub jitter_std_ms: f64,
    /// Constrained-Hybrid safety margin, in multiples of `jitter_std_ms`
    pub jitter_buffer_sigmas: f64,

    /// Lower clamp for sampled inference times
    pub min_inference_ms: f64,

    /// One Hybrid policy instance is evaluated per alpha
    pub hybrid_alphas: Vec<f64>,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            hours: 168, // 7 days
            requests_per_hour: 1000,
            seed: 42,
            diurnal_amplitude: 0.2,
            diurnal_phase_hours: 6.0,
            noise_fraction: 0.1,
            noise_distribution: NoiseDistribution::Uniform,
            carbon_floor: 5.0,
            jitter_mean_ms: 2.0,
            jitter_std_ms: 3.0,
            jitter_buffer_sigmas: 3.0,
            min_inference_ms: 1.0,
            hybrid_alphas: vec![0.2, 0.3, 0.5, 0.7],
        }
    }
}

impl SimulationParams {
    /// Total number of requests in the stream
    pub fn total_requests(&self) -> usize {
        self.hours * self.requests_per_hour
    }

    /// Constrained-Hybrid jitter safety buffer (ms)
    pub fn jitter_buffer_ms(&self) -> f64 {
        self.jitter_buffer_sigmas * self.jitter_std_ms
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub schema_version: u32,
    pub regions: Vec<RegionConfig>,
    pub user_locations: Vec<UserLocationConfig>,
    /// User location name -> RTT (ms) per region, in `regions` order
    pub latency_matrix: BTreeMap<String, Vec<f64>>,
    pub workloads: Vec<WorkloadConfig>,
    #[serde(default)]
    pub simulation: SimulationParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        let regions = [
            ("us-east", 400.0),
            ("us-west", 250.0),
            ("europe", 150.0),
            ("asia", 500.0),
        ]
        .into_iter()
        .map(|(name, base_carbon)| RegionConfig { name: name.to_string(), base_carbon })
        .collect();

        let user_locations = [("North_America", 0.5), ("Europe", 0.3), ("Asia", 0.2)]
            .into_iter()
            .map(|(name, probability)| UserLocationConfig { name: name.to_string(), probability })
            .collect();

        let latency_matrix = BTreeMap::from([
            ("North_America".to_string(), vec![20.0, 60.0, 100.0, 200.0]),
            ("Europe".to_string(), vec![100.0, 150.0, 20.0, 150.0]),
            ("Asia".to_string(), vec![200.0, 150.0, 150.0, 20.0]),
        ]);

        let workloads = vec![
            workload("bert-base", "BERT-base", 50.0, 10.0, 100.0, 0.6),
            workload("bert-large", "BERT-large", 120.0, 20.0, 200.0, 0.3),
            workload("resnet-50", "ResNet-50", 30.0, 5.0, 80.0, 0.1),
        ];

        SimConfig {
            schema_version: CONFIG_SCHEMA_VERSION,
            regions,
            user_locations,
            latency_matrix,
            workloads,
            simulation: SimulationParams::default(),
        }
    }
}

fn workload(id: &str, name: &str, mean: f64, std: f64, slo: f64, mix: f64) -> WorkloadConfig {
    WorkloadConfig {
        id: id.to_string(),
        name: name.to_string(),
        mean_inference_ms: mean,
        std_inference_ms: std,
        slo_ms: slo,
        mix_probability: mix,
    }
}

impl SimConfig {
    /// Load and validate a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a configuration from a JSON string
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every load-time invariant. Invalid configurations are fatal.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != CONFIG_SCHEMA_VERSION {
            return Err(SimError::config(format!(
                "unsupported schema_version {} (expected {})",
                self.schema_version, CONFIG_SCHEMA_VERSION
            )));
        }

        if self.regions.is_empty() {
            return Err(SimError::EmptySet("regions"));
        }
        if self.user_locations.is_empty() {
            return Err(SimError::EmptySet("user locations"));
        }
        if self.workloads.is_empty() {
            return Err(SimError::EmptySet("workloads"));
        }

        ensure_unique("region", self.regions.iter().map(|r| r.name.as_str()))?;
        ensure_unique("user location", self.user_locations.iter().map(|u| u.name.as_str()))?;
        ensure_unique("workload", self.workloads.iter().map(|w| w.id.as_str()))?;

        for region in &self.regions {
            if !region.base_carbon.is_finite() || region.base_carbon <= 0.0 {
                return Err(SimError::NonPositiveCarbon {
                    region: region.name.clone(),
                    value: region.base_carbon,
                });
            }
        }

        check_probabilities(
            "User location",
            self.user_locations.iter().map(|u| u.probability),
        )?;
        check_probabilities(
            "Workload",
            self.workloads.iter().map(|w| w.mix_probability),
        )?;

        self.validate_latency_matrix()?;

        for w in &self.workloads {
            let finite = [w.mean_inference_ms, w.std_inference_ms, w.slo_ms]
                .iter()
                .all(|v| v.is_finite());
            if !finite || w.mean_inference_ms < 0.0 || w.std_inference_ms < 0.0 {
                return Err(SimError::config(format!(
                    "workload {}: inference mean/std must be finite and non-negative",
                    w.id
                )));
            }
            if w.slo_ms <= 0.0 {
                return Err(SimError::config(format!("workload {}: SLO must be positive", w.id)));
            }
        }

        self.validate_params()
    }

    fn validate_latency_matrix(&self) -> Result<()> {
        let num_regions = self.regions.len();
        for location in &self.user_locations {
            let row = self.latency_matrix.get(&location.name).ok_or_else(|| {
                SimError::config(format!("latency matrix has no row for {}", location.name))
            })?;
            if row.len() != num_regions {
                return Err(SimError::config(format!(
                    "latency row for {} has {} entries, expected {}",
                    location.name,
                    row.len(),
                    num_regions
                )));
            }
            if row.iter().any(|rtt| !rtt.is_finite() || *rtt < 0.0) {
                return Err(SimError::config(format!(
                    "latency row for {} contains a negative or non-finite RTT",
                    location.name
                )));
            }
        }

        let known: HashSet<&str> = self.user_locations.iter().map(|u| u.name.as_str()).collect();
        if let Some(extra) = self.latency_matrix.keys().find(|k| !known.contains(k.as_str())) {
            return Err(SimError::config(format!(
                "latency matrix row {extra} does not match any user location"
            )));
        }
        Ok(())
    }

    fn validate_params(&self) -> Result<()> {
        let p = &self.simulation;
        if p.hours == 0 || p.requests_per_hour == 0 {
            return Err(SimError::config("hours and requests_per_hour must be positive"));
        }
        if p.hours.checked_mul(p.requests_per_hour).is_none() {
            return Err(SimError::config(format!(
                "{} hours x {} requests/hour overflows the request count",
                p.hours, p.requests_per_hour
            )));
        }
        if !(0.0..1.0).contains(&p.diurnal_amplitude) {
            return Err(SimError::config("diurnal_amplitude must be in [0, 1)"));
        }
        if !(0.0..1.0).contains(&p.noise_fraction) {
            return Err(SimError::config("noise_fraction must be in [0, 1)"));
        }
        if !p.diurnal_phase_hours.is_finite() {
            return Err(SimError::config("diurnal_phase_hours must be finite"));
        }
        if !p.carbon_floor.is_finite() || p.carbon_floor <= 0.0 {
            return Err(SimError::config("carbon_floor must be positive"));
        }
        if !p.jitter_mean_ms.is_finite() || !p.jitter_std_ms.is_finite() || p.jitter_std_ms < 0.0 {
            return Err(SimError::config("jitter parameters must be finite, std non-negative"));
        }
        if !p.jitter_buffer_sigmas.is_finite() || p.jitter_buffer_sigmas < 0.0 {
            return Err(SimError::config("jitter_buffer_sigmas must be non-negative"));
        }
        if !p.min_inference_ms.is_finite() || p.min_inference_ms <= 0.0 {
            return Err(SimError::config("min_inference_ms must be positive"));
        }

        let mut seen = Vec::with_capacity(p.hybrid_alphas.len());
        for &alpha in &p.hybrid_alphas {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(SimError::config(format!("hybrid alpha {alpha} outside [0, 1]")));
            }
            if seen.contains(&alpha) {
                return Err(SimError::config(format!("duplicate hybrid alpha {alpha}")));
            }
            seen.push(alpha);
        }
        Ok(())
    }

    /// Region names in column order
    pub fn region_names(&self) -> Vec<&str> {
        self.regions.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn user_probabilities(&self) -> Vec<f64> {
        self.user_locations.iter().map(|u| u.probability).collect()
    }

    pub fn workload_probabilities(&self) -> Vec<f64> {
        self.workloads.iter().map(|w| w.mix_probability).collect()
    }
}

fn ensure_unique<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(SimError::config(format!("duplicate {what} {name}")));
        }
    }
    Ok(())
}

fn check_probabilities(what: &'static str, probs: impl Iterator<Item = f64>) -> Result<()> {
    let mut sum = 0.0;
    for p in probs {
        if !p.is_finite() || p < 0.0 {
            return Err(SimError::config(format!("{what} probability {p} is invalid")));
        }
        sum += p;
    }
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(SimError::InvalidProbabilities { what, sum });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.region_names(), vec!["us-east", "us-west", "europe", "asia"]);
        assert_eq!(config.simulation.total_requests(), 168_000);
        assert_eq!(config.simulation.jitter_buffer_ms(), 9.0);
    }

    #[test]
    fn test_probability_vectors_sum_to_one() {
        let config = SimConfig::default();
        let users: f64 = config.user_probabilities().iter().sum();
        let mix: f64 = config.workload_probabilities().iter().sum();
        assert!((users - 1.0).abs() <= PROBABILITY_TOLERANCE);
        assert!((mix - 1.0).abs() <= PROBABILITY_TOLERANCE);
    }

    #[test]
    fn test_bad_workload_mix_rejected() {
        let mut config = SimConfig::default();
        config.workloads[0].mix_probability = 0.7;

        match config.validate() {
            Err(SimError::InvalidProbabilities { what, sum }) => {
                assert_eq!(what, "Workload");
                assert!((sum - 1.1).abs() < 1e-9);
            }
            other => panic!("expected probability error, got {other:?}"),
        }
    }

    #[test]
    fn test_sum_within_tolerance_accepted() {
        let mut config = SimConfig::default();
        config.user_locations[0].probability = 0.5005;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_carbon_rejected() {
        let mut config = SimConfig::default();
        config.regions[1].base_carbon = -10.0;
        assert!(matches!(config.validate(), Err(SimError::NonPositiveCarbon { .. })));
    }

    #[test]
    fn test_empty_sets_rejected() {
        let mut config = SimConfig::default();
        config.workloads.clear();
        assert!(matches!(config.validate(), Err(SimError::EmptySet("workloads"))));

        let mut config = SimConfig::default();
        config.regions.clear();
        assert!(matches!(config.validate(), Err(SimError::EmptySet("regions"))));
    }

    #[test]
    fn test_latency_matrix_shape_checked() {
        let mut config = SimConfig::default();
        config.latency_matrix.get_mut("Asia").unwrap().pop();
        assert!(matches!(config.validate(), Err(SimError::Config(_))));

        let mut config = SimConfig::default();
        config.latency_matrix.remove("Europe");
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_schema_version_checked() {
        let mut config = SimConfig::default();
        config.schema_version = 2;
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_duplicate_alpha_rejected() {
        let mut config = SimConfig::default();
        config.simulation.hybrid_alphas = vec![0.5, 0.5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_count_overflow_rejected() {
        let mut config = SimConfig::default();
        config.simulation.hours = usize::MAX / 2;
        config.simulation.requests_per_hour = 3;
        assert!(matches!(config.validate(), Err(SimError::Config(_))));
    }

    #[test]
    fn test_json_without_simulation_uses_defaults() {
        let json = r#"{
            "schema_version": 1,
            "regions": [{"name": "a", "base_carbon": 100.0}, {"name": "b", "base_carbon": 300.0}],
            "user_locations": [{"name": "u", "probability": 1.0}],
            "latency_matrix": {"u": [10.0, 30.0]},
            "workloads": [{
                "id": "w", "name": "W", "mean_inference_ms": 10.0,
                "std_inference_ms": 1.0, "slo_ms": 50.0, "mix_probability": 1.0
            }]
        }"#;

        let config = SimConfig::from_json_str(json).unwrap();
        assert_eq!(config.regions.len(), 2);
        assert_eq!(config.simulation, SimulationParams::default());
    }

    #[test]
    fn test_partial_simulation_params() {
        let json = serde_json::json!({
            "schema_version": 1,
            "regions": [{"name": "a", "base_carbon": 100.0}],
            "user_locations": [{"name": "u", "probability": 1.0}],
            "latency_matrix": {"u": [10.0]},
            "workloads": [{
                "id": "w", "name": "W", "mean_inference_ms": 10.0,
                "std_inference_ms": 1.0, "slo_ms": 50.0, "mix_probability": 1.0
            }],
            "simulation": {"hours": 2, "noise_distribution": "normal"}
        });

        let config = SimConfig::from_json_str(&json.to_string()).unwrap();
        assert_eq!(config.simulation.hours, 2);
        assert_eq!(config.simulation.noise_distribution, NoiseDistribution::Normal);
        assert_eq!(config.simulation.requests_per_hour, 1000);
    }
}
