//! Core types for the simulation engine

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;

/// Hour x region table of carbon intensity (gCO2eq/kWh)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonTrace {
    pub regions: Vec<String>,
    /// Row-major: `values[hour][region]`
    pub values: Vec<Vec<f64>>,
}

impl CarbonTrace {
    pub fn hours(&self) -> usize {
        self.values.len()
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    /// Carbon intensity of every region at `hour`
    pub fn at_hour(&self, hour: usize) -> &[f64] {
        &self.values[hour]
    }

    /// Smallest and largest sample across all hours and regions
    pub fn bounds(&self) -> (f64, f64) {
        self.values
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    /// Mean intensity per region over the whole trace
    pub fn region_means(&self) -> Vec<f64> {
        let hours = self.hours().max(1) as f64;
        (0..self.num_regions())
            .map(|r| self.values.iter().map(|row| row[r]).sum::<f64>() / hours)
            .collect()
    }
}

/// User location x region table of baseline RTTs (ms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyMatrix {
    pub user_locations: Vec<String>,
    pub regions: Vec<String>,
    pub rtt_ms: Vec<Vec<f64>>,
}

impl LatencyMatrix {
    /// Build the dense matrix in user-location order. Expects a validated config.
    pub fn from_config(config: &SimConfig) -> Self {
        let user_locations: Vec<String> =
            config.user_locations.iter().map(|u| u.name.clone()).collect();
        let rtt_ms = user_locations
            .iter()
            .map(|name| config.latency_matrix.get(name).cloned().unwrap_or_default())
            .collect();

        LatencyMatrix {
            user_locations,
            regions: config.regions.iter().map(|r| r.name.clone()).collect(),
            rtt_ms,
        }
    }

    /// RTT to every region from a user location
    pub fn row(&self, user_location: usize) -> &[f64] {
        &self.rtt_ms[user_location]
    }

    pub fn bounds(&self) -> (f64, f64) {
        self.rtt_ms
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

/// A single inference request (indices into the config tables)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub hour: usize,
    pub user_location: usize,
    pub workload: usize,
}

/// Random draws for one request, shared by every policy pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestSample {
    pub inference_ms: f64,
    pub jitter_ms: f64,
}

/// Realized outcome of routing one request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    pub workload: usize,
    pub region: usize,
    pub latency_ms: f64,
    pub carbon: f64,
    pub inference_ms: f64,
    pub slo_violated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_bounds_and_means() {
        let trace = CarbonTrace {
            regions: vec!["a".into(), "b".into()],
            values: vec![vec![100.0, 300.0], vec![200.0, 50.0]],
        };

        assert_eq!(trace.hours(), 2);
        assert_eq!(trace.at_hour(1), &[200.0, 50.0]);
        assert_eq!(trace.bounds(), (50.0, 300.0));
        assert_eq!(trace.region_means(), vec![150.0, 175.0]);
    }

    #[test]
    fn test_latency_matrix_follows_user_order() {
        let config = SimConfig::default();
        let matrix = LatencyMatrix::from_config(&config);

        // BTreeMap storage is alphabetical; dense rows follow user_locations
        assert_eq!(matrix.user_locations[0], "North_America");
        assert_eq!(matrix.row(0), &[20.0, 60.0, 100.0, 200.0]);
        assert_eq!(matrix.row(2), &[200.0, 150.0, 150.0, 20.0]);
        assert_eq!(matrix.bounds(), (20.0, 200.0));
    }
}
