//! Routing policies for region selection
//!
//! Implements the policies under comparison:
//! - Latency-First: nearest region (baseline)
//! - Carbon-First: greenest region
//! - Hybrid(α): weighted sum of globally normalized latency and carbon
//! - Constrained Hybrid: greenest region among those expected to meet the SLO
//!
//! Every policy is a pure function of its inputs. Ties always go to the lowest
//! region index.

use serde::{Deserialize, Serialize};

/// Added to normalization ranges so a zero-width range never divides by zero
pub const NORMALIZATION_EPSILON: f64 = 1e-9;

/// Global min/max used to normalize Hybrid scores
///
/// Fixed for the whole simulation so that α keeps the same meaning for every
/// request regardless of that request's own dynamic range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationBounds {
    pub latency_min: f64,
    pub latency_max: f64,
    pub carbon_min: f64,
    pub carbon_max: f64,
}

impl NormalizationBounds {
    pub fn new(latency: (f64, f64), carbon: (f64, f64)) -> Self {
        NormalizationBounds {
            latency_min: latency.0,
            latency_max: latency.1,
            carbon_min: carbon.0,
            carbon_max: carbon.1,
        }
    }

    pub fn normalize_latency(&self, latency: f64) -> f64 {
        (latency - self.latency_min) / (self.latency_max - self.latency_min + NORMALIZATION_EPSILON)
    }

    pub fn normalize_carbon(&self, carbon: f64) -> f64 {
        (carbon - self.carbon_min) / (self.carbon_max - self.carbon_min + NORMALIZATION_EPSILON)
    }
}

/// Per-request context used by SLO-aware policies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyContext {
    pub slo_ms: f64,
    pub expected_inference_ms: f64,
    pub jitter_buffer_ms: f64,
}

impl PolicyContext {
    /// Projected end-to-end latency when routed over `network_ms`
    pub fn projected_latency(&self, network_ms: f64) -> f64 {
        network_ms + self.expected_inference_ms + self.jitter_buffer_ms
    }

    pub fn is_eligible(&self, network_ms: f64) -> bool {
        self.projected_latency(network_ms) <= self.slo_ms
    }
}

/// Routing policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Policy {
    LatencyFirst,
    CarbonFirst,
    Hybrid { alpha: f64 },
    ConstrainedHybrid,
}

impl Policy {
    /// The full set of policies for a run, baseline first
    pub fn roster(hybrid_alphas: &[f64]) -> Vec<Policy> {
        let mut policies = vec![Policy::LatencyFirst, Policy::CarbonFirst];
        policies.extend(hybrid_alphas.iter().map(|&alpha| Policy::Hybrid { alpha }));
        policies.push(Policy::ConstrainedHybrid);
        policies
    }

    /// Display name; these are the row labels of the output tables
    pub fn name(&self) -> String {
        match self {
            Policy::LatencyFirst => "Latency-First".to_string(),
            Policy::CarbonFirst => "Carbon-First".to_string(),
            Policy::Hybrid { alpha } => format!("Hybrid (\u{3b1}={alpha})"),
            Policy::ConstrainedHybrid => "Constrained Hybrid".to_string(),
        }
    }

    /// Carbon reduction is reported relative to this policy
    pub fn is_baseline(&self) -> bool {
        matches!(self, Policy::LatencyFirst)
    }

    /// Choose a region index
    ///
    /// `latencies` and `carbons` must be non-empty and of equal length.
    pub fn select(
        &self,
        latencies: &[f64],
        carbons: &[f64],
        bounds: &NormalizationBounds,
        ctx: &PolicyContext,
    ) -> usize {
        match *self {
            Policy::LatencyFirst => latency_first(latencies),
            Policy::CarbonFirst => carbon_first(carbons),
            Policy::Hybrid { alpha } => hybrid(latencies, carbons, alpha, bounds),
            Policy::ConstrainedHybrid => constrained_hybrid(latencies, carbons, ctx),
        }
    }
}

/// Index of the smallest value; first index wins on ties
fn argmin_by<F>(len: usize, mut key: F) -> usize
where
    F: FnMut(usize) -> f64,
{
    let mut best = 0;
    let mut best_value = f64::INFINITY;
    for i in 0..len {
        let value = key(i);
        if value < best_value {
            best = i;
            best_value = value;
        }
    }
    best
}

pub fn latency_first(latencies: &[f64]) -> usize {
    argmin_by(latencies.len(), |i| latencies[i])
}

pub fn carbon_first(carbons: &[f64]) -> usize {
    argmin_by(carbons.len(), |i| carbons[i])
}

pub fn hybrid(latencies: &[f64], carbons: &[f64], alpha: f64, bounds: &NormalizationBounds) -> usize {
    // The endpoints reduce to the single-objective policies exactly
    if alpha >= 1.0 {
        return latency_first(latencies);
    }
    if alpha <= 0.0 {
        return carbon_first(carbons);
    }

    argmin_by(latencies.len(), |i| {
        alpha * bounds.normalize_latency(latencies[i])
            + (1.0 - alpha) * bounds.normalize_carbon(carbons[i])
    })
}

pub fn constrained_hybrid(latencies: &[f64], carbons: &[f64], ctx: &PolicyContext) -> usize {
    if !latencies.iter().any(|&l| ctx.is_eligible(l)) {
        return latency_first(latencies);
    }

    argmin_by(carbons.len(), |i| {
        if ctx.is_eligible(latencies[i]) { carbons[i] } else { f64::INFINITY }
    })
}
