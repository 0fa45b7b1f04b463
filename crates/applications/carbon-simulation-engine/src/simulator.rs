//! Per-request routing simulation
//!
//! Builds the shared inputs once (carbon trace, request stream, per-request
//! random samples, normalization bounds) and replays them against each policy.
//! Policy passes only read these inputs, so every policy sees the same
//! realization of randomness and outcome differences come from routing alone.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::carbon_data::CarbonTraceGenerator;
use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::metrics::{MetricsAggregator, PolicyResult, apply_carbon_reduction};
use crate::policies::{NormalizationBounds, Policy, PolicyContext};
use crate::requests::{RequestGenerator, RequestStream};
use crate::seeding::{Stream, stream_rng};
use crate::types::{CarbonTrace, LatencyMatrix, RequestOutcome, RequestSample};

/// Lower bound on realized end-to-end latency (ms)
pub const MIN_TOTAL_LATENCY_MS: f64 = 1.0;

/// Results of comparing every policy over one simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub hours: usize,
    pub requests_per_hour: usize,
    pub total_requests: usize,
    pub results: Vec<PolicyResult>,
}

impl SimulationReport {
    /// Result for a policy by display name
    pub fn result(&self, policy_name: &str) -> Option<&PolicyResult> {
        self.results.iter().find(|r| r.policy_name == policy_name)
    }
}

/// Routing simulator over shared, read-only inputs
#[derive(Debug)]
pub struct Simulator {
    config: SimConfig,
    latency_matrix: LatencyMatrix,
    carbon_trace: CarbonTrace,
    requests: RequestStream,
    samples: Vec<RequestSample>,
    bounds: NormalizationBounds,
    /// Constrained-Hybrid context per workload
    contexts: Vec<PolicyContext>,
}

impl Simulator {
    /// Validate the configuration and generate all shared inputs
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = stream_rng(config.simulation.seed, Stream::CarbonTrace);
        let carbon_trace =
            CarbonTraceGenerator::new(&config).generate(config.simulation.hours, &mut rng)?;
        Self::with_trace(config, carbon_trace)
    }

    /// Build a simulator over a caller-supplied carbon trace
    ///
    /// The trace must name the configured regions in config order and cover at
    /// least `hours`; hours past the simulation window are dropped before the
    /// normalization bounds are computed.
    pub fn with_trace(config: SimConfig, mut carbon_trace: CarbonTrace) -> Result<Self> {
        config.validate()?;
        let p = &config.simulation;

        if carbon_trace.regions != config.region_names() {
            return Err(SimError::config(format!(
                "carbon trace regions {:?} do not match configured regions {:?}",
                carbon_trace.regions,
                config.region_names()
            )));
        }
        if carbon_trace.hours() < p.hours {
            return Err(SimError::config(format!(
                "carbon trace covers {} hours, simulation needs {}",
                carbon_trace.hours(),
                p.hours
            )));
        }
        carbon_trace.values.truncate(p.hours);
        if carbon_trace.values.iter().any(|row| row.len() != config.regions.len()) {
            return Err(SimError::config(format!(
                "carbon trace rows must have {} entries",
                config.regions.len()
            )));
        }
        if carbon_trace.values.iter().flatten().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(SimError::config("carbon trace values must be positive"));
        }

        let requests =
            RequestGenerator::new(&config)?.generate(&mut stream_rng(p.seed, Stream::Requests));
        let samples =
            Self::sample_requests(&config, &requests, &mut stream_rng(p.seed, Stream::Samples))?;

        let latency_matrix = LatencyMatrix::from_config(&config);
        let bounds = NormalizationBounds::new(latency_matrix.bounds(), carbon_trace.bounds());

        let jitter_buffer_ms = p.jitter_buffer_ms();
        let contexts = config
            .workloads
            .iter()
            .map(|w| PolicyContext {
                slo_ms: w.slo_ms,
                expected_inference_ms: w.mean_inference_ms,
                jitter_buffer_ms,
            })
            .collect();

        info!(
            hours = p.hours,
            requests = requests.len(),
            regions = config.regions.len(),
            seed = p.seed,
            "Simulation inputs generated"
        );
        debug!(?bounds, "Hybrid normalization bounds");
        debug!(
            workload_counts = ?requests.workload_counts(config.workloads.len()),
            "Request mix"
        );

        Ok(Simulator {
            config,
            latency_matrix,
            carbon_trace,
            requests,
            samples,
            bounds,
            contexts,
        })
    }

    /// Draw inference time and jitter for every request, in stream order
    fn sample_requests<R: Rng + ?Sized>(
        config: &SimConfig,
        requests: &RequestStream,
        rng: &mut R,
    ) -> Result<Vec<RequestSample>> {
        let p = &config.simulation;
        let inference: Vec<Normal<f64>> = config
            .workloads
            .iter()
            .map(|w| Normal::new(w.mean_inference_ms, w.std_inference_ms))
            .collect::<std::result::Result<_, _>>()
            .map_err(SimError::distribution)?;
        let jitter = Normal::new(p.jitter_mean_ms, p.jitter_std_ms).map_err(SimError::distribution)?;

        Ok(requests
            .workloads
            .iter()
            .map(|&w| {
                let inference_ms = inference[w].sample(rng).max(p.min_inference_ms);
                let jitter_ms = jitter.sample(rng).max(0.0);
                RequestSample { inference_ms, jitter_ms }
            })
            .collect())
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn carbon_trace(&self) -> &CarbonTrace {
        &self.carbon_trace
    }

    pub fn latency_matrix(&self) -> &LatencyMatrix {
        &self.latency_matrix
    }

    pub fn requests(&self) -> &RequestStream {
        &self.requests
    }

    pub fn samples(&self) -> &[RequestSample] {
        &self.samples
    }

    pub fn bounds(&self) -> &NormalizationBounds {
        &self.bounds
    }

    /// Policies compared in this run, baseline first
    pub fn policies(&self) -> Vec<Policy> {
        Policy::roster(&self.config.simulation.hybrid_alphas)
    }

    /// Region chosen by `policy` for request `index`
    pub fn decide(&self, policy: Policy, index: usize) -> usize {
        let request = self.requests.get(index);
        policy.select(
            self.latency_matrix.row(request.user_location),
            self.carbon_trace.at_hour(request.hour),
            &self.bounds,
            &self.contexts[request.workload],
        )
    }

    /// Replay the request stream through one policy
    pub fn run_policy(&self, policy: Policy) -> Vec<RequestOutcome> {
        self.samples
            .iter()
            .enumerate()
            .map(|(i, sample)| {
                let request = self.requests.get(i);
                let region = self.decide(policy, i);
                let ctx = &self.contexts[request.workload];

                let network_ms = self.latency_matrix.row(request.user_location)[region];
                let latency_ms =
                    (network_ms + sample.inference_ms + sample.jitter_ms).max(MIN_TOTAL_LATENCY_MS);

                RequestOutcome {
                    workload: request.workload,
                    region,
                    latency_ms,
                    carbon: self.carbon_trace.at_hour(request.hour)[region],
                    inference_ms: sample.inference_ms,
                    slo_violated: latency_ms > ctx.slo_ms,
                }
            })
            .collect()
    }

    /// Run one policy and summarize its outcomes
    pub fn evaluate(&self, policy: Policy) -> PolicyResult {
        let outcomes = self.run_policy(policy);
        let aggregator = MetricsAggregator::new(&self.config.regions, &self.config.workloads);
        let result = aggregator.summarize(policy, &outcomes);

        info!(
            policy = %result.policy_name,
            mean_latency_ms = result.mean_latency_ms,
            slo_violation_rate = result.slo_violation_rate,
            mean_carbon = result.mean_carbon,
            "Policy evaluated"
        );
        result
    }

    /// Evaluate every policy sequentially
    pub fn run_all(&self) -> SimulationReport {
        let results = self.policies().into_iter().map(|p| self.evaluate(p)).collect();
        self.finish(results)
    }

    /// Evaluate every policy on its own blocking task
    ///
    /// Produces the same report as [`Simulator::run_all`]; tasks only read the
    /// shared inputs.
    #[cfg(feature = "async")]
    pub async fn run_all_concurrent(self: std::sync::Arc<Self>) -> Result<SimulationReport> {
        let handles: Vec<_> = self
            .policies()
            .into_iter()
            .map(|policy| {
                let sim = std::sync::Arc::clone(&self);
                tokio::task::spawn_blocking(move || sim.evaluate(policy))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.map_err(|e| SimError::Task(e.to_string()))?);
        }
        Ok(self.finish(results))
    }

    fn finish(&self, mut results: Vec<PolicyResult>) -> SimulationReport {
        apply_carbon_reduction(&mut results);
        let p = &self.config.simulation;
        SimulationReport {
            seed: p.seed,
            hours: p.hours,
            requests_per_hour: p.requests_per_hour,
            total_requests: self.requests.len(),
            results,
        }
    }
}
