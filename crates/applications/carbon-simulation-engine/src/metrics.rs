//! Reduction of per-request outcomes into policy summaries

use serde::{Deserialize, Serialize};

use crate::config::{RegionConfig, WorkloadConfig};
use crate::policies::Policy;
use crate::types::RequestOutcome;

/// Percentile of a sorted sample with linear interpolation between closest ranks
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 { 0.0 } else { 100.0 * part as f64 / total as f64 }
}

/// Carbon reduction (%) relative to a baseline mean carbon
pub fn carbon_reduction(mean_carbon: f64, baseline_mean_carbon: f64) -> f64 {
    if baseline_mean_carbon <= 0.0 {
        return 0.0;
    }
    100.0 * (1.0 - mean_carbon / baseline_mean_carbon)
}

/// Share of requests routed to one region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSelection {
    pub region: String,
    pub count: usize,
    pub percentage: f64,
}

/// Latency and SLO statistics restricted to one workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadResult {
    pub workload_id: String,
    pub workload_name: String,
    pub request_count: usize,
    pub mean_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub slo_threshold_ms: f64,
    pub slo_violation_rate: f64,
}

/// Aggregate result of one policy pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyResult {
    pub policy_name: String,
    pub policy: Policy,
    pub total_requests: usize,
    pub mean_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub slo_violation_rate: f64,
    pub mean_carbon: f64,
    pub mean_inference_ms: f64,
    pub carbon_reduction: f64,
    pub region_selection: Vec<RegionSelection>,
    pub workloads: Vec<WorkloadResult>,
}

/// Summarizes outcome logs against the region and workload tables
pub struct MetricsAggregator<'a> {
    regions: &'a [RegionConfig],
    workloads: &'a [WorkloadConfig],
}

impl<'a> MetricsAggregator<'a> {
    pub fn new(regions: &'a [RegionConfig], workloads: &'a [WorkloadConfig]) -> Self {
        MetricsAggregator { regions, workloads }
    }

    /// Summarize one policy's outcomes. `carbon_reduction` is left at 0 until
    /// [`apply_carbon_reduction`] sees the baseline.
    pub fn summarize(&self, policy: Policy, outcomes: &[RequestOutcome]) -> PolicyResult {
        let total = outcomes.len();

        let mut latencies: Vec<f64> = outcomes.iter().map(|o| o.latency_ms).collect();
        latencies.sort_by(f64::total_cmp);

        let violations = outcomes.iter().filter(|o| o.slo_violated).count();

        let mut region_counts = vec![0usize; self.regions.len()];
        for o in outcomes {
            region_counts[o.region] += 1;
        }
        let region_selection = self
            .regions
            .iter()
            .zip(region_counts)
            .map(|(region, count)| RegionSelection {
                region: region.name.clone(),
                count,
                percentage: rate(count, total),
            })
            .collect();

        PolicyResult {
            policy_name: policy.name(),
            policy,
            total_requests: total,
            mean_latency_ms: mean(outcomes.iter().map(|o| o.latency_ms)),
            p95_latency_ms: percentile(&latencies, 95.0),
            slo_violation_rate: rate(violations, total),
            mean_carbon: mean(outcomes.iter().map(|o| o.carbon)),
            mean_inference_ms: mean(outcomes.iter().map(|o| o.inference_ms)),
            carbon_reduction: 0.0,
            region_selection,
            workloads: self.summarize_workloads(outcomes),
        }
    }

    /// Per-workload breakdown; workloads with no requests are omitted
    fn summarize_workloads(&self, outcomes: &[RequestOutcome]) -> Vec<WorkloadResult> {
        let mut per_workload: Vec<Vec<f64>> = vec![Vec::new(); self.workloads.len()];
        let mut violations = vec![0usize; self.workloads.len()];
        for o in outcomes {
            per_workload[o.workload].push(o.latency_ms);
            if o.slo_violated {
                violations[o.workload] += 1;
            }
        }

        self.workloads
            .iter()
            .zip(per_workload)
            .zip(violations)
            .filter(|((_, latencies), _)| !latencies.is_empty())
            .map(|((workload, mut latencies), violated)| {
                let count = latencies.len();
                let mean_latency_ms = mean(latencies.iter().copied());
                latencies.sort_by(f64::total_cmp);
                WorkloadResult {
                    workload_id: workload.id.clone(),
                    workload_name: workload.name.clone(),
                    request_count: count,
                    mean_latency_ms,
                    p95_latency_ms: percentile(&latencies, 95.0),
                    slo_threshold_ms: workload.slo_ms,
                    slo_violation_rate: rate(violated, count),
                }
            })
            .collect()
    }
}

/// Fill in carbon reduction against the Latency-First baseline
///
/// The baseline itself is set to exactly 0. Without a baseline every result
/// keeps 0.
pub fn apply_carbon_reduction(results: &mut [PolicyResult]) {
    let Some(baseline) = results.iter().find(|r| r.policy.is_baseline()).map(|r| r.mean_carbon)
    else {
        return;
    };

    for result in results.iter_mut() {
        result.carbon_reduction = if result.policy.is_baseline() {
            0.0
        } else {
            carbon_reduction(result.mean_carbon, baseline)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    fn outcome(workload: usize, region: usize, latency_ms: f64, carbon: f64, slo: f64) -> RequestOutcome {
        RequestOutcome {
            workload,
            region,
            latency_ms,
            carbon,
            inference_ms: 10.0,
            slo_violated: latency_ms > slo,
        }
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let data: Vec<f64> = (1..=10).map(f64::from).collect();
        // rank = 0.95 * 9 = 8.55 -> 9 + 0.55 * (10 - 9)
        assert!((percentile(&data, 95.0) - 9.55).abs() < 1e-12);
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 100.0), 10.0);
        assert_eq!(percentile(&data, 50.0), 5.5);
        assert_eq!(percentile(&[], 95.0), 0.0);
        assert_eq!(percentile(&[3.0], 95.0), 3.0);
    }

    #[test]
    fn test_summarize_policy() {
        let config = SimConfig::default();
        let aggregator = MetricsAggregator::new(&config.regions, &config.workloads);

        let outcomes = vec![
            outcome(0, 0, 80.0, 400.0, 100.0),
            outcome(0, 2, 150.0, 150.0, 100.0),
            outcome(1, 2, 190.0, 150.0, 200.0),
            outcome(1, 1, 260.0, 250.0, 200.0),
        ];

        let result = aggregator.summarize(Policy::CarbonFirst, &outcomes);
        assert_eq!(result.policy_name, "Carbon-First");
        assert_eq!(result.total_requests, 4);
        assert_eq!(result.mean_latency_ms, 170.0);
        assert_eq!(result.slo_violation_rate, 50.0);
        assert_eq!(result.mean_carbon, 237.5);
        assert_eq!(result.mean_inference_ms, 10.0);

        let counts: Vec<usize> = result.region_selection.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![1, 1, 2, 0]);
        assert_eq!(result.region_selection[2].percentage, 50.0);
        assert_eq!(result.region_selection[3].region, "asia");

        // ResNet-50 had no requests and is omitted
        assert_eq!(result.workloads.len(), 2);
        let bert_base = &result.workloads[0];
        assert_eq!(bert_base.workload_name, "BERT-base");
        assert_eq!(bert_base.request_count, 2);
        assert_eq!(bert_base.slo_threshold_ms, 100.0);
        assert_eq!(bert_base.slo_violation_rate, 50.0);
        assert_eq!(bert_base.mean_latency_ms, 115.0);
    }

    #[test]
    fn test_empty_outcomes_have_no_nan() {
        let config = SimConfig::default();
        let aggregator = MetricsAggregator::new(&config.regions, &config.workloads);
        let result = aggregator.summarize(Policy::LatencyFirst, &[]);

        assert_eq!(result.mean_latency_ms, 0.0);
        assert_eq!(result.slo_violation_rate, 0.0);
        assert!(result.region_selection.iter().all(|r| r.percentage == 0.0));
        assert!(result.workloads.is_empty());
    }

    #[test]
    fn test_carbon_reduction_against_baseline() {
        let config = SimConfig::default();
        let aggregator = MetricsAggregator::new(&config.regions, &config.workloads);

        let mut results = vec![
            aggregator.summarize(Policy::LatencyFirst, &[outcome(0, 0, 50.0, 400.0, 100.0)]),
            aggregator.summarize(Policy::CarbonFirst, &[outcome(0, 2, 150.0, 100.0, 100.0)]),
            aggregator.summarize(Policy::ConstrainedHybrid, &[outcome(0, 3, 50.0, 500.0, 100.0)]),
        ];
        apply_carbon_reduction(&mut results);

        assert_eq!(results[0].carbon_reduction, 0.0);
        assert_eq!(results[1].carbon_reduction, 75.0);
        assert_eq!(results[2].carbon_reduction, -25.0);
    }

    #[test]
    fn test_zero_baseline_carbon_is_guarded() {
        assert_eq!(carbon_reduction(100.0, 0.0), 0.0);
    }
}
