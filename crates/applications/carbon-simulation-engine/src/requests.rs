//! Synthetic request stream
//!
//! The stream is generated once per simulation and replayed verbatim for every
//! policy, so all policies see the same traffic mix.

use rand::Rng;
use rand::distributions::WeightedIndex;
use rand_distr::Distribution;
use tracing::debug;

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::types::Request;

/// Aligned request columns: hour, user location and workload indices
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestStream {
    pub hours: Vec<usize>,
    pub user_locations: Vec<usize>,
    pub workloads: Vec<usize>,
}

impl RequestStream {
    pub fn len(&self) -> usize {
        self.hours.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    pub fn get(&self, index: usize) -> Request {
        Request {
            hour: self.hours[index],
            user_location: self.user_locations[index],
            workload: self.workloads[index],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Request> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Number of requests per workload index
    pub fn workload_counts(&self, num_workloads: usize) -> Vec<usize> {
        let mut counts = vec![0; num_workloads];
        for &w in &self.workloads {
            counts[w] += 1;
        }
        counts
    }
}

/// Categorical request generator
pub struct RequestGenerator {
    hours: usize,
    requests_per_hour: usize,
    user_weights: WeightedIndex<f64>,
    workload_weights: WeightedIndex<f64>,
}

impl RequestGenerator {
    pub fn new(config: &SimConfig) -> Result<Self> {
        let user_weights =
            WeightedIndex::new(config.user_probabilities()).map_err(SimError::distribution)?;
        let workload_weights =
            WeightedIndex::new(config.workload_probabilities()).map_err(SimError::distribution)?;

        Ok(RequestGenerator {
            hours: config.simulation.hours,
            requests_per_hour: config.simulation.requests_per_hour,
            user_weights,
            workload_weights,
        })
    }

    /// Draw the full stream: all user locations first, then all workloads
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> RequestStream {
        let total = self.hours * self.requests_per_hour;

        let hours = (0..self.hours)
            .flat_map(|h| std::iter::repeat_n(h, self.requests_per_hour))
            .collect();
        let user_locations = (0..total).map(|_| self.user_weights.sample(rng)).collect();
        let workloads = (0..total).map(|_| self.workload_weights.sample(rng)).collect();

        debug!(total, "Generated request stream");
        RequestStream { hours, user_locations, workloads }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeding::{Stream, stream_rng};

    fn small_config(hours: usize, rph: usize) -> SimConfig {
        let mut config = SimConfig::default();
        config.simulation.hours = hours;
        config.simulation.requests_per_hour = rph;
        config
    }

    #[test]
    fn test_hours_repeat_in_order() {
        let config = small_config(3, 4);
        let generator = RequestGenerator::new(&config).unwrap();
        let stream = generator.generate(&mut stream_rng(42, Stream::Requests));

        assert_eq!(stream.len(), 12);
        assert_eq!(stream.hours, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]);
        assert_eq!(stream.user_locations.len(), 12);
        assert_eq!(stream.workloads.len(), 12);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let config = small_config(5, 50);
        let generator = RequestGenerator::new(&config).unwrap();
        let a = generator.generate(&mut stream_rng(7, Stream::Requests));
        let b = generator.generate(&mut stream_rng(7, Stream::Requests));
        assert_eq!(a, b);
    }

    #[test]
    fn test_mix_follows_probabilities() {
        let config = small_config(100, 100);
        let generator = RequestGenerator::new(&config).unwrap();
        let stream = generator.generate(&mut stream_rng(42, Stream::Requests));

        let counts = stream.workload_counts(config.workloads.len());
        let total = stream.len() as f64;
        for (count, w) in counts.iter().zip(&config.workloads) {
            let share = *count as f64 / total;
            assert!((share - w.mix_probability).abs() < 0.02, "share {share} for {}", w.id);
        }

        let na = stream.user_locations.iter().filter(|&&u| u == 0).count() as f64 / total;
        assert!((na - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_zero_probability_never_drawn() {
        let mut config = small_config(10, 100);
        config.workloads[2].mix_probability = 0.0;
        config.workloads[0].mix_probability = 0.7;

        let generator = RequestGenerator::new(&config).unwrap();
        let stream = generator.generate(&mut stream_rng(1, Stream::Requests));
        assert!(stream.workloads.iter().all(|&w| w != 2));
    }
}
