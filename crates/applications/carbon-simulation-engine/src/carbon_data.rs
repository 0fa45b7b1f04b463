//! Synthetic carbon intensity traces
//!
//! Models regional grid carbon intensity as a base level modulated by:
//! - A diurnal (24h) sinusoidal cycle
//! - Multiplicative noise (uniform or normal)
//! - A hard positive floor, so values never reach zero

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use tracing::debug;

use crate::config::{NoiseDistribution, RegionConfig, SimConfig};
use crate::error::{Result, SimError};
use crate::types::CarbonTrace;

/// Multiplicative noise factor sampler
enum NoiseSampler {
    Uniform(Uniform<f64>),
    Normal(Normal<f64>),
}

impl NoiseSampler {
    fn new(kind: NoiseDistribution, fraction: f64) -> Result<Self> {
        match kind {
            NoiseDistribution::Uniform => Ok(NoiseSampler::Uniform(Uniform::new_inclusive(
                1.0 - fraction,
                1.0 + fraction,
            ))),
            NoiseDistribution::Normal => Normal::new(1.0, fraction)
                .map(NoiseSampler::Normal)
                .map_err(SimError::distribution),
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            NoiseSampler::Uniform(d) => d.sample(rng),
            NoiseSampler::Normal(d) => d.sample(rng),
        }
    }
}

/// Carbon trace generator with a diurnal cycle
pub struct CarbonTraceGenerator<'a> {
    regions: &'a [RegionConfig],
    amplitude: f64,
    phase_hours: f64,
    noise_fraction: f64,
    noise_distribution: NoiseDistribution,
    floor: f64,
}

impl<'a> CarbonTraceGenerator<'a> {
    /// Create a generator from the region table and trace-shape parameters
    pub fn new(config: &'a SimConfig) -> Self {
        let p = &config.simulation;
        CarbonTraceGenerator {
            regions: &config.regions,
            amplitude: p.diurnal_amplitude,
            phase_hours: p.diurnal_phase_hours,
            noise_fraction: p.noise_fraction,
            noise_distribution: p.noise_distribution,
            floor: p.carbon_floor,
        }
    }

    /// Noise-free diurnal factor for a given hour of the day
    pub fn diurnal_factor(&self, hour_of_day: usize) -> f64 {
        let angle = 2.0 * std::f64::consts::PI * (hour_of_day as f64 - self.phase_hours) / 24.0;
        1.0 + self.amplitude * angle.sin()
    }

    /// Generate `hours` hourly samples for every region
    ///
    /// Regions are sampled region-major (all hours of the first region, then the
    /// next), consuming the generator in that order.
    pub fn generate<R: Rng + ?Sized>(&self, hours: usize, rng: &mut R) -> Result<CarbonTrace> {
        let noise = NoiseSampler::new(self.noise_distribution, self.noise_fraction)?;
        let mut values = vec![vec![0.0; self.regions.len()]; hours];

        for (r, region) in self.regions.iter().enumerate() {
            for (h, row) in values.iter_mut().enumerate() {
                let intensity = region.base_carbon * self.diurnal_factor(h % 24) * noise.sample(rng);
                row[r] = intensity.max(self.floor);
            }
            debug!(region = %region.name, hours, "Generated carbon trace");
        }

        Ok(CarbonTrace {
            regions: self.regions.iter().map(|r| r.name.clone()).collect(),
            values,
        })
    }

    /// Flat trace at each region's base intensity (deterministic, for testing)
    pub fn generate_constant(regions: &[RegionConfig], hours: usize) -> CarbonTrace {
        let row: Vec<f64> = regions.iter().map(|r| r.base_carbon).collect();
        CarbonTrace {
            regions: regions.iter().map(|r| r.name.clone()).collect(),
            values: vec![row; hours],
        }
    }
}
