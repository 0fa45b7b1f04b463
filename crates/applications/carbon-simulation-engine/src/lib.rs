//! Carbon Simulation Engine
//!
//! Simulator for comparing carbon-aware request routing policies for
//! geographically distributed AI inference.
//!
//! ## Pipeline
//!
//! ```text
//! SimConfig ──┬── CarbonTraceGenerator ── CarbonTrace ──┐
//!             └── RequestGenerator ───── RequestStream ─┼── Simulator ── MetricsAggregator ── report
//!                                    per-request samples┘   (per policy)
//! ```
//!
//! The carbon trace, request stream and per-request random samples are
//! generated once and shared by every policy pass, so differences between
//! policies come from routing decisions alone.

pub mod carbon_data;
pub mod config;
pub mod error;
pub mod metrics;
pub mod policies;
pub mod report;
pub mod requests;
pub mod seeding;
pub mod simulator;
pub mod types;

pub use config::{SimConfig, SimulationParams};
pub use error::{Result, SimError};
pub use metrics::PolicyResult;
pub use policies::Policy;
pub use simulator::{SimulationReport, Simulator};
