//! Network throughput meter
//!
//! Samples cumulative interface counters on an adaptive cadence and publishes
//! download and upload rates to any number of renderers.

pub mod cli;
pub mod collectors;
pub mod dashboard;
pub mod display;
pub mod sampler;
pub mod settings;
