//! Reusable stress testing infrastructure for the `foundation_monitor` queue.
//!
//! This crate provides:
//! - **Stress test framework**: thread x iteration runs over cancellable threads
//! - **Queue scenarios**: producers only, consumers only, mixed and alternating
//!   stress runs with produced/consumed counters and a sum balance check
//! - **Run reports**: counts, duration and throughput in a printable report
//!
//! # Examples
//!
//! ```rust
//! use foundation_testing::{HarnessConfig, QueueHarness};
//!
//! let config = HarnessConfig::new().capacity(10);
//! let harness = QueueHarness::new(&config).expect("capacity is positive");
//!
//! let report = harness.run_mixed(4, 4, 50, 50);
//!
//! assert_eq!(report.produced, 200);
//! assert_eq!(report.consumed, 200);
//! assert!(report.is_balanced());
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)] // Common for testing crates

pub mod config;
pub mod metrics;
pub mod scenarios;
pub mod stress;

// Re-export commonly used items
pub use config::HarnessConfig;
pub use metrics::{Counters, RunReport};
pub use scenarios::QueueHarness;
pub use stress::{StressHarness, StressResult};
