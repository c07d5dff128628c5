//! Queue scenarios reproducing the classic producer/consumer exercises:
//! - Producers only and consumers only runs
//! - Mixed runs with producers and consumers racing
//! - Alternating stress runs

pub mod queue_harness;

pub use queue_harness::QueueHarness;
