use foundation_testing::{HarnessConfig, QueueHarness, RunReport};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Producers only, sized to fit the queue
    Producers,
    /// Consumers only, draining a pre-filled queue
    Consumers,
    /// Producers and consumers at the same time
    Mixed,
    /// Alternating producer/consumer threads
    Stress,
    /// Every scenario in turn, clearing the queue between them
    All,
}

/// Runs `scenario` and returns one report per executed run.
pub fn run(
    harness: &QueueHarness,
    config: &HarnessConfig,
    scenario: Scenario,
) -> anyhow::Result<Vec<RunReport>> {
    let producers = config.get_producers();
    let consumers = config.get_consumers();
    let capacity = config.get_capacity();

    let reports = match scenario {
        Scenario::Producers => {
            let per_producer = fit(config.get_items_per_producer(), capacity, producers);
            vec![harness.run_producers(producers, per_producer)]
        }
        Scenario::Consumers => {
            let per_consumer = fit(config.get_items_per_consumer(), capacity, consumers);
            let seed: Vec<i64> = (0..per_consumer * consumers)
                .map(|item| i64::try_from(item).unwrap_or(i64::MAX))
                .collect();
            harness.initialize(&seed)?;
            vec![harness.run_consumers(consumers, per_consumer)]
        }
        Scenario::Mixed => vec![harness.run_configured()],
        Scenario::Stress => vec![harness.run_stress(
            stress_threads(producers, consumers),
            config.get_items_per_producer(),
        )],
        Scenario::All => {
            let mut reports = Vec::new();
            for step in [
                Scenario::Producers,
                Scenario::Consumers,
                Scenario::Mixed,
                Scenario::Stress,
            ] {
                if harness.is_interrupted() {
                    tracing::warn!(?step, "interrupted, skipping remaining scenarios");
                    break;
                }
                harness.clear();
                reports.extend(run(harness, config, step)?);
            }
            reports
        }
    };

    Ok(reports)
}

/// Alternating stress runs pair each producer with a consumer; an odd total
/// would leave one producer's items with nobody to take them.
fn stress_threads(producers: usize, consumers: usize) -> usize {
    let threads = producers + consumers;
    threads - threads % 2
}

/// Shrinks a per-thread item count so `threads` threads never need more
/// than `capacity` slots; one-sided runs would otherwise block forever.
fn fit(per_thread: usize, capacity: usize, threads: usize) -> usize {
    if threads == 0 {
        return per_thread;
    }

    let limit = capacity / threads;
    if per_thread > limit {
        tracing::warn!(
            requested = per_thread,
            limit,
            "one-sided run would overflow the queue, reducing items per thread"
        );
        limit
    } else {
        per_thread
    }
}
