use crate::config::cli::CliOpt;
use crate::config::load_network_config;
use crate::util::{print_link_stats, print_node_stats, print_received_data, print_routing_tables};
use anyhow::Context;
use dv_network::network::InMemoryNetwork;
use dv_network::network::spec::NodeSettings;
use dv_network::trace::tracer::NetworkTracer;
use fastrand::Rng;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub async fn run(options: &CliOpt) -> anyhow::Result<()> {
    let network_config = load_network_config(options)?;

    let network_rng_seed = if options.non_deterministic {
        Rng::new().u64(..)
    } else {
        options.network_rng_seed
    };

    let settings = NodeSettings {
        poll_interval: Duration::from_millis(options.poll_interval_ms.max(1)),
        advertisement_interval: match options.advertisement_interval_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        },
        ..NodeSettings::default()
    };

    let network_spec = network_config
        .network_graph
        .into_spec(settings, options.max_queue_size);
    let tracer = Arc::new(NetworkTracer::new());
    let network = InMemoryNetwork::initialize(
        network_spec,
        tracer.clone(),
        Rng::with_seed(network_rng_seed),
    )
    .context("failed to initialize network")?;

    println!("--- Network ---");
    println!("* Network rng seed: {network_rng_seed}");
    println!(
        "* {} hosts, {} routers",
        network.hosts().count(),
        network.routers().count()
    );

    let duration = Duration::from_millis(options.duration_ms);
    let simulation_start = Instant::now();
    network.start()?;

    let mut traffic = network_config.traffic;
    traffic.sort_by_key(|t| t.at_ms);
    for t in traffic {
        let send_at = Duration::from_millis(t.at_ms);
        if send_at >= duration {
            tracing::warn!(
                source = %t.source,
                destination = %t.destination,
                "skipping traffic scheduled after the end of the run ({}ms)",
                t.at_ms
            );
            continue;
        }

        tokio::time::sleep_until(simulation_start + send_at).await;
        if let Err(e) = network.send(&t.source, t.destination, t.payload) {
            tracing::warn!("{e:#}");
        }
    }

    tokio::time::sleep_until(simulation_start + duration).await;
    network.stop().await;
    println!("{:.2}s Done", simulation_start.elapsed().as_secs_f64());

    print_routing_tables(&network);
    print_received_data(&network);

    let stats = network.stats();
    print_node_stats(&stats, &network);
    print_link_stats(&stats);

    println!("--- Replay log ---");
    let replay_log_path = &options.replay_log;
    let json_steps =
        serde_json::to_vec_pretty(&tracer.steps()).context("failed to serialize replay log")?;
    fs::write(replay_log_path, json_steps).context("failed to store replay log")?;
    println!("* Replay log available at {}", replay_log_path.display());

    Ok(())
}
