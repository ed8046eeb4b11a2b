use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct CliOpt {
    /// Path to the JSON file containing the network graph
    #[arg(long)]
    pub network_graph: PathBuf,

    /// Path to the JSON file containing the data packets hosts should send during the run
    #[arg(long)]
    pub traffic: Option<PathBuf>,

    /// The duration of the run, after which all nodes and links are stopped
    #[arg(long, default_value_t = 5_000)]
    pub duration_ms: u64,

    /// The capacity of each interface queue, for nodes that don't specify their own (0 means
    /// unbounded)
    #[arg(long, default_value_t = 0)]
    pub max_queue_size: usize,

    /// The interval at which routers advertise their routing table unprompted (0 disables
    /// periodic advertisements, so only routing table changes are advertised)
    #[arg(long, default_value_t = 1_000)]
    pub advertisement_interval_ms: u64,

    /// The interval at which idle nodes and links check their queues again
    #[arg(long, default_value_t = 1)]
    pub poll_interval_ms: u64,

    /// The random seed used for the simulated network (governing packet loss)
    #[arg(long, default_value_t = 42)]
    pub network_rng_seed: u64,

    /// Whether the run should be non-deterministic, i.e. using a non-constant seed for the random
    /// number generators
    #[arg(long)]
    pub non_deterministic: bool,

    /// Path where the replay log should be stored
    #[arg(long, default_value = "replay-log.json")]
    pub replay_log: PathBuf,
}
