use crate::config::cli::CliOpt;
use crate::config::network::{NetworkSpecJson, TrafficJson};
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod cli;
pub mod network;

pub struct NetworkConfig {
    pub network_graph: NetworkSpecJson,
    pub traffic: Vec<TrafficJson>,
}

pub fn load_network_config(options: &CliOpt) -> anyhow::Result<NetworkConfig> {
    let network_graph = load_json(&options.network_graph)?;
    let traffic = match &options.traffic {
        Some(path) => load_json(path)?,
        None => Vec::new(),
    };

    Ok(NetworkConfig {
        network_graph,
        traffic,
    })
}

fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid JSON in {}", path.display()))
}
