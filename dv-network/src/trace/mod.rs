//! Recording of simulation events, used for logging, statistics and replay logs

pub mod stats;
pub mod step;
pub mod tracer;
