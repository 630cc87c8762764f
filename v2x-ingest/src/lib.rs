pub mod config;
pub mod dedup;
pub mod geometry;
pub mod metrics_consts;
pub mod pipeline;
pub mod record;
pub mod server;
pub mod service;
pub mod sinks;
pub mod wire;
pub mod worker;
