use std::collections::HashMap;
use std::time::Duration;

use common_kafka::config::KafkaConfig;
use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "::")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3301")]
    pub port: u16,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    // Base consumer group name; each pipeline joins as "<base>-<concern>"
    // so the geo and counts consumers keep independent offsets on the same
    // input topics.
    #[envconfig(default = "v2x-ingest")]
    pub consumer_group: String,

    #[envconfig(default = "topic.OdeBsmJson")]
    pub bsm_topic: String,

    #[envconfig(default = "topic.OdePsmJson")]
    pub psm_topic: String,

    #[envconfig(default = "topic.OdeMapJson")]
    pub map_topic: String,

    #[envconfig(default = "topic.GeoMsgRecords")]
    pub geo_records_topic: String,

    #[envconfig(default = "topic.MapInfo")]
    pub map_records_topic: String,

    #[envconfig(default = "topic.CountMetrics")]
    pub counts_topic: String,

    #[envconfig(default = "5")]
    pub workers_per_topic: usize,

    #[envconfig(default = "60")]
    pub freshness_minutes: i64,

    #[envconfig(default = "60")]
    pub count_flush_minutes: u64,

    // JSON object mapping source address to a location label for count
    // reports, e.g. {"10.0.0.5": "I-70 EB"}. Unlisted sources report as
    // "Unknown".
    #[envconfig(default = "{}")]
    pub source_locations: String,

    // When false, records and count reports go to stdout instead of Kafka.
    #[envconfig(default = "true")]
    pub emit_records: bool,
}

impl Config {
    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn freshness_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.freshness_minutes)
    }

    pub fn count_flush_period(&self) -> Duration {
        Duration::from_secs(self.count_flush_minutes * 60)
    }

    pub fn location_labels(&self) -> Result<HashMap<String, String>, serde_json::Error> {
        serde_json::from_str(&self.source_locations)
    }

    pub fn group_for(&self, concern: &str) -> String {
        format!("{}-{}", self.consumer_group, concern)
    }
}
