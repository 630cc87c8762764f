use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Upper bound on batching delay under light traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // In-memory producer queue size, mebibytes

    #[envconfig(default = "10000000")]
    pub kafka_producer_queue_messages: u32, // Message cap for the in-memory producer queue

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32, // How long a produce keeps retrying before it fails

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,
}
