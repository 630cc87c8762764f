pub const MESSAGES_RECEIVED: &str = "v2x_ingest_messages_received";
pub const RECORDS_ACCEPTED: &str = "v2x_ingest_records_accepted";
pub const DUPLICATES_DROPPED: &str = "v2x_ingest_duplicates_dropped";
pub const MALFORMED_DROPPED: &str = "v2x_ingest_malformed_dropped";
pub const EMPTY_PAYLOADS: &str = "v2x_ingest_empty_payloads";
pub const SOURCE_ERRORS: &str = "v2x_ingest_source_errors";
pub const SINK_FAILURES: &str = "v2x_ingest_sink_failures";
pub const RECORDS_PUBLISHED: &str = "v2x_ingest_records_published";
pub const COUNT_REPORTS_PUBLISHED: &str = "v2x_ingest_count_reports_published";
pub const COUNT_FLUSH_FAILURES: &str = "v2x_ingest_count_flush_failures";
pub const CACHE_ENTRIES: &str = "v2x_ingest_cache_entries";
pub const CACHE_SWEEPS: &str = "v2x_ingest_cache_sweeps";
