use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    /// Additional fetch attempts after the first failure.
    pub fetch_retries: u32,
    pub cache_ttl_secs: u64,
    /// Product ids per batch within a category.
    pub batch_size: usize,
    /// Concurrent product-processing tasks per batch.
    pub batch_workers: usize,
    pub ledger_path: PathBuf,
    pub zara_base_url: String,
    pub pullbear_base_url: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("fetch_retries", &self.fetch_retries)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("batch_size", &self.batch_size)
            .field("batch_workers", &self.batch_workers)
            .field("ledger_path", &self.ledger_path)
            .field("zara_base_url", &self.zara_base_url)
            .field("pullbear_base_url", &self.pullbear_base_url)
            .finish()
    }
}
