use std::time::Duration;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_RATE_LIMIT_FALLBACK: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ACCRUAL_ADDRESS: &str = "http://127.0.0.1:8080";
/// The longest `Retry-After` the client will honor.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Base address of the accrual service, e.g. `http://accrual:8080`.
    pub accrual_address: String,
    /// The number of concurrent workers calling the accrual service.
    pub workers: usize,
    /// The pause before each order is queued, and between empty discovery passes.
    pub discovery_interval: Duration,
    /// How long to back off when the accrual service rate-limits us without saying for how long.
    pub rate_limit_fallback: Duration,
    /// Upper bound on a single accrual request.
    pub request_timeout: Duration,
    /// Capacity of the queue between discovery and the workers. Defaults to the number of workers.
    pub queue_capacity: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            accrual_address: DEFAULT_ACCRUAL_ADDRESS.to_string(),
            workers: DEFAULT_WORKERS,
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            rate_limit_fallback: DEFAULT_RATE_LIMIT_FALLBACK,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            queue_capacity: None,
        }
    }
}

impl EngineConfig {
    pub fn new(accrual_address: &str) -> Self {
        Self { accrual_address: accrual_address.to_string(), ..Default::default() }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    pub fn with_rate_limit_fallback(mut self, fallback: Duration) -> Self {
        self.rate_limit_fallback = fallback;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// The worker count, never less than one.
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }

    pub fn queue_size(&self) -> usize {
        self.queue_capacity.unwrap_or(self.workers).max(1)
    }
}
