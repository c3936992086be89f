pub mod network {
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
}

pub mod polling {
    pub const EXECUTE_TIMEOUT_MS: u64 = 60_000;
    pub const POLL_INTERVAL_MS: u64 = 1_000;
    pub const STATUS_SUCCEEDED: i64 = 3;
    pub const STATUS_FAILED: i64 = 4;
}

pub mod pagination {
    pub const DEFAULT_PAGE: u64 = 1;
    pub const DEFAULT_PAGE_SIZE: u64 = 25;
    pub const RESOURCE_LIST_PAGE_SIZE: u64 = 100;
}

pub mod results {
    pub const DEFAULT_MAX_AGE_SECONDS: u64 = 86_400;
}
