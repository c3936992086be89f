use crate::constants::network::TIMEOUT_API_REQUEST_MS;
use crate::errors::ToolError;

pub const ENV_URL: &str = "REDASH_URL";
pub const ENV_API_KEY: &str = "REDASH_API_KEY";
pub const ENV_TIMEOUT: &str = "REDASH_TIMEOUT";

/// Connection settings for the upstream Redash instance. Missing URL or key is
/// fatal at startup; the server never serves requests without them.
#[derive(Debug, Clone)]
pub struct RedashConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

impl RedashConfig {
    pub fn from_env() -> Result<Self, ToolError> {
        let base_url = read_trimmed(ENV_URL);
        let api_key = read_trimmed(ENV_API_KEY);

        let (Some(base_url), Some(api_key)) = (base_url, api_key) else {
            return Err(ToolError::config(format!(
                "{} and {} must be provided",
                ENV_URL, ENV_API_KEY
            )));
        };

        let timeout_ms = match std::env::var(ENV_TIMEOUT) {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ToolError::config(format!("{} must be a positive integer (ms)", ENV_TIMEOUT))
            })?,
            Err(_) => TIMEOUT_API_REQUEST_MS,
        };

        Ok(Self {
            base_url,
            api_key,
            timeout_ms,
        })
    }
}

fn read_trimmed(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
