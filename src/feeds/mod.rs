pub mod alerts;
pub mod forecast;
pub mod storms;
pub mod validate;

use std::time::Duration;

use crate::Result;

const HTTP_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("signwx/", env!("CARGO_PKG_VERSION"));

/// Shared blocking HTTP client for all feeds. api.weather.gov rejects
/// requests without a User-Agent, so one is always set.
pub fn client() -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}
