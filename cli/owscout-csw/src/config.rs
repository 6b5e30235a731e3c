//! Configuration for catalogue client construction.

use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for catalogue client construction.
#[derive(Debug, Clone)]
pub struct CswClientConfig {
    /// Base URL of the catalogue endpoint.
    pub endpoint_url: String,
    /// Additional headers to include in every request.
    pub extra_headers: BTreeMap<String, String>,
    /// User agent reported to the server.
    pub user_agent: Option<String>,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Timeout for a whole request/response exchange.
    pub request_timeout: Duration,
}

impl CswClientConfig {
    pub fn new(endpoint_url: impl Into<String>) -> Self {
        CswClientConfig {
            endpoint_url: endpoint_url.into(),
            extra_headers: BTreeMap::new(),
            user_agent: None,
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(60),
        }
    }
}
