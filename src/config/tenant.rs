//! Tenant catalog records.

use serde::{Deserialize, Serialize};

/// An API consumer, identified by the issuer claim of its credential.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Tenant {
    /// Tenant id; matched against the token issuer.
    pub app_id: String,

    pub name: String,

    /// Shared secret handed to the tenant at registration.
    pub secret: String,

    /// Client IPs (or IP prefixes) the tenant may call from; empty allows all.
    pub white_ips: Vec<String>,

    /// Requests per day; 0 disables.
    pub qpd: u64,

    /// Requests per second; 0 disables.
    pub qps: u32,
}

impl Tenant {
    /// Whether `client_ip` passes the tenant's IP allow-list.
    pub fn allows_ip(&self, client_ip: &str) -> bool {
        self.white_ips.is_empty()
            || self
                .white_ips
                .iter()
                .any(|allowed| client_ip.starts_with(allowed.as_str()))
    }
}
