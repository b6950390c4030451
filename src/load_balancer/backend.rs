//! Backend pool entries.
//!
//! Pool sources publish their active backends as `addr,weight` strings; this
//! module parses and formats them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::service::DEFAULT_WEIGHT;
use crate::load_balancer::LoadBalanceError;

/// One backend and its selection weight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendEntry {
    /// Address as the proxy dials it, including any scheme.
    pub addr: String,
    pub weight: u32,
}

impl BackendEntry {
    pub fn new(addr: impl Into<String>, weight: u32) -> Self {
        Self {
            addr: addr.into(),
            weight,
        }
    }
}

impl FromStr for BackendEntry {
    type Err = LoadBalanceError;

    /// Parse `addr,weight`; a missing weight means the default weight.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, weight) = match s.rsplit_once(',') {
            Some((addr, weight)) => {
                let weight = weight
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| LoadBalanceError::InvalidEntry(s.to_string()))?;
                (addr.trim(), weight)
            }
            None => (s.trim(), DEFAULT_WEIGHT),
        };
        if addr.is_empty() {
            return Err(LoadBalanceError::InvalidEntry(s.to_string()));
        }
        Ok(Self::new(addr, weight))
    }
}

impl fmt::Display for BackendEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.addr, self.weight)
    }
}

/// Parse every entry, skipping (and logging) malformed ones.
pub fn parse_entries(raw: &[String]) -> Vec<BackendEntry> {
    raw.iter()
        .filter_map(|item| match item.parse() {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(entry = %item, error = %e, "Skipping malformed backend entry");
                None
            }
        })
        .collect()
}
