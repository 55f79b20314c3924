//! Client-side navigation detection.
//!
//! Single-page apps change the address without reloading, so the address is
//! polled and compared with the last value seen.

use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationChange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Default)]
pub struct NavigationMonitor {
    last_address: Option<String>,
}

impl NavigationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the starting address without reporting a change
    pub fn prime(&mut self, address: &str) {
        self.last_address = Some(address.to_string());
    }

    /// Compare `address` with the last one seen
    pub fn poll(&mut self, address: &str) -> Option<NavigationChange> {
        match &self.last_address {
            None => {
                self.prime(address);
                None
            }
            Some(last) if last == address => None,
            Some(last) => {
                let change = NavigationChange {
                    from: last.clone(),
                    to: address.to_string(),
                };
                info!("Navigation: {} -> {}", change.from, change.to);
                self.last_address = Some(address.to_string());
                Some(change)
            }
        }
    }

    pub fn last_address(&self) -> Option<&str> {
        self.last_address.as_deref()
    }

    pub fn reset(&mut self) {
        self.last_address = None;
    }
}
