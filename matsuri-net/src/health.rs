//! Connection health tracking.

use tracing::{info, warn};

use crate::types::HealthStatus;

/// Remembers the last health flag and reports only when it flips.
///
/// Starts `Disconnected`, so the first successful check is a transition.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    status: HealthStatus,
    transitions: u64,
    checks: u64,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    /// A monitor in the `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: HealthStatus::Disconnected,
            transitions: 0,
            checks: 0,
        }
    }

    /// Record a check result. Returns the new status if it differs from the
    /// previous one.
    pub fn observe(&mut self, status: HealthStatus) -> Option<HealthStatus> {
        self.checks += 1;
        if status == self.status {
            return None;
        }
        self.status = status;
        self.transitions += 1;
        match status {
            HealthStatus::Connected => info!("Dialog service connected"),
            HealthStatus::Disconnected => warn!("Dialog service disconnected"),
        }
        Some(status)
    }

    /// Current flag.
    #[must_use]
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    /// Whether the service is currently considered reachable.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    /// Number of flips so far.
    #[must_use]
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Number of observed checks.
    #[must_use]
    pub fn checks(&self) -> u64 {
        self.checks
    }
}
