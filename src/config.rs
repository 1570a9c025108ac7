//! Scheduler configuration

use std::time::Duration;
use wlan_sme_shared::{limits, SchedulerError};

/// Configuration for the command scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of command slots in the pool
    pub pool_capacity: usize,
    /// Ceiling on scan requests tracked at once (active + pending)
    pub max_scan_requests: usize,
    /// Time an active general command may run before escalation
    pub active_timeout: Duration,
    /// Escalate a wedged command to self-recovery instead of a fatal fault
    pub self_recovery: bool,
    /// Timeout monitor tick
    pub monitor_interval: Duration,
    /// Time a session may wait for keys before a disconnect is forced
    pub key_wait_timeout: Duration,
    /// Entries kept in the self-recovery ring
    pub recovery_log_depth: usize,
    /// General-pending entries dumped with fault diagnostics
    pub diag_pending_depth: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_capacity: limits::DEFAULT_POOL_CAPACITY,
            max_scan_requests: limits::DEFAULT_MAX_SCAN_REQUESTS,
            active_timeout: Duration::from_millis(limits::DEFAULT_ACTIVE_TIMEOUT_MS),
            self_recovery: true,
            monitor_interval: Duration::from_millis(limits::DEFAULT_MONITOR_INTERVAL_MS),
            key_wait_timeout: Duration::from_millis(limits::DEFAULT_KEY_WAIT_TIMEOUT_MS),
            recovery_log_depth: limits::DEFAULT_RECOVERY_LOG_DEPTH,
            diag_pending_depth: limits::DEFAULT_DIAG_PENDING_DEPTH,
        }
    }
}

impl SchedulerConfig {
    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.pool_capacity == 0 {
            return Err(SchedulerError::InvalidConfig(
                "pool_capacity must be at least 1".into(),
            ));
        }
        if self.max_scan_requests == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_scan_requests must be at least 1".into(),
            ));
        }
        if self.active_timeout.is_zero() {
            return Err(SchedulerError::InvalidConfig(
                "active_timeout must be non-zero".into(),
            ));
        }
        if self.monitor_interval.is_zero() {
            return Err(SchedulerError::InvalidConfig(
                "monitor_interval must be non-zero".into(),
            ));
        }
        if self.recovery_log_depth == 0 {
            return Err(SchedulerError::InvalidConfig(
                "recovery_log_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.pool_capacity, 40);
        assert_eq!(config.max_scan_requests, 8);
        assert_eq!(config.active_timeout, Duration::from_secs(30));
        assert!(config.self_recovery);
        assert_eq!(config.diag_pending_depth, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = SchedulerConfig {
            pool_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::InvalidConfig(_))
        ));

        let config = SchedulerConfig {
            active_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
