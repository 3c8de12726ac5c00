//! Stub implementations for testing.
//!
//! These implementations stand in for the settings service, the mailer and
//! the wall clock.

use async_trait::async_trait;
use bazaar_domain::{PlatformSettings, PricingPolicy};
use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;

use crate::error::ExecError;
use crate::ports::{Clock, CustomerNotification, NotificationPort, SettingsProvider};

// =============================================================================
// Static Settings
// =============================================================================

/// Settings held in memory, changeable at runtime.
pub struct StaticSettings {
    platform: RwLock<PlatformSettings>,
    pricing: RwLock<PricingPolicy>,
}

impl StaticSettings {
    /// Create with explicit values.
    pub fn new(platform: PlatformSettings, pricing: PricingPolicy) -> Self {
        Self {
            platform: RwLock::new(platform),
            pricing: RwLock::new(pricing),
        }
    }

    /// Replace the platform settings (next call sees the change).
    pub fn set_platform(&self, platform: PlatformSettings) {
        if let Ok(mut current) = self.platform.write() {
            *current = platform;
        }
    }
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self::new(PlatformSettings::default(), PricingPolicy::default())
    }
}

#[async_trait]
impl SettingsProvider for StaticSettings {
    async fn platform_settings(&self) -> Result<PlatformSettings, ExecError> {
        self.platform
            .read()
            .map(|s| *s)
            .map_err(|_| ExecError::Config("settings lock poisoned".to_string()))
    }

    async fn pricing_policy(&self) -> Result<PricingPolicy, ExecError> {
        self.pricing
            .read()
            .map(|p| *p)
            .map_err(|_| ExecError::Config("settings lock poisoned".to_string()))
    }
}

// =============================================================================
// Recording Notifier
// =============================================================================

/// Notifier that records what it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<CustomerNotification>>,
    fail: RwLock<bool>,
    delay: RwLock<Option<std::time::Duration>>,
}

impl RecordingNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail.
    pub fn set_fail(&self, fail: bool) {
        if let Ok(mut f) = self.fail.write() {
            *f = fail;
        }
    }

    /// Make every call sleep before answering.
    pub fn set_delay(&self, delay: Option<std::time::Duration>) {
        if let Ok(mut d) = self.delay.write() {
            *d = delay;
        }
    }

    /// Notifications delivered so far.
    pub fn sent(&self) -> Vec<CustomerNotification> {
        self.sent.read().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn notify(&self, notification: &CustomerNotification) -> Result<(), ExecError> {
        let delay = self.delay.read().map(|d| *d).unwrap_or(None);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.read().map(|f| *f).unwrap_or(false) {
            return Err(ExecError::Collaborator("mailer unavailable".to_string()));
        }
        if let Ok(mut sent) = self.sent.write() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}

/// Notifier that drops everything (daemon default until a mailer is wired).
pub struct LogNotifier;

#[async_trait]
impl NotificationPort for LogNotifier {
    async fn notify(&self, notification: &CustomerNotification) -> Result<(), ExecError> {
        tracing::info!(
            customer_id = %notification.customer_id,
            return_id = %notification.return_id,
            status = %notification.status,
            "Customer notification"
        );
        Ok(())
    }
}

// =============================================================================
// Clocks
// =============================================================================

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a settable instant.
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Freeze at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    /// Move to an absolute instant.
    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut current) = self.now.write() {
            *current = now;
        }
    }

    /// Move forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut current) = self.now.write() {
            *current += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|n| *n).unwrap_or_else(|_| Utc::now())
    }
}
