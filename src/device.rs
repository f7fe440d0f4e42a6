//! Device record contract consumed by command dispatch
//!
//! The record store that owns devices lives outside this crate; dispatch only
//! needs identity, the owning server and the command counters.

use chrono::{DateTime, Utc};

pub trait DeviceRecord {
    fn account_id(&self) -> &str;
    fn device_id(&self) -> &str;
    /// Name of the DCS the device reports through
    fn server_id(&self) -> &str;
    fn is_active(&self) -> bool;
    fn sim_phone_number(&self) -> Option<&str> {
        None
    }
    /// Commands sent so far in the current accounting period
    fn total_ping_count(&self) -> u32;
    /// Command allowance; zero means unlimited
    fn max_ping_count(&self) -> u32;
    /// Record one delivered command
    fn increment_ping_count(&mut self, at: DateTime<Utc>);

    /// True when a positive allowance has been used up
    fn is_over_limit(&self) -> bool {
        let max = self.max_ping_count();
        max > 0 && self.total_ping_count() >= max
    }
}

/// Plain in-memory device, used by the tools and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryDevice {
    pub account_id: String,
    pub device_id: String,
    pub server_id: String,
    pub active: bool,
    pub sim_phone_number: Option<String>,
    pub total_ping_count: u32,
    pub max_ping_count: u32,
    pub last_ping_time: Option<DateTime<Utc>>,
}

impl InMemoryDevice {
    pub fn new(account_id: &str, device_id: &str, server_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            device_id: device_id.to_string(),
            server_id: server_id.to_string(),
            active: true,
            ..Self::default()
        }
    }

    pub fn with_ping_limit(mut self, total: u32, max: u32) -> Self {
        self.total_ping_count = total;
        self.max_ping_count = max;
        self
    }

    pub fn with_sim_phone_number(mut self, number: &str) -> Self {
        self.sim_phone_number = Some(number.to_string());
        self
    }
}

impl DeviceRecord for InMemoryDevice {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn server_id(&self) -> &str {
        &self.server_id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn sim_phone_number(&self) -> Option<&str> {
        self.sim_phone_number.as_deref()
    }

    fn total_ping_count(&self) -> u32 {
        self.total_ping_count
    }

    fn max_ping_count(&self) -> u32 {
        self.max_ping_count
    }

    fn increment_ping_count(&mut self, at: DateTime<Utc>) {
        self.total_ping_count = self.total_ping_count.saturating_add(1);
        self.last_ping_time = Some(at);
    }
}
