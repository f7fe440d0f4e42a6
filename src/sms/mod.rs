//! Outbound SMS gateways
//!
//! Commands whose transport is SMS are handed, already rendered, to a named
//! gateway. Gateways are registered once at startup; names are
//! case-insensitive.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_SMS_GATEWAY;
use crate::device::DeviceRecord;
use crate::dispatch::ResultCode;

pub trait SmsGateway: Send + Sync {
    /// Deliver `text` to `device`
    fn send_sms_command(&self, device: &dyn DeviceRecord, text: &str) -> ResultCode;
}

impl<G: SmsGateway + ?Sized> SmsGateway for Arc<G> {
    fn send_sms_command(&self, device: &dyn DeviceRecord, text: &str) -> ResultCode {
        (**self).send_sms_command(device, text)
    }
}

/// A message accepted by an outbound gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsMessage {
    pub phone_number: String,
    pub account_id: String,
    pub device_id: String,
    pub text: String,
    pub queued_at: DateTime<Utc>,
}

impl SmsMessage {
    /// Message for `device`; fails with `InvalidSms` when it has no SIM number
    pub fn for_device(device: &dyn DeviceRecord, text: &str) -> Result<Self, ResultCode> {
        match device.sim_phone_number().map(str::trim) {
            Some(number) if !number.is_empty() => Ok(Self {
                phone_number: number.to_string(),
                account_id: device.account_id().to_string(),
                device_id: device.device_id().to_string(),
                text: text.to_string(),
                queued_at: Utc::now(),
            }),
            _ => {
                warn!(
                    "[{}/{}] No SIM phone number for SMS",
                    device.account_id(),
                    device.device_id()
                );
                Err(ResultCode::InvalidSms)
            }
        }
    }
}

/// Gateway that keeps every accepted message in memory
///
/// Used where no carrier integration is configured; messages can be drained
/// by whatever forwards them.
#[derive(Debug, Default)]
pub struct OutboxGateway {
    outbox: Mutex<Vec<SmsMessage>>,
}

impl OutboxGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the queued messages
    pub fn drain(&self) -> Vec<SmsMessage> {
        match self.outbox.lock() {
            Ok(mut outbox) => outbox.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.outbox.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SmsGateway for OutboxGateway {
    fn send_sms_command(&self, device: &dyn DeviceRecord, text: &str) -> ResultCode {
        let message = match SmsMessage::for_device(device, text) {
            Ok(message) => message,
            Err(code) => return code,
        };
        match self.outbox.lock() {
            Ok(mut outbox) => {
                info!("Queued SMS to {}: {}", message.phone_number, message.text);
                outbox.push(message);
                ResultCode::Success
            }
            Err(_) => {
                error!("SMS outbox lock poisoned");
                ResultCode::InternalError
            }
        }
    }
}

/// Gateway that appends each message as one JSON line to a spool file
///
/// The file outlives the process; a carrier relay picks messages up from it.
#[derive(Debug, Clone)]
pub struct SpoolGateway {
    path: PathBuf,
}

impl SpoolGateway {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, message: &SmsMessage) -> crate::utils::error::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let line = serde_json::to_string(message)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

impl SmsGateway for SpoolGateway {
    fn send_sms_command(&self, device: &dyn DeviceRecord, text: &str) -> ResultCode {
        let message = match SmsMessage::for_device(device, text) {
            Ok(message) => message,
            Err(code) => return code,
        };
        match self.append(&message) {
            Ok(()) => {
                info!(
                    "Spooled SMS to {} in {}: {}",
                    message.phone_number,
                    self.path.display(),
                    message.text
                );
                ResultCode::Success
            }
            Err(e) => {
                error!("Unable to spool SMS to {}: {}", self.path.display(), e);
                ResultCode::TransmitFail
            }
        }
    }
}

/// Named set of SMS gateways
#[derive(Default)]
pub struct SmsGatewayRegistry {
    gateways: HashMap<String, Box<dyn SmsGateway>>,
}

impl SmsGatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with an [`OutboxGateway`] under the default name
    pub fn with_default_outbox() -> Self {
        let mut registry = Self::new();
        registry.add(DEFAULT_SMS_GATEWAY, Box::new(OutboxGateway::new()));
        registry
    }

    /// Registry with a [`SpoolGateway`] under the default name
    pub fn with_spool(path: &Path) -> Self {
        let mut registry = Self::new();
        registry.add(DEFAULT_SMS_GATEWAY, Box::new(SpoolGateway::new(path)));
        registry
    }

    /// Add a gateway; blank and already used names are rejected
    ///
    /// # Returns
    /// * `bool` - True if the gateway was added
    pub fn add(&mut self, name: &str, gateway: Box<dyn SmsGateway>) -> bool {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            warn!("SMS gateway name is blank");
            return false;
        }
        if self.gateways.contains_key(&key) {
            warn!("SMS gateway already registered: {}", name);
            return false;
        }
        debug!("Added SMS gateway: {}", key);
        self.gateways.insert(key, gateway);
        true
    }

    pub fn get(&self, name: &str) -> Option<&dyn SmsGateway> {
        self.gateways
            .get(&name.trim().to_lowercase())
            .map(|g| g.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.gateways.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Send through the named gateway, `body` when the name is blank
    pub fn send(&self, handler: Option<&str>, device: &dyn DeviceRecord, text: &str) -> ResultCode {
        let name = handler
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(DEFAULT_SMS_GATEWAY);
        match self.get(name) {
            Some(gateway) => gateway.send_sms_command(device, text),
            None => {
                error!("SMS gateway handler not found: {}", name);
                ResultCode::InvalidProto
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::InMemoryDevice;

    /// Test that gateway names are case-insensitive and blanks are refused
    #[test]
    fn test_names_are_case_insensitive() {
        let mut registry = SmsGatewayRegistry::new();
        assert!(registry.add("Body", Box::new(OutboxGateway::new())));
        assert!(!registry.add("BODY", Box::new(OutboxGateway::new())));
        assert!(!registry.add("  ", Box::new(OutboxGateway::new())));
        assert!(registry.contains("body"));
        assert_eq!(registry.names(), vec!["body"]);
    }

    /// Test that a blank handler routes to `body` and an unknown one is rejected
    #[test]
    fn test_send_uses_default_handler() {
        let outbox = Arc::new(OutboxGateway::new());
        let mut registry = SmsGatewayRegistry::new();
        registry.add("body", Box::new(Arc::clone(&outbox)));

        let dev = InMemoryDevice::new("acme", "t1", "gtsdmtp").with_sim_phone_number("5551212");
        assert_eq!(registry.send(None, &dev, "POS?"), ResultCode::Success);
        assert_eq!(registry.send(Some("sms2"), &dev, "POS?"), ResultCode::InvalidProto);

        let sent = outbox.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].phone_number, "5551212");
        assert_eq!(sent[0].text, "POS?");
        assert!(outbox.is_empty());
    }

    /// Test that a device without a SIM number cannot be sent an SMS
    #[test]
    fn test_missing_phone_number() {
        let registry = SmsGatewayRegistry::with_default_outbox();
        let dev = InMemoryDevice::new("acme", "t1", "gtsdmtp");
        assert_eq!(registry.send(Some(""), &dev, "POS?"), ResultCode::InvalidSms);
    }

    /// Test that spooled messages are appended as JSON lines and survive the gateway
    #[test]
    fn test_spool_gateway_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spool").join("sms.jsonl");
        let registry = SmsGatewayRegistry::with_spool(&path);

        let dev = InMemoryDevice::new("acme", "t1", "gtsdmtp").with_sim_phone_number(" 5551212 ");
        assert_eq!(registry.send(None, &dev, "POS?"), ResultCode::Success);
        assert_eq!(registry.send(Some("BODY"), &dev, "OUT 1"), ResultCode::Success);
        drop(registry);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["phoneNumber"], "5551212");
        assert_eq!(lines[0]["accountId"], "acme");
        assert_eq!(lines[0]["deviceId"], "t1");
        assert_eq!(lines[1]["text"], "OUT 1");
        assert!(lines[1]["queuedAt"].is_string());
    }

    /// Test that nothing is spooled for a device without a SIM number
    #[test]
    fn test_spool_gateway_requires_phone_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sms.jsonl");
        let gateway = SpoolGateway::new(&path);
        let dev = InMemoryDevice::new("acme", "t1", "gtsdmtp");
        assert_eq!(gateway.send_sms_command(&dev, "POS?"), ResultCode::InvalidSms);
        assert!(!path.exists());
    }

    /// Test that an unwritable spool location reports a transmit failure
    #[test]
    fn test_spool_gateway_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened for append
        let gateway = SpoolGateway::new(dir.path());
        let dev = InMemoryDevice::new("acme", "t1", "gtsdmtp").with_sim_phone_number("5551212");
        assert_eq!(gateway.send_sms_command(&dev, "POS?"), ResultCode::TransmitFail);
    }
}
