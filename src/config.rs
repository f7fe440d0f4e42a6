//! Configuration Module
//!
//! Default paths, runtime property names, and the process-wide runtime
//! configuration that seeds every server's global property store.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::properties::PropertyStore;
use crate::utils::error::Result;

/// Constants for default settings
pub const DEFAULT_CONFIG_DIR: &str = "/etc/dcs";
pub const DEFAULT_RUNTIME_CONFIG: &str = "dcs.toml";
pub const DEFAULT_SERVER_CONFIG: &str = "dcservers.toml";
pub const DEFAULT_INCLUDE_DIR: &str = "dcservers";
pub const DEFAULT_DISPATCH_HOST: &str = "localhost";
pub const DEFAULT_LISTEN_BACKLOG: u32 = 0;
pub const DEFAULT_PORT_OFFSET: i64 = 0;
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SMS_GATEWAY: &str = "body";
pub const DEFAULT_PENDING_PER_DEVICE: usize = 32;
pub const DEFAULT_ARTIFACT_SUBDIR: &str = "lib";
pub const DEFAULT_SMS_SPOOL_SUBDIR: &str = "spool";
pub const DEFAULT_SMS_OUTBOX_FILE: &str = "sms_outbox.jsonl";

/// Maximum accepted dispatch line length (64 KiB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Environment variable pointing at the installation root
pub const ENV_DCS_HOME: &str = "DCS_HOME";

/// Runtime property names
pub const PROP_SERVER_NAME: &str = "DCServer.name";
pub const PROP_BIND_INTERFACE: &str = "DCServer.bindInterface";
pub const PROP_LISTEN_BACKLOG: &str = "DCServer.listenBacklog";
pub const PROP_PORT_OFFSET: &str = "DCServer.portOffset";
pub const PROP_DISPATCH_TIMEOUT_MS: &str = "DCServer.dispatchTimeoutMS";
pub const PROP_WARN_PORT_CONFLICT: &str = "DCServer.warnPortConflict";
pub const PROP_ARTIFACT_DIR: &str = "DCServer.artifactDir";
pub const PROP_ARTIFACT_SUFFIX: &str = "DCServer.artifactSuffix";
pub const PROP_SMS_GATEWAY: &str = "DCServer.smsGateway";
pub const PROP_PENDING_PER_DEVICE: &str = "DCServer.pendingPerDevice";
pub const PROP_SMS_OUTBOX_FILE: &str = "DCServer.smsOutboxFile";
pub const PROP_CONFIG_FILE: &str = "DCServer.configFile";
/// Document bind address override, takes precedence over `bindAddress` in the document
pub const PROP_BIND_ADDRESS: &str = "bindAddress";

/// Description override for a server: `DCServer.<name>.description`
pub fn description_key(server: &str) -> String {
    format!("DCServer.{}.description", server)
}

/// Process runtime configuration
///
/// Holds the global property store shared (read-only) by every
/// `ServerConfig`, plus where it was loaded from.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    properties: Arc<PropertyStore>,
    source: Option<PathBuf>,
    initialized: bool,
    web_tier: bool,
}

impl RuntimeConfig {
    /// Uninitialized configuration with no properties
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialized configuration from an in-memory store
    pub fn from_properties(properties: PropertyStore) -> Self {
        Self {
            properties: Arc::new(properties),
            source: None,
            initialized: true,
            web_tier: false,
        }
    }

    /// Load a runtime configuration file (TOML, flattened to dotted keys)
    ///
    /// # Arguments
    /// * `path` - Path of the runtime configuration file
    ///
    /// # Returns
    /// * `Result<RuntimeConfig>` - The loaded configuration or an I/O / parse error
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let properties = PropertyStore::from_toml_str(&text)?;
        info!(
            "Loaded runtime config {} ({} properties)",
            path.display(),
            properties.len()
        );
        Ok(Self {
            properties: Arc::new(properties),
            source: Some(path.to_path_buf()),
            initialized: true,
            web_tier: false,
        })
    }

    pub fn with_web_tier(mut self, web_tier: bool) -> Self {
        self.web_tier = web_tier;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// True when running inside the web tier, which lists servers it does not host
    pub fn is_web_tier(&self) -> bool {
        self.web_tier
    }

    pub fn properties(&self) -> &Arc<PropertyStore> {
        &self.properties
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Directory holding the runtime config, used to locate the server document
    pub fn config_dir(&self) -> PathBuf {
        self.source
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key)
    }

    /// Non-blank string property
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.properties.get_i64(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.properties.get_bool(key).unwrap_or(default)
    }

    /// Dispatch connect/read/write timeout
    pub fn dispatch_timeout(&self) -> Duration {
        match self.properties.get_i64(PROP_DISPATCH_TIMEOUT_MS) {
            Some(ms) if ms > 0 => Duration::from_millis(ms.unsigned_abs()),
            _ => DEFAULT_DISPATCH_TIMEOUT,
        }
    }

    /// Commands kept per device by the command listener
    pub fn pending_per_device(&self) -> usize {
        match self.properties.get_i64(PROP_PENDING_PER_DEVICE) {
            Some(n) if n > 0 => usize::try_from(n).unwrap_or(DEFAULT_PENDING_PER_DEVICE),
            _ => DEFAULT_PENDING_PER_DEVICE,
        }
    }

    /// Spool file for outbound SMS: `DCServer.smsOutboxFile`, else `<home>/spool/sms_outbox.jsonl`
    pub fn sms_outbox_file(&self) -> PathBuf {
        self.get_string(PROP_SMS_OUTBOX_FILE)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.home_dir().join(DEFAULT_SMS_SPOOL_SUBDIR).join(DEFAULT_SMS_OUTBOX_FILE))
    }

    /// Installation root: `DCS_HOME`, else the parent of the config directory
    pub fn home_dir(&self) -> PathBuf {
        env::var_os(ENV_DCS_HOME)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let dir = self.config_dir();
                dir.parent().map(Path::to_path_buf).unwrap_or(dir)
            })
    }

    /// Directory holding adapter artifacts
    pub fn artifact_dir(&self) -> PathBuf {
        self.get_string(PROP_ARTIFACT_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.home_dir().join(DEFAULT_ARTIFACT_SUBDIR))
    }

    /// Server document path: `DCServer.configFile`, else `dcservers.toml` next to the runtime config
    pub fn server_config_file(&self) -> PathBuf {
        match self.get_string(PROP_CONFIG_FILE) {
            Some(file) => {
                let path = PathBuf::from(file);
                if path.is_absolute() {
                    path
                } else {
                    self.config_dir().join(path)
                }
            }
            None => self.config_dir().join(DEFAULT_SERVER_CONFIG),
        }
    }
}
