//! Server Registry
//!
//! Name-indexed set of every DCS the process knows about, populated once by
//! [`ServerRegistry::init`] and read-only afterwards. The registry also owns
//! the cross-server TCP/UDP port claim tables and the list of servers that
//! are referenced by configuration but whose adapter artifact is missing.

mod ports;

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{
    DEFAULT_INCLUDE_DIR, DEFAULT_LISTEN_BACKLOG, DEFAULT_PORT_OFFSET, PROP_ARTIFACT_SUFFIX, PROP_BIND_INTERFACE, PROP_LISTEN_BACKLOG,
    PROP_PORT_OFFSET, PROP_SERVER_NAME, PROP_WARN_PORT_CONFLICT, RuntimeConfig,
};
use crate::loader::{ConfigLoader, ListenSettings, LoadOptions};
use crate::properties::PropertyStore;
use crate::server::ServerConfig;
use crate::server::flags::ServerFlags;
use crate::utils::error::DcsError;
pub use ports::{PortConflict, PortKind, PortTables};

/// Listen socket defaults consumed by the transport layer
pub trait ListenSocketConfig {
    fn set_bind_address(&mut self, address: Option<IpAddr>);
    fn set_listen_backlog(&mut self, backlog: u32);
}

/// Plain holder for the listen defaults published at init
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenDefaults {
    pub bind_address: Option<IpAddr>,
    pub backlog: Option<u32>,
}

impl ListenSocketConfig for ListenDefaults {
    fn set_bind_address(&mut self, address: Option<IpAddr>) {
        self.bind_address = address;
    }

    fn set_listen_backlog(&mut self, backlog: u32) {
        self.backlog = Some(backlog);
    }
}

/// Registry construction options; unset fields come from the runtime config
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Server document; defaults to `dcservers.toml` next to the runtime config
    pub config_file: Option<PathBuf>,
    /// Restrict loading to one server (`*` or blank means all)
    pub specific_server: Option<String>,
    pub artifact_dir: Option<PathBuf>,
    pub artifact_suffix: Option<String>,
    pub warn_port_conflict: Option<bool>,
}

/// Blank and `*` select no specific server
fn normalize_server_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|n| !n.is_empty() && *n != "*")
        .map(str::to_string)
}

pub struct ServerRegistry {
    options: RegistryOptions,
    servers: BTreeMap<String, ServerConfig>,
    ports: PortTables,
    missing: BTreeSet<String>,
    settings: ListenSettings,
    globals: Arc<PropertyStore>,
    specific_server: Option<String>,
    artifact_dir: PathBuf,
    artifact_suffix: String,
    web_tier: bool,
    initialized: bool,
    load_errors: Vec<DcsError>,
}

impl ServerRegistry {
    pub fn new(options: RegistryOptions) -> Self {
        let specific_server = normalize_server_name(options.specific_server.as_deref());
        Self {
            artifact_dir: options.artifact_dir.clone().unwrap_or_default(),
            artifact_suffix: options.artifact_suffix.clone().unwrap_or_default(),
            options,
            servers: BTreeMap::new(),
            ports: PortTables::default(),
            missing: BTreeSet::new(),
            settings: ListenSettings::default(),
            globals: Arc::new(PropertyStore::new()),
            specific_server,
            web_tier: false,
            initialized: false,
            load_errors: Vec::new(),
        }
    }

    /// Load the server document and publish listen defaults
    ///
    /// Only the first call does anything. An uninitialized runtime
    /// configuration is logged and loading proceeds with what it holds.
    ///
    /// # Arguments
    /// * `runtime` - Process runtime configuration
    /// * `listen` - Listen socket subsystem receiving bind address and backlog
    pub fn init(&mut self, runtime: &RuntimeConfig, listen: &mut dyn ListenSocketConfig) {
        if self.initialized {
            debug!("Server registry already initialized");
            return;
        }
        if !runtime.is_initialized() {
            error!("Runtime configuration has not been initialized");
        }

        self.globals = Arc::clone(runtime.properties());
        self.web_tier = runtime.is_web_tier();
        if self.options.artifact_dir.is_none() {
            self.artifact_dir = runtime.artifact_dir();
        }
        if self.options.artifact_suffix.is_none() {
            self.artifact_suffix = runtime.get_string(PROP_ARTIFACT_SUFFIX).unwrap_or_default();
        }
        if self.specific_server.is_none() {
            self.specific_server = normalize_server_name(runtime.get(PROP_SERVER_NAME));
        }

        let load_options = LoadOptions {
            specific_server: self.specific_server.clone(),
            bind_address: runtime.get_string(PROP_BIND_INTERFACE),
            backlog: u32::try_from(runtime.get_i64(PROP_LISTEN_BACKLOG, i64::from(DEFAULT_LISTEN_BACKLOG)))
                .unwrap_or(DEFAULT_LISTEN_BACKLOG),
            port_offset: runtime.get_i64(PROP_PORT_OFFSET, DEFAULT_PORT_OFFSET),
            include_dir: None,
            warn_port_conflict: self
                .options
                .warn_port_conflict
                .unwrap_or_else(|| runtime.get_bool(PROP_WARN_PORT_CONFLICT, true)),
        };

        match self.locate_config_file(runtime) {
            Some(path) => self.load_document(runtime, &path, load_options),
            None => {
                warn!("No server configuration document found");
                self.settings = ListenSettings {
                    bind_address: load_options.bind_address,
                    backlog: load_options.backlog,
                    port_offset: load_options.port_offset,
                    include_dir: None,
                };
            }
        }

        match self.settings.bind_address.as_deref() {
            Some(addr) => match addr.trim().parse::<IpAddr>() {
                Ok(ip) => listen.set_bind_address(Some(ip)),
                Err(e) => {
                    error!("Invalid bind address '{}': {}", addr, e);
                    listen.set_bind_address(None);
                }
            },
            None => listen.set_bind_address(None),
        }
        if self.settings.backlog > 0 {
            listen.set_listen_backlog(self.settings.backlog);
        }

        self.initialized = true;
        info!(
            "Server registry initialized: {} server(s), {} port conflict(s)",
            self.servers.len(),
            self.ports.conflicts().len()
        );
    }

    /// Root document, or a per-server file when only that server is wanted
    fn locate_config_file(&self, runtime: &RuntimeConfig) -> Option<PathBuf> {
        let primary = self
            .options
            .config_file
            .clone()
            .unwrap_or_else(|| runtime.server_config_file());
        if primary.is_file() {
            return Some(primary);
        }
        let name = self.specific_server.as_deref()?;
        let dir = primary
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| runtime.config_dir());
        let file = format!("dcserver_{}.toml", name);
        [dir.join(&file), dir.join(DEFAULT_INCLUDE_DIR).join(&file)]
            .into_iter()
            .find(|p| p.is_file())
    }

    fn load_document(&mut self, runtime: &RuntimeConfig, path: &Path, options: LoadOptions) {
        let result = ConfigLoader::new(runtime, options).load(path);

        let mut globals = (*self.globals).clone();
        globals.merge(&result.global_properties);
        self.globals = Arc::new(globals);

        self.settings = result.settings;
        self.load_errors = result.errors;
        for mut dcs in result.servers {
            dcs.set_globals(Arc::clone(&self.globals));
            self.register(dcs);
        }
    }

    /// Insert a server and claim its ports; the first server under a name wins
    ///
    /// # Returns
    /// * `bool` - True if the server was added
    pub fn register(&mut self, dcs: ServerConfig) -> bool {
        if dcs.name().is_empty() {
            return false;
        }
        if self.servers.contains_key(dcs.name()) {
            warn!("DCServer already registered, ignored: {}", dcs.name());
            return false;
        }
        self.ports.claim(&dcs);
        debug!("Registered DCServer: {}", dcs);
        self.servers.insert(dcs.name().to_string(), dcs);
        true
    }

    /// Register a built-in server definition
    ///
    /// Port lists and the command port honour property overrides. When the
    /// adapter artifact is missing, the name is recorded as missing if any
    /// global property references it, and registration is refused unless the
    /// process is the web tier.
    #[allow(clippy::too_many_arguments)]
    pub fn add_dcs(
        &mut self,
        name: &str,
        description: &str,
        tcp_ports: &[u16],
        udp_ports: &[u16],
        command_port: i64,
        flags: ServerFlags,
        unique_prefixes: &[&str],
    ) -> Option<&ServerConfig> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if self.servers.contains_key(name) {
            debug!("DCServer already defined: {}", name);
            return None;
        }

        if !self.artifact_exists(name) {
            let prefix = format!("{}.", name);
            if !self.globals.keys_with_prefix(&prefix).is_empty() {
                warn!("DCServer '{}' is configured but not installed", name);
                self.missing.insert(name.to_string());
            }
            if !self.web_tier {
                return None;
            }
        }

        let mut dcs = ServerConfig::new(name, Arc::clone(&self.globals));
        dcs.set_description(description);
        dcs.set_flags(flags);
        dcs.set_bind_address(self.settings.bind_address.as_deref());
        dcs.set_tcp_ports(None, tcp_ports, true);
        dcs.set_udp_ports(None, udp_ports, true);
        dcs.set_dispatch_port(command_port, true);
        dcs.set_unique_prefixes(unique_prefixes);

        if self.register(dcs) {
            self.servers.get(name)
        } else {
            None
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn specific_server(&self) -> Option<&str> {
        self.specific_server.as_deref()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Server by name; logs an error when it is not registered
    pub fn get_server_config(&self, name: &str) -> Option<&ServerConfig> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let dcs = self.servers.get(name);
        if dcs.is_none() {
            error!("DCServer name not found: {}", name);
        }
        dcs
    }

    pub fn has_server_config(&self, name: &str) -> bool {
        self.servers.contains_key(name.trim())
    }

    /// Description of a server, or `(name)` when unknown
    pub fn server_description(&self, name: &str) -> String {
        match self.servers.get(name.trim()) {
            Some(dcs) if !dcs.description().is_empty() => dcs.description().to_string(),
            _ => format!("({})", name.trim()),
        }
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.artifact_dir
            .join(format!("{}{}", name, self.artifact_suffix))
    }

    pub fn artifact_exists(&self, name: &str) -> bool {
        self.artifact_path(name).exists()
    }

    fn is_installed(&self, dcs: &ServerConfig) -> bool {
        dcs.flags().artifact_optional || self.artifact_exists(dcs.name())
    }

    /// Registered servers sorted by name
    ///
    /// Unless `include_even_if_missing`, only servers whose artifact is
    /// installed (or optional) are returned.
    pub fn get_server_config_list(&self, include_even_if_missing: bool) -> Vec<&ServerConfig> {
        self.servers
            .values()
            .filter(|dcs| include_even_if_missing || self.is_installed(dcs))
            .collect()
    }

    pub fn tcp_port_owner(&self, port: u16) -> Option<&ServerConfig> {
        self.ports
            .owner(PortKind::Tcp, port)
            .and_then(|name| self.servers.get(name))
    }

    pub fn udp_port_owner(&self, port: u16) -> Option<&ServerConfig> {
        self.ports
            .owner(PortKind::Udp, port)
            .and_then(|name| self.servers.get(name))
    }

    pub fn port_tables(&self) -> &PortTables {
        &self.ports
    }

    pub fn missing_servers(&self) -> Vec<&str> {
        self.missing.iter().map(String::as_str).collect()
    }

    pub fn has_missing_servers(&self) -> bool {
        !self.missing.is_empty()
    }

    pub fn supports_dispatch(&self, name: &str) -> bool {
        self.servers
            .get(name.trim())
            .is_some_and(ServerConfig::supports_dispatch)
    }

    pub fn has_digital_inputs(&self, name: &str) -> bool {
        self.servers
            .get(name.trim())
            .is_some_and(ServerConfig::has_digital_inputs)
    }

    pub fn has_digital_outputs(&self, name: &str) -> bool {
        self.servers
            .get(name.trim())
            .is_some_and(ServerConfig::has_digital_outputs)
    }

    /// Apply the port offset to a nominal port
    pub fn port(&self, port: u16) -> Option<u16> {
        u16::try_from(i64::from(port) + self.settings.port_offset)
            .ok()
            .filter(|p| *p > 0)
    }

    pub fn ports(&self, ports: &[u16]) -> Vec<u16> {
        ports.iter().filter_map(|p| self.port(*p)).collect()
    }

    pub fn listen_settings(&self) -> &ListenSettings {
        &self.settings
    }

    pub fn global_properties(&self) -> &Arc<PropertyStore> {
        &self.globals
    }

    /// Errors recorded while loading the server document
    pub fn load_errors(&self) -> &[DcsError] {
        &self.load_errors
    }
}

/// Tests module for registry components
#[cfg(test)]
mod registry_tests;
