//! Device Communication Server configuration
//!
//! A `ServerConfig` describes one protocol-adapter process: its listen ports,
//! capability flags, property overrides, event-code translation table and
//! remote command catalog. Instances are built once while the configuration
//! document is loaded and are read-only afterwards.

pub mod acl;
pub mod command;
pub mod event_code;
pub mod flags;
pub mod ports;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{DEFAULT_DISPATCH_HOST, PROP_BIND_INTERFACE};
use crate::properties::{PropertyResolver, PropertyStore};
use acl::{AccessControl, AccessLevel, child_acl_name};
use command::{Command, CommandTransport};
use event_code::EventCodeMap;
use flags::ServerFlags;
use ports::{PortBinding, filter_ports};

/// Local key prefix under which capability attributes are mirrored
pub const ATTRIBUTE_PREFIX: &str = "Attribute.";
pub const PROP_ATTRIBUTE_INPUT_OFFSET: &str = "Attribute.inputOffset";

// Per-server property names, always qualified as `<name>.<key>`
pub const CFG_TCP_PORT: &str = "tcpPort";
pub const CFG_UDP_PORT: &str = "udpPort";
pub const CFG_PORT: &str = "port";
pub const CFG_COMMAND_PORT: &str = "commandPort";
pub const CFG_COMMAND_PROTOCOL: &str = "commandProtocol";
pub const CFG_CLIENT_COMMAND_PORT: &str = "clientCommandPort";
pub const CFG_CLIENT_COMMAND_PORT_UDP: &str = "clientCommandPort.udp";
pub const CFG_CLIENT_COMMAND_PORT_TCP: &str = "clientCommandPort.tcp";
pub const CFG_ACK_RESPONSE_PORT: &str = "ackResponsePort";
pub const CFG_TCP_IDLE_TIMEOUT_MS: &str = "tcpIdleTimeoutMS";
pub const CFG_TCP_PACKET_TIMEOUT_MS: &str = "tcpPacketTimeoutMS";
pub const CFG_TCP_SESSION_TIMEOUT_MS: &str = "tcpSessionTimeoutMS";
pub const CFG_UDP_IDLE_TIMEOUT_MS: &str = "udpIdleTimeoutMS";
pub const CFG_UDP_PACKET_TIMEOUT_MS: &str = "udpPacketTimeoutMS";
pub const CFG_UDP_SESSION_TIMEOUT_MS: &str = "udpSessionTimeoutMS";
pub const CFG_UNIQUE_PREFIX: &str = "uniquePrefix";
pub const CFG_UNIQUE_ID_PREFIX: &str = "uniqueIdPrefix";
pub const CFG_MINIMUM_SPEED_KPH: &str = "minimumSpeedKPH";
pub const CFG_MINIMUM_MOVED_METERS: &str = "minimumMovedMeters";
pub const CFG_ESTIMATE_ODOMETER: &str = "estimateOdometer";
pub const CFG_SIMULATE_GEOZONES: &str = "simulateGeozones";
pub const CFG_SIMULATE_DIGITAL_INPUTS: &str = "simulateDigitalInputs";
pub const CFG_SAVE_RAW_DATA_PACKETS: &str = "saveRawDataPackets";
pub const CFG_START_STOP_SUPPORTED: &str = "startStopSupported";
pub const CFG_STATUS_LOCATION_IN_MOTION: &str = "statusLocationInMotion";
pub const CFG_USE_LAST_VALID_GPS: &str = "useLastValidGPSLocation";
pub const CFG_INITIAL_PACKET: &str = "initialPacket";
pub const CFG_FINAL_PACKET: &str = "finalPacket";

/// Digital input mask meaning "all inputs"
pub const ALL_DIGITAL_INPUTS: i64 = 0xFFFF_FFFF;

/// Normalize a unique-id prefix list
///
/// Entries are trimmed, `*` and `<blank>` become the empty prefix, a
/// trailing `*` is dropped, and an empty list becomes `[""]`.
pub fn normalize_unique_prefixes<S: AsRef<str>>(prefixes: &[S]) -> Vec<String> {
    let list: Vec<String> = prefixes
        .iter()
        .map(|p| {
            let p = p.as_ref().trim();
            if p == "*" || p.eq_ignore_ascii_case("<blank>") {
                String::new()
            } else {
                p.strip_suffix('*').unwrap_or(p).to_string()
            }
        })
        .collect();
    if list.is_empty() {
        vec![String::new()]
    } else {
        list
    }
}

/// Decode a packet property: `0x` hex, otherwise the literal text bytes
pub fn parse_packet_bytes(value: &str) -> Option<Vec<u8>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) if hex.len() % 2 == 0 && hex.is_ascii() => (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
            .collect(),
        Some(_) => None,
        None => Some(value.as_bytes().to_vec()),
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    name: String,
    description: String,
    flags: ServerFlags,
    unique_prefixes: Vec<String>,
    tcp_ports: Vec<PortBinding>,
    udp_ports: Vec<PortBinding>,
    bind_address: Option<String>,
    dispatch_host: Option<String>,
    dispatch_port: Option<u16>,
    command_transport: CommandTransport,
    event_codes: EventCodeMap,
    properties: PropertyStore,
    commands: Vec<Command>,
    commands_acl_name: String,
    commands_acl_default: AccessLevel,
    warn_port_conflict: bool,
    source: Option<PathBuf>,
    globals: Arc<PropertyStore>,
}

impl ServerConfig {
    pub fn new(name: &str, globals: Arc<PropertyStore>) -> Self {
        Self {
            name: name.trim().to_string(),
            description: String::new(),
            flags: ServerFlags::default(),
            unique_prefixes: vec![String::new()],
            tcp_ports: Vec::new(),
            udp_ports: Vec::new(),
            bind_address: None,
            dispatch_host: None,
            dispatch_port: None,
            command_transport: CommandTransport::Udp,
            event_codes: EventCodeMap::new(true),
            properties: PropertyStore::new(),
            commands: Vec::new(),
            commands_acl_name: String::new(),
            commands_acl_default: AccessLevel::Write,
            warn_port_conflict: true,
            source: None,
            globals,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = description.trim().to_string();
    }

    pub fn flags(&self) -> &ServerFlags {
        &self.flags
    }

    pub fn set_flags(&mut self, flags: ServerFlags) {
        self.flags = flags;
    }

    /// Apply a capability attribute and mirror it as `Attribute.<key>`
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        if let Some(on) = crate::properties::parse_bool(value) {
            self.flags.set_attribute(key, on);
        }
        self.properties
            .set(format!("{}{}", ATTRIBUTE_PREFIX, key), value.trim());
    }

    pub fn has_digital_inputs(&self) -> bool {
        self.flags.has_inputs
    }

    pub fn has_digital_outputs(&self) -> bool {
        self.flags.has_outputs
    }

    /// File the configuration was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn set_source(&mut self, path: &Path) {
        self.source = Some(path.to_path_buf());
    }

    pub fn warn_port_conflict(&self) -> bool {
        self.warn_port_conflict
    }

    pub fn set_warn_port_conflict(&mut self, warn: bool) {
        self.warn_port_conflict = warn;
    }

    // ------------------------------------------------------------------
    // Properties

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    pub fn set_property(&mut self, key: &str, value: &str) {
        self.properties.set(key, value);
    }

    pub fn globals(&self) -> &Arc<PropertyStore> {
        &self.globals
    }

    /// Swap the global store handle (used once the load phase has published globals)
    pub fn set_globals(&mut self, globals: Arc<PropertyStore>) {
        self.globals = globals;
    }

    pub fn resolver(&self) -> PropertyResolver<'_> {
        PropertyResolver::new(&self.name, &self.properties, &self.globals)
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}.{}", self.name, suffix)
    }

    fn lookup(&self, suffixes: &[&str]) -> Option<&str> {
        let keys: Vec<String> = suffixes.iter().map(|s| self.key(s)).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.resolver().lookup_any(&keys)
    }

    fn lookup_i64(&self, suffixes: &[&str], default: i64) -> i64 {
        self.lookup(suffixes)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn lookup_f64(&self, suffixes: &[&str], default: f64) -> f64 {
        self.lookup(suffixes)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn lookup_bool(&self, suffixes: &[&str], default: bool) -> bool {
        self.lookup(suffixes)
            .and_then(crate::properties::parse_bool)
            .unwrap_or(default)
    }

    // ------------------------------------------------------------------
    // Listen ports

    /// Ports configured under the given keys, `None` when no key is present
    ///
    /// A present but empty value yields an empty list.
    fn override_ports(&self, suffixes: &[&str]) -> Option<Vec<u16>> {
        let value = self.lookup(suffixes)?;
        let entries: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        Some(filter_ports(&entries))
    }

    fn build_bindings(&self, kind: &str, bind: Option<&str>, ports: &[u16]) -> Vec<PortBinding> {
        let mut bindings: Vec<PortBinding> = Vec::with_capacity(ports.len());
        for port in ports {
            if bindings.iter().any(|b| b.port == *port) {
                warn!("[{}] Duplicate {} port {}", self.name, kind, port);
            }
            bindings.push(PortBinding::new(*port, bind));
        }
        bindings
    }

    /// Replace the TCP port list
    ///
    /// With `check_override`, `<name>.tcpPort` or `<name>.port` takes
    /// precedence when present; an empty value clears every port.
    pub fn set_tcp_ports(&mut self, bind: Option<&str>, ports: &[u16], check_override: bool) {
        let ports = if check_override {
            self.override_ports(&[CFG_TCP_PORT, CFG_PORT])
                .unwrap_or_else(|| ports.to_vec())
        } else {
            ports.to_vec()
        };
        self.tcp_ports = self.build_bindings("TCP", bind, &ports);
    }

    /// Replace the UDP port list, see [`ServerConfig::set_tcp_ports`]
    pub fn set_udp_ports(&mut self, bind: Option<&str>, ports: &[u16], check_override: bool) {
        let ports = if check_override {
            self.override_ports(&[CFG_UDP_PORT, CFG_PORT])
                .unwrap_or_else(|| ports.to_vec())
        } else {
            ports.to_vec()
        };
        self.udp_ports = self.build_bindings("UDP", bind, &ports);
    }

    pub fn tcp_ports(&self) -> Vec<u16> {
        self.tcp_ports.iter().map(|b| b.port).collect()
    }

    pub fn udp_ports(&self) -> Vec<u16> {
        self.udp_ports.iter().map(|b| b.port).collect()
    }

    pub fn tcp_bindings(&self) -> &[PortBinding] {
        &self.tcp_ports
    }

    pub fn udp_bindings(&self) -> &[PortBinding] {
        &self.udp_ports
    }

    /// Bind address of a TCP port (`None` = wildcard or unknown port)
    pub fn tcp_bind_address(&self, port: u16) -> Option<&str> {
        self.tcp_ports
            .iter()
            .find(|b| b.port == port)
            .and_then(|b| b.bind_address.as_deref())
    }

    pub fn udp_bind_address(&self, port: u16) -> Option<&str> {
        self.udp_ports
            .iter()
            .find(|b| b.port == port)
            .and_then(|b| b.bind_address.as_deref())
    }

    /// TCP ports followed by the UDP ports not already listed
    pub fn listen_ports(&self) -> Vec<u16> {
        let mut list = self.tcp_ports();
        for port in self.udp_ports() {
            if !list.contains(&port) {
                list.push(port);
            }
        }
        list
    }

    /// `TCP=a,b UDP=c CMD=d`, or `no-ports`
    pub fn ports_summary(&self) -> String {
        let join = |ports: Vec<u16>| {
            ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        let mut parts = Vec::new();
        if !self.tcp_ports.is_empty() {
            parts.push(format!("TCP={}", join(self.tcp_ports())));
        }
        if !self.udp_ports.is_empty() {
            parts.push(format!("UDP={}", join(self.udp_ports())));
        }
        if let Some(port) = self.dispatch_port {
            parts.push(format!("CMD={}", port));
        }
        if parts.is_empty() {
            "no-ports".to_string()
        } else {
            parts.join(" ")
        }
    }

    // ------------------------------------------------------------------
    // Command dispatch endpoint

    /// Process-wide default bind address, used as the fallback dispatch host
    pub fn set_bind_address(&mut self, bind: Option<&str>) {
        self.bind_address = bind
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);
    }

    pub fn set_dispatch_host(&mut self, host: Option<&str>) {
        self.dispatch_host = host
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string);
    }

    /// Explicit host, else the process bind address, else the bind interface property, else `localhost`
    pub fn dispatch_host(&self) -> String {
        if let Some(host) = &self.dispatch_host {
            return host.clone();
        }
        if let Some(bind) = &self.bind_address {
            return bind.clone();
        }
        self.resolver()
            .lookup(PROP_BIND_INTERFACE)
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_DISPATCH_HOST)
            .to_string()
    }

    /// Set the command dispatch port; non-positive or out of range disables dispatch
    ///
    /// With `check_override`, `<name>.commandPort` takes precedence when present.
    pub fn set_dispatch_port(&mut self, port: i64, check_override: bool) {
        let port = if check_override {
            self.lookup_i64(&[CFG_COMMAND_PORT], port)
        } else {
            port
        };
        self.dispatch_port = u16::try_from(port).ok().filter(|p| *p > 0);
    }

    pub fn dispatch_port(&self) -> Option<u16> {
        self.dispatch_port
    }

    pub fn supports_dispatch(&self) -> bool {
        self.dispatch_port.is_some()
    }

    pub fn set_command_transport(&mut self, transport: CommandTransport) {
        self.command_transport = transport;
    }

    /// Transport the server uses to reach devices, `<name>.commandProtocol` first
    pub fn command_transport(&self) -> CommandTransport {
        self.lookup(&[CFG_COMMAND_PROTOCOL])
            .and_then(|v| v.parse().ok())
            .unwrap_or(self.command_transport)
    }

    // ------------------------------------------------------------------
    // Unique-id prefixes

    pub fn set_unique_prefixes<S: AsRef<str>>(&mut self, prefixes: &[S]) {
        self.unique_prefixes = normalize_unique_prefixes(prefixes);
    }

    /// Prefixes from `<name>.uniquePrefix` when present, else the configured list
    pub fn unique_prefixes(&self) -> Vec<String> {
        match self.lookup(&[CFG_UNIQUE_PREFIX, CFG_UNIQUE_ID_PREFIX]) {
            Some(value) => {
                let entries: Vec<&str> = value.split(',').collect();
                normalize_unique_prefixes(&entries)
            }
            None => self.unique_prefixes.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Event codes

    pub fn event_codes(&self) -> &EventCodeMap {
        &self.event_codes
    }

    pub fn event_codes_mut(&mut self) -> &mut EventCodeMap {
        &mut self.event_codes
    }

    /// Platform status code for a device-native code
    pub fn translate_status_code(&self, native: i64, default: i32) -> i32 {
        self.event_codes.translate(native, default)
    }

    // ------------------------------------------------------------------
    // Command catalog

    pub fn set_commands_acl(&mut self, name: &str, default: AccessLevel) {
        self.commands_acl_name = name.trim().to_string();
        self.commands_acl_default = default;
    }

    pub fn commands_acl_name(&self) -> &str {
        &self.commands_acl_name
    }

    pub fn commands_acl_default(&self) -> AccessLevel {
        self.commands_acl_default
    }

    /// ACL gating a command: its own name, else `<commandsAcl>.<command>`
    pub fn command_acl_name(&self, command: &Command) -> String {
        if command.acl_name.trim().is_empty() {
            child_acl_name(&self.commands_acl_name, &command.name)
        } else {
            command.acl_name.clone()
        }
    }

    /// Add a command; blank and duplicate names are skipped
    ///
    /// # Returns
    /// * `bool` - True if the command was added
    pub fn add_command(&mut self, command: Command) -> bool {
        if command.name.is_empty() {
            warn!("[{}] Ignoring command with blank name", self.name);
            return false;
        }
        if self.command(&command.name).is_some() {
            warn!(
                "[{}] Command already defined, ignoring: {}",
                self.name, command.name
            );
            return false;
        }
        debug!("[{}] Adding command: {}", self.name, command.name);
        self.commands.push(command);
        true
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        let name = name.trim();
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn command_names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn command_description(&self, name: &str, default: &str) -> String {
        self.command(name)
            .map(|c| c.description.as_str())
            .filter(|d| !d.is_empty())
            .unwrap_or(default)
            .to_string()
    }

    pub fn command_template(&self, name: &str) -> Option<&str> {
        self.command(name).map(|c| c.template.as_str())
    }

    pub fn command_status_code(&self, name: &str, default: i32) -> i32 {
        self.command(name).map_or(default, |c| c.status_code)
    }

    /// Expanded command text, `None` for an unknown command
    pub fn command_string(&self, name: &str, args: &[&str]) -> Option<String> {
        self.command(name).map(|c| c.render(args))
    }

    /// True iff `user` has write access to both the server-wide command ACL
    /// and the command's own ACL
    ///
    /// The access control decides for every user, blank included.
    pub fn user_has_access_to_command(
        &self,
        acl: &dyn AccessControl,
        user: &str,
        command_name: &str,
    ) -> bool {
        let Some(command) = self.command(command_name) else {
            return false;
        };
        acl.has_write_access(user, &self.commands_acl_name, self.commands_acl_default)
            && acl.has_write_access(user, &self.command_acl_name(command), command.acl_default)
    }

    /// Commands `user` may send for a usage tag, in catalog order
    ///
    /// Commands with neither description nor template are omitted.
    pub fn commands_for(&self, acl: &dyn AccessControl, user: &str, usage: &str) -> Vec<&Command> {
        self.commands
            .iter()
            .filter(|c| c.matches_type(usage))
            .filter(|c| self.user_has_access_to_command(acl, user, &c.name))
            .filter(|c| !(c.description.trim().is_empty() && c.template.trim().is_empty()))
            .collect()
    }

    /// Command name to description for [`ServerConfig::commands_for`]
    pub fn command_description_map(
        &self,
        acl: &dyn AccessControl,
        user: &str,
        usage: &str,
    ) -> BTreeMap<String, String> {
        self.commands_for(acl, user, usage)
            .into_iter()
            .map(|c| {
                let desc = if c.description.is_empty() {
                    c.name.clone()
                } else {
                    c.description.clone()
                };
                (c.name.clone(), desc)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Tuning properties

    pub fn client_command_port_udp(&self, default: i64) -> i64 {
        self.lookup_i64(&[CFG_CLIENT_COMMAND_PORT_UDP, CFG_CLIENT_COMMAND_PORT], default)
    }

    pub fn client_command_port_tcp(&self, default: i64) -> i64 {
        self.lookup_i64(&[CFG_CLIENT_COMMAND_PORT_TCP, CFG_CLIENT_COMMAND_PORT], default)
    }

    pub fn ack_response_port(&self, default: i64) -> i64 {
        self.lookup_i64(&[CFG_ACK_RESPONSE_PORT], default)
    }

    pub fn tcp_idle_timeout_ms(&self, default: i64) -> i64 {
        self.lookup_i64(&[CFG_TCP_IDLE_TIMEOUT_MS], default)
    }

    pub fn tcp_packet_timeout_ms(&self, default: i64) -> i64 {
        self.lookup_i64(&[CFG_TCP_PACKET_TIMEOUT_MS], default)
    }

    pub fn tcp_session_timeout_ms(&self, default: i64) -> i64 {
        self.lookup_i64(&[CFG_TCP_SESSION_TIMEOUT_MS], default)
    }

    pub fn udp_idle_timeout_ms(&self, default: i64) -> i64 {
        self.lookup_i64(&[CFG_UDP_IDLE_TIMEOUT_MS], default)
    }

    pub fn udp_packet_timeout_ms(&self, default: i64) -> i64 {
        self.lookup_i64(&[CFG_UDP_PACKET_TIMEOUT_MS], default)
    }

    pub fn udp_session_timeout_ms(&self, default: i64) -> i64 {
        self.lookup_i64(&[CFG_UDP_SESSION_TIMEOUT_MS], default)
    }

    pub fn minimum_speed_kph(&self, default: f64) -> f64 {
        self.lookup_f64(&[CFG_MINIMUM_SPEED_KPH], default)
    }

    pub fn minimum_moved_meters(&self, default: f64) -> f64 {
        self.lookup_f64(&[CFG_MINIMUM_MOVED_METERS], default)
    }

    pub fn estimate_odometer(&self, default: bool) -> bool {
        self.lookup_bool(&[CFG_ESTIMATE_ODOMETER], default)
    }

    pub fn simulate_geozones(&self, default: bool) -> bool {
        self.lookup_bool(&[CFG_SIMULATE_GEOZONES], default)
    }

    pub fn save_raw_data_packets(&self, default: bool) -> bool {
        self.lookup_bool(&[CFG_SAVE_RAW_DATA_PACKETS], default)
    }

    pub fn start_stop_supported(&self, default: bool) -> bool {
        self.lookup_bool(&[CFG_START_STOP_SUPPORTED], default)
    }

    pub fn status_location_in_motion(&self, default: bool) -> bool {
        self.lookup_bool(&[CFG_STATUS_LOCATION_IN_MOTION], default)
    }

    pub fn use_last_valid_gps_location(&self, default: bool) -> bool {
        self.lookup_bool(&[CFG_USE_LAST_VALID_GPS], default)
    }

    /// Digital input mask for which input change events are simulated
    ///
    /// `default` (or no value) yields `default`, `true` every input, `false`
    /// none; anything else is read as a decimal or `0x` hex mask.
    pub fn simulate_digital_inputs(&self, default: i64) -> i64 {
        let Some(value) = self.lookup(&[CFG_SIMULATE_DIGITAL_INPUTS]) else {
            return default;
        };
        let value = value.trim();
        match value.to_ascii_lowercase().as_str() {
            "" | "default" => default,
            "true" => ALL_DIGITAL_INPUTS,
            "false" => 0,
            _ => match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
                Some(hex) => i64::from_str_radix(hex, 16).unwrap_or(default),
                None => value.parse().unwrap_or(default),
            },
        }
    }

    pub fn is_simulated_digital_input(&self, index: u32) -> bool {
        index < 32 && self.simulate_digital_inputs(0) & (1 << index) != 0
    }

    /// Offset added to device input indexes, if configured
    pub fn input_offset(&self) -> Option<i64> {
        self.properties
            .get_i64(PROP_ATTRIBUTE_INPUT_OFFSET)
            .filter(|o| *o >= 0)
    }

    pub fn initial_packet(&self) -> Option<Vec<u8>> {
        self.lookup(&[CFG_INITIAL_PACKET]).and_then(parse_packet_bytes)
    }

    pub fn final_packet(&self) -> Option<Vec<u8>> {
        self.lookup(&[CFG_FINAL_PACKET]).and_then(parse_packet_bytes)
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) {} [{}]",
            self.name,
            self.description,
            self.ports_summary()
        )
    }
}

/// Tests module for server components
#[cfg(test)]
mod server_tests;
