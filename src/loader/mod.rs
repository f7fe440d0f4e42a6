//! Configuration Document Loader
//!
//! Builds `ServerConfig` instances from the root server document and its
//! includes. Elements are processed strictly in document order; the first
//! server loaded under a name wins. Parse failures never abort a load: they
//! are logged, recorded in [`LoadResult::errors`], and the offending file or
//! element is skipped.

pub mod document;
mod include;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{
    DEFAULT_LISTEN_BACKLOG, DEFAULT_PORT_OFFSET, PROP_BIND_ADDRESS, RuntimeConfig, description_key,
};
use crate::properties::{PropertyStore, toml_scalar_string};
use crate::server::ServerConfig;
use crate::server::acl::AccessLevel;
use crate::server::command::{Command, CommandArg, CommandTransport};
use crate::server::event_code::{EventCode, STATUS_IGNORE, parse_status_value};
use crate::server::ports::parse_port_list;
use crate::utils::error::DcsError;
use document::{
    CommandElement, CommandsElement, ConfigDocument, Element, EventCodeMapElement, IncludeElement,
    ServerElement, value_entries, value_list,
};

/// Settings passed in from the runtime configuration
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Only this server is parsed; its `GlobalProperties` are captured
    pub specific_server: Option<String>,
    pub bind_address: Option<String>,
    pub backlog: u32,
    pub port_offset: i64,
    pub include_dir: Option<PathBuf>,
    pub warn_port_conflict: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            specific_server: None,
            bind_address: None,
            backlog: DEFAULT_LISTEN_BACKLOG,
            port_offset: DEFAULT_PORT_OFFSET,
            include_dir: None,
            warn_port_conflict: true,
        }
    }
}

/// Listen settings resolved from the outermost document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenSettings {
    pub bind_address: Option<String>,
    pub backlog: u32,
    pub port_offset: i64,
    pub include_dir: Option<PathBuf>,
}

/// Outcome of loading a document tree
#[derive(Debug, Default)]
pub struct LoadResult {
    /// Accepted servers in document order, names unique
    pub servers: Vec<ServerConfig>,
    pub settings: ListenSettings,
    /// `GlobalProperties` of the selected server (single-server mode only)
    pub global_properties: PropertyStore,
    pub errors: Vec<DcsError>,
}

pub struct ConfigLoader<'a> {
    runtime: &'a RuntimeConfig,
    options: LoadOptions,
    settings: Option<ListenSettings>,
    /// Canonical paths of the files currently being loaded, outermost first
    chain: Vec<PathBuf>,
    global_properties: PropertyStore,
    errors: Vec<DcsError>,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(runtime: &'a RuntimeConfig, options: LoadOptions) -> Self {
        Self {
            runtime,
            options,
            settings: None,
            chain: Vec::new(),
            global_properties: PropertyStore::new(),
            errors: Vec::new(),
        }
    }

    /// Load the document at `path` and everything it includes
    pub fn load(mut self, path: &Path) -> LoadResult {
        let servers = self.load_file(path, None);
        let settings = self.settings.take().unwrap_or_else(|| self.default_settings(None));
        info!(
            "Loaded {} server config(s) from {} ({} error(s))",
            servers.len(),
            path.display(),
            self.errors.len()
        );
        LoadResult {
            servers,
            settings,
            global_properties: self.global_properties,
            errors: self.errors,
        }
    }

    fn record(&mut self, err: DcsError) {
        error!("{}", err);
        self.errors.push(err);
    }

    fn default_settings(&self, doc: Option<&ConfigDocument>) -> ListenSettings {
        let doc_bind = doc.and_then(|d| d.bind_address.clone());
        let bind_address = self
            .runtime
            .get_string(PROP_BIND_ADDRESS)
            .or(doc_bind.filter(|b| !b.trim().is_empty()))
            .or_else(|| self.options.bind_address.clone());
        let backlog = doc
            .and_then(|d| d.backlog)
            .and_then(|b| u32::try_from(b).ok())
            .unwrap_or(self.options.backlog);
        let port_offset = doc
            .and_then(|d| d.port_offset)
            .unwrap_or(self.options.port_offset);
        let include_dir = doc
            .and_then(|d| d.include_dir.as_deref())
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.options.include_dir.clone());
        ListenSettings {
            bind_address,
            backlog,
            port_offset,
            include_dir,
        }
    }

    fn parse_document(&mut self, path: &Path) -> Option<ConfigDocument> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                self.record(DcsError::ConfigParse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
                return None;
            }
        };
        match toml::from_str::<ConfigDocument>(&text) {
            Ok(doc) => Some(doc),
            Err(e) => {
                self.record(DcsError::ConfigParse {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    /// Load one file; `include_offset` is `None` for the outermost document
    fn load_file(&mut self, path: &Path, include_offset: Option<i64>) -> Vec<ServerConfig> {
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if self.chain.contains(&canonical) {
            self.record(DcsError::IncludeCycle(canonical));
            return Vec::new();
        }

        debug!("Loading server config: {}", path.display());
        let Some(doc) = self.parse_document(path) else {
            return Vec::new();
        };

        // Top-level attributes are only honoured on the outermost document
        if self.settings.is_none() {
            self.settings = Some(self.default_settings(Some(&doc)));
        }
        let base_offset = self.settings.as_ref().map_or(0, |s| s.port_offset);
        let port_offset = base_offset + include_offset.unwrap_or(0);

        self.chain.push(canonical);
        let parent_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut servers: Vec<ServerConfig> = Vec::new();
        let mut names: HashSet<String> = HashSet::new();

        for element in &doc.elements {
            match element {
                Element::DCServer(el) => {
                    let Some(name) = el.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
                    else {
                        self.record(DcsError::ConfigParse {
                            path: path.to_path_buf(),
                            message: "DCServer element without a name".to_string(),
                        });
                        continue;
                    };
                    if let Some(selected) = self.options.specific_server.as_deref() {
                        if selected != name {
                            continue;
                        }
                    }
                    // An inactive server still claims its name
                    if !names.insert(name.to_string()) {
                        warn!(
                            "[{}] Duplicate DCServer name ignored: {}",
                            path.display(),
                            name
                        );
                        continue;
                    }
                    if !el.active {
                        debug!("Skipping inactive DCServer: {}", name);
                        continue;
                    }
                    servers.push(self.parse_server(name, el, path, port_offset));
                }
                Element::Include(inc) => {
                    let included = self.load_include(inc, &parent_dir, path, include_offset);
                    for dcs in included {
                        if names.contains(dcs.name()) {
                            warn!(
                                "[{}] Included DCServer already defined, ignored: {}",
                                path.display(),
                                dcs.name()
                            );
                            continue;
                        }
                        names.insert(dcs.name().to_string());
                        servers.push(dcs);
                    }
                }
            }
        }

        self.chain.pop();
        servers
    }

    fn load_include(
        &mut self,
        inc: &IncludeElement,
        parent_dir: &Path,
        parent: &Path,
        include_offset: Option<i64>,
    ) -> Vec<ServerConfig> {
        let override_dir = inc
            .dir
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.settings.as_ref().and_then(|s| s.include_dir.clone()));

        match include::resolve_include(&inc.file, override_dir.as_deref(), parent_dir) {
            Some(file) => {
                let offset = include_offset.unwrap_or(0) + inc.port_offset.unwrap_or(0);
                self.load_file(&file, Some(offset))
            }
            None if inc.optional => {
                debug!("Optional include not found, skipped: {}", inc.file);
                Vec::new()
            }
            None => {
                self.record(DcsError::IncludeNotFound {
                    file: inc.file.clone(),
                    parent: parent.to_path_buf(),
                });
                Vec::new()
            }
        }
    }

    fn parse_server(
        &mut self,
        name: &str,
        el: &ServerElement,
        path: &Path,
        port_offset: i64,
    ) -> ServerConfig {
        let mut dcs = ServerConfig::new(name, Arc::clone(self.runtime.properties()));
        dcs.set_source(path);
        dcs.set_bind_address(self.settings.as_ref().and_then(|s| s.bind_address.as_deref()));
        dcs.set_warn_port_conflict(self.options.warn_port_conflict);

        for key in el.unknown.keys() {
            error!("[{}:{}] Unrecognized element ignored: {}", path.display(), name, key);
        }

        if let Some(protocol) = el.protocol.as_deref() {
            match protocol.parse::<CommandTransport>() {
                Ok(transport) => dcs.set_command_transport(transport),
                Err(e) => warn!("[{}:{}] {}", path.display(), name, e),
            }
        }

        let description = self
            .runtime
            .get_string(&description_key(name))
            .or_else(|| el.description.clone())
            .unwrap_or_default();
        dcs.set_description(&description);

        // Properties first: port and dispatch overrides consult them
        if let Some(table) = &el.properties {
            let local = PropertyStore::from_toml_table(table);
            let entries: Vec<(String, String)> = local
                .iter()
                .map(|(k, v)| (dcs.resolver().normalize_key(k), v.to_string()))
                .collect();
            for (key, value) in entries {
                dcs.set_property(&key, &value);
            }
        }

        if let Some(table) = &el.global_properties {
            if self.options.specific_server.is_some() {
                self.global_properties.merge_toml_table("", table);
            }
        }

        if let Some(attrs) = &el.attributes {
            for (key, value) in attrs {
                dcs.set_attribute(key, &toml_scalar_string(value));
            }
        }

        if let Some(prefixes) = &el.unique_id_prefix {
            dcs.set_unique_prefixes(&value_entries(prefixes));
        }

        let (bind, tcp, udp) = match &el.listen_ports {
            Some(lp) => {
                if let Some(warn) = lp.warn_port_conflict {
                    dcs.set_warn_port_conflict(warn);
                }
                let tcp = self.listen_port_list(lp.tcp_port.as_ref(), port_offset, path, name, "TCP");
                let udp = self.listen_port_list(lp.udp_port.as_ref(), port_offset, path, name, "UDP");
                (lp.bind_address.clone(), tcp, udp)
            }
            None => (None, Vec::new(), Vec::new()),
        };
        let bind = bind.filter(|b| !b.trim().is_empty());
        dcs.set_tcp_ports(bind.as_deref(), &tcp, true);
        dcs.set_udp_ports(bind.as_deref(), &udp, true);

        if let Some(map) = &el.event_code_map {
            self.parse_event_codes(&mut dcs, map, path);
        }

        match &el.commands {
            Some(commands) => self.parse_commands(&mut dcs, commands, path),
            None => dcs.set_dispatch_port(0, true),
        }

        debug!("Parsed DCServer: {}", dcs);
        dcs
    }

    fn listen_port_list(
        &mut self,
        value: Option<&toml::Value>,
        port_offset: i64,
        path: &Path,
        name: &str,
        kind: &str,
    ) -> Vec<u16> {
        let Some(value) = value else {
            return Vec::new();
        };
        match parse_port_list(&value_list(value), port_offset) {
            Ok(ports) => ports,
            Err(bad) => {
                self.record(DcsError::ConfigParse {
                    path: path.to_path_buf(),
                    message: format!("[{}] Invalid {} port: {}", name, kind, bad),
                });
                Vec::new()
            }
        }
    }

    fn parse_event_codes(&mut self, dcs: &mut ServerConfig, map: &EventCodeMapElement, path: &Path) {
        dcs.event_codes_mut().set_enabled(map.enabled);
        for code in &map.codes {
            if code.key < 0 {
                self.record(DcsError::ConfigParse {
                    path: path.to_path_buf(),
                    message: format!("[{}] Invalid event code key: {}", dcs.name(), code.key),
                });
                continue;
            }
            let raw = code.value.as_ref().map(toml_scalar_string).unwrap_or_default();
            let status = parse_status_value(&raw).unwrap_or_else(|| {
                warn!(
                    "[{}:{}] Unparsable status code for event {}, ignored: {}",
                    path.display(),
                    dcs.name(),
                    code.key,
                    raw
                );
                STATUS_IGNORE
            });
            dcs.event_codes_mut()
                .insert(EventCode::new(code.key, status, code.data.as_deref()));
        }
    }

    fn parse_commands(&mut self, dcs: &mut ServerConfig, el: &CommandsElement, path: &Path) {
        dcs.set_dispatch_host(el.dispatch_host.as_deref());
        dcs.set_dispatch_port(el.dispatch_port.unwrap_or(0), true);

        if let Some(acl) = &el.acl_name {
            let level = parse_access_level(acl.default_level(), dcs.name());
            dcs.set_commands_acl(acl.name(), level);
        }

        for cmd_el in &el.commands {
            if !cmd_el.enabled {
                continue;
            }
            match build_command(cmd_el, dcs.name()) {
                Some(command) => {
                    dcs.add_command(command);
                }
                None => self.record(DcsError::ConfigParse {
                    path: path.to_path_buf(),
                    message: format!("[{}] Command without a name", dcs.name()),
                }),
            }
        }
    }
}

fn parse_access_level(value: Option<&str>, server: &str) -> AccessLevel {
    match value.map(str::parse::<AccessLevel>) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            warn!("[{}] {}, using write", server, e);
            AccessLevel::Write
        }
        None => AccessLevel::Write,
    }
}

fn build_command(el: &CommandElement, server: &str) -> Option<Command> {
    let name = el.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
    let template = el.string.as_ref().map(|s| s.text()).unwrap_or_default();

    let mut command = Command::new(name, template);
    command.description = el.description.clone().unwrap_or_default().trim().to_string();
    command.types = el.types.as_ref().map(value_list).unwrap_or_default();
    command.expect_ack = el.expect_ack;

    match &el.acl_name {
        Some(acl) => {
            command.acl_name = acl.name().trim().to_string();
            command.acl_default = parse_access_level(acl.default_level(), server);
        }
        None => command.acl_name = el.acl.clone().unwrap_or_default().trim().to_string(),
    }

    if let Some(protocol) = el.string.as_ref().and_then(|s| s.protocol()) {
        command.set_transport_spec(protocol);
        if command.transport.is_none() {
            warn!("[{}:{}] Invalid command protocol: {}", server, name, protocol);
        }
    }

    if let Some(code) = &el.status_code {
        command.set_status_code(parse_status_value(&toml_scalar_string(code)).unwrap_or(STATUS_IGNORE));
    }

    command.args = el
        .args
        .iter()
        .map(|a| {
            let mut arg = CommandArg::new(&a.name);
            arg.description = a.description.clone().unwrap_or_default().trim().to_string();
            arg.read_only = a.read_only;
            arg.session_var = a.session_var.clone().filter(|s| !s.trim().is_empty());
            arg.default_value = a.default_value.clone();
            if let Some(length) = &a.length {
                arg.set_length_spec(&toml_scalar_string(length));
            }
            arg
        })
        .collect();
    command.set_has_args(el.has_args.unwrap_or(!command.args.is_empty()));

    Some(command)
}
