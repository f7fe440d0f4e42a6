//! Cross-server port claim tables

use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::server::ServerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Tcp,
    Udp,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortKind::Tcp => "TCP",
            PortKind::Udp => "UDP",
        })
    }
}

/// A port requested by a server after another server claimed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConflict {
    pub kind: PortKind,
    pub port: u16,
    pub owner: String,
    pub claimant: String,
}

/// First-claimant-wins port tables, TCP and UDP kept independent
#[derive(Debug, Default)]
pub struct PortTables {
    tcp: BTreeMap<u16, String>,
    udp: BTreeMap<u16, String>,
    conflicts: Vec<PortConflict>,
}

impl PortTables {
    /// Record every TCP and UDP port of `dcs`
    pub fn claim(&mut self, dcs: &ServerConfig) {
        for port in dcs.tcp_ports() {
            self.claim_port(PortKind::Tcp, port, dcs);
        }
        for port in dcs.udp_ports() {
            self.claim_port(PortKind::Udp, port, dcs);
        }
    }

    fn claim_port(&mut self, kind: PortKind, port: u16, dcs: &ServerConfig) {
        let table = match kind {
            PortKind::Tcp => &mut self.tcp,
            PortKind::Udp => &mut self.udp,
        };
        let owner = table
            .entry(port)
            .or_insert_with(|| dcs.name().to_string())
            .clone();
        if owner == dcs.name() {
            return;
        }
        if dcs.warn_port_conflict() {
            let file = dcs
                .source()
                .and_then(|p| p.file_name())
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            warn!(
                "[{}:{}] {} Port Conflict: {} (see '{}')",
                file,
                dcs.name(),
                kind,
                port,
                owner
            );
        }
        self.conflicts.push(PortConflict {
            kind,
            port,
            owner,
            claimant: dcs.name().to_string(),
        });
    }

    /// Name of the server owning a port
    pub fn owner(&self, kind: PortKind, port: u16) -> Option<&str> {
        let table = match kind {
            PortKind::Tcp => &self.tcp,
            PortKind::Udp => &self.udp,
        };
        table.get(&port).map(String::as_str)
    }

    pub fn conflicts(&self) -> &[PortConflict] {
        &self.conflicts
    }
}
