//! Configuration document schema
//!
//! ```toml
//! bindAddress = "0.0.0.0"
//! portOffset = 0
//!
//! [[element]]
//! tag = "DCServer"
//! name = "gtsdmtp"
//! Description = "OpenDMTP Server"
//! UniqueIDPrefix = "mid_,imei_"
//! ListenPorts = { tcpPort = "31000", udpPort = "31000" }
//!
//! [[element]]
//! tag = "Include"
//! file = "dcserver_extra.toml"
//! optional = true
//! ```
//!
//! Elements are kept in a single ordered array so that duplicate names and
//! port conflicts resolve in document order.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::properties::{parse_list, toml_scalar_string};

fn default_true() -> bool {
    true
}

/// Comma list from a string, number or array value; blank entries kept
pub fn value_entries(value: &toml::Value) -> Vec<String> {
    match value {
        toml::Value::Array(items) => items.iter().map(toml_scalar_string).collect(),
        other => toml_scalar_string(other)
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
    }
}

/// Comma list from a value with blank entries dropped
pub fn value_list(value: &toml::Value) -> Vec<String> {
    parse_list(&value_entries(value).join(","))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDocument {
    #[serde(rename = "bindAddress")]
    pub bind_address: Option<String>,
    pub backlog: Option<i64>,
    #[serde(rename = "portOffset")]
    pub port_offset: Option<i64>,
    #[serde(rename = "includeDir")]
    pub include_dir: Option<String>,
    #[serde(default, rename = "element")]
    pub elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "tag")]
pub enum Element {
    DCServer(Box<ServerElement>),
    Include(IncludeElement),
}

#[derive(Debug, Deserialize)]
pub struct IncludeElement {
    pub file: String,
    pub dir: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(rename = "portOffset")]
    pub port_offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ServerElement {
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub protocol: Option<String>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "Attributes")]
    pub attributes: Option<toml::Table>,
    #[serde(rename = "UniqueIDPrefix")]
    pub unique_id_prefix: Option<toml::Value>,
    #[serde(rename = "ListenPorts")]
    pub listen_ports: Option<ListenPortsElement>,
    #[serde(rename = "Properties")]
    pub properties: Option<toml::Table>,
    #[serde(rename = "GlobalProperties")]
    pub global_properties: Option<toml::Table>,
    #[serde(rename = "EventCodeMap")]
    pub event_code_map: Option<EventCodeMapElement>,
    #[serde(rename = "Commands")]
    pub commands: Option<CommandsElement>,
    /// Keys this schema does not know; logged and ignored
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListenPortsElement {
    #[serde(rename = "bindAddress")]
    pub bind_address: Option<String>,
    #[serde(rename = "tcpPort")]
    pub tcp_port: Option<toml::Value>,
    #[serde(rename = "udpPort")]
    pub udp_port: Option<toml::Value>,
    #[serde(rename = "warnPortConflict")]
    pub warn_port_conflict: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct EventCodeMapElement {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, rename = "Code")]
    pub codes: Vec<CodeElement>,
}

#[derive(Debug, Deserialize)]
pub struct CodeElement {
    pub key: i64,
    pub data: Option<String>,
    pub value: Option<toml::Value>,
}

/// ACL name, either bare or with a default access level
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AclElement {
    Name(String),
    Full {
        name: String,
        default: Option<String>,
    },
}

impl AclElement {
    pub fn name(&self) -> &str {
        match self {
            AclElement::Name(name) | AclElement::Full { name, .. } => name,
        }
    }

    pub fn default_level(&self) -> Option<&str> {
        match self {
            AclElement::Name(_) => None,
            AclElement::Full { default, .. } => default.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandsElement {
    #[serde(rename = "dispatchHost")]
    pub dispatch_host: Option<String>,
    #[serde(rename = "dispatchPort")]
    pub dispatch_port: Option<i64>,
    #[serde(rename = "AclName")]
    pub acl_name: Option<AclElement>,
    #[serde(default, rename = "Command")]
    pub commands: Vec<CommandElement>,
}

/// Command template, either bare text or with a transport
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CommandStringElement {
    Text(String),
    Full {
        protocol: Option<String>,
        #[serde(default)]
        text: String,
    },
}

impl CommandStringElement {
    pub fn text(&self) -> &str {
        match self {
            CommandStringElement::Text(text) | CommandStringElement::Full { text, .. } => text,
        }
    }

    pub fn protocol(&self) -> Option<&str> {
        match self {
            CommandStringElement::Text(_) => None,
            CommandStringElement::Full { protocol, .. } => protocol.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandElement {
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(rename = "hasArgs")]
    pub has_args: Option<bool>,
    #[serde(default, rename = "expectAck")]
    pub expect_ack: bool,
    pub acl: Option<String>,
    #[serde(rename = "Type")]
    pub types: Option<toml::Value>,
    #[serde(rename = "Description")]
    pub description: Option<String>,
    #[serde(rename = "AclName")]
    pub acl_name: Option<AclElement>,
    #[serde(rename = "String")]
    pub string: Option<CommandStringElement>,
    #[serde(rename = "StatusCode")]
    pub status_code: Option<toml::Value>,
    #[serde(default, rename = "Arg")]
    pub args: Vec<ArgElement>,
}

#[derive(Debug, Deserialize)]
pub struct ArgElement {
    pub name: String,
    #[serde(rename = "sessionVar")]
    pub session_var: Option<String>,
    #[serde(rename = "defaultValue")]
    pub default_value: Option<String>,
    #[serde(default, rename = "readOnly")]
    pub read_only: bool,
    pub length: Option<toml::Value>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that elements keep document order
    #[test]
    fn test_parse_ordered_elements() {
        let doc: ConfigDocument = toml::from_str(
            r#"
            portOffset = 10

            [[element]]
            tag = "Include"
            file = "a.toml"

            [[element]]
            tag = "DCServer"
            name = "gts"
            Bogus = 1
            [element.Commands]
            AclName = { name = "acl.cmd", default = "read" }
            [[element.Commands.Command]]
            name = "Ping"
            String = { protocol = "sms:body", text = "PING" }
            "#,
        )
        .unwrap();

        assert_eq!(doc.port_offset, Some(10));
        assert!(matches!(doc.elements[0], Element::Include(_)));
        let Element::DCServer(server) = &doc.elements[1] else {
            panic!("expected DCServer");
        };
        assert!(server.active);
        assert!(server.unknown.contains_key("Bogus"));
        let commands = server.commands.as_ref().unwrap();
        assert_eq!(commands.acl_name.as_ref().unwrap().default_level(), Some("read"));
        let string = commands.commands[0].string.as_ref().unwrap();
        assert_eq!((string.protocol(), string.text()), (Some("sms:body"), "PING"));
    }

    /// Test that an unknown root key is rejected
    #[test]
    fn test_unknown_root_key_rejected() {
        let result: Result<ConfigDocument, _> = toml::from_str("servers = 1");
        assert!(result.is_err());
        let result: Result<ConfigDocument, _> =
            toml::from_str("[[element]]\ntag = \"Mystery\"\n");
        assert!(result.is_err());
    }

    /// Test list values given as strings or arrays
    #[test]
    fn test_value_lists() {
        let v: toml::Value = toml::Value::Array(vec![
            toml::Value::Integer(31000),
            toml::Value::String("31001".into()),
        ]);
        assert_eq!(value_list(&v), vec!["31000", "31001"]);
        let s = toml::Value::String("a, ,b".into());
        assert_eq!(value_entries(&s), vec!["a", "", "b"]);
        assert_eq!(value_list(&s), vec!["a", "b"]);
    }
}
