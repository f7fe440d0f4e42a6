//! Remote command catalog entries
//!
//! A `Command` is a named template an operator can send to a device through
//! its DCS. Templates carry `${name}` placeholders filled from positional
//! argument values at send time.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::acl::AccessLevel;
use super::event_code::STATUS_NONE;
use crate::utils::error::DcsError;

pub const DEFAULT_DISPLAY_LENGTH: usize = 70;
pub const DEFAULT_MAX_LENGTH: usize = 500;

const PLACEHOLDER_START: &str = "${";
const PLACEHOLDER_END: char = '}';

/// Channel a command is carried on between the DCS and the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandTransport {
    #[default]
    Udp,
    Tcp,
    Sms,
}

impl FromStr for CommandTransport {
    type Err = DcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp" => Ok(CommandTransport::Udp),
            "tcp" => Ok(CommandTransport::Tcp),
            "sms" => Ok(CommandTransport::Sms),
            other => Err(DcsError::InvalidArguments(format!(
                "unknown command transport '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CommandTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommandTransport::Udp => "udp",
            CommandTransport::Tcp => "tcp",
            CommandTransport::Sms => "sms",
        })
    }
}

/// Parse `"<transport>[:<handler>]"`, e.g. `"sms:body"`
///
/// Returns `None` for a blank or unrecognised transport.
pub fn parse_transport_spec(spec: &str) -> Option<(CommandTransport, Option<String>)> {
    let spec = spec.trim();
    if spec.is_empty() {
        return None;
    }
    let (proto, handler) = match spec.split_once(':') {
        Some((p, h)) => (p, Some(h.trim()).filter(|h| !h.is_empty())),
        None => (spec, None),
    };
    let transport = proto.parse().ok()?;
    Some((transport, handler.map(str::to_string)))
}

/// Declared command argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandArg {
    pub name: String,
    pub description: String,
    pub read_only: bool,
    pub session_var: Option<String>,
    pub default_value: Option<String>,
    pub display_length: usize,
    pub max_length: usize,
}

impl CommandArg {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            description: String::new(),
            read_only: false,
            session_var: None,
            default_value: None,
            display_length: DEFAULT_DISPLAY_LENGTH,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }

    /// Set display/max lengths
    ///
    /// A non-positive display length falls back to the default, a
    /// non-positive max length to twice the display length, and the max is
    /// never below the display length.
    pub fn set_length(&mut self, display: i64, max: i64) {
        let display = usize::try_from(display)
            .ok()
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_DISPLAY_LENGTH);
        let max = usize::try_from(max)
            .ok()
            .filter(|m| *m > 0)
            .unwrap_or(display * 2);
        self.display_length = display;
        self.max_length = max.max(display);
    }

    /// Apply a `"disp[,max]"` length attribute
    ///
    /// A missing or non-positive max means the display length.
    pub fn set_length_spec(&mut self, spec: &str) {
        let mut parts = spec.split(',').map(|p| p.trim().parse::<i64>().unwrap_or(0));
        let display = parts
            .next()
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_DISPLAY_LENGTH as i64);
        let max = parts.next().filter(|m| *m > 0).unwrap_or(display);
        self.set_length(display, max);
    }

    /// True if the operator must supply a value for this argument
    pub fn is_required(&self) -> bool {
        !self.read_only && self.default_value.is_none()
    }
}

/// One entry in a server's command catalog
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    pub name: String,
    pub description: String,
    /// Usage tags: `map`, `admin`, `garmin`, `sysadmin`, ...
    pub types: Vec<String>,
    pub acl_name: String,
    pub acl_default: AccessLevel,
    pub template: String,
    pub args: Vec<CommandArg>,
    /// `None` means the server's command transport applies
    pub transport: Option<CommandTransport>,
    pub handler: Option<String>,
    pub expect_ack: bool,
    pub status_code: i32,
    #[serde(skip)]
    declared_has_args: bool,
}

impl Command {
    pub fn new(name: &str, template: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            description: String::new(),
            types: Vec::new(),
            acl_name: String::new(),
            acl_default: AccessLevel::Write,
            template: template.to_string(),
            args: Vec::new(),
            transport: None,
            handler: None,
            expect_ack: false,
            status_code: STATUS_NONE,
            declared_has_args: false,
        }
    }

    pub fn set_has_args(&mut self, has_args: bool) {
        self.declared_has_args = has_args;
    }

    /// Record the status code logged when the command is sent; non-positive means none
    pub fn set_status_code(&mut self, code: i32) {
        self.status_code = if code > 0 { code } else { STATUS_NONE };
    }

    /// Set transport and handler from a `"sms:body"` style string
    ///
    /// An unrecognised string clears both.
    pub fn set_transport_spec(&mut self, spec: &str) {
        match parse_transport_spec(spec) {
            Some((transport, handler)) => {
                self.transport = Some(transport);
                self.handler = handler;
            }
            None => {
                self.transport = None;
                self.handler = None;
            }
        }
    }

    pub fn has_args(&self) -> bool {
        self.declared_has_args || self.template.contains(PLACEHOLDER_START)
    }

    /// Number of argument values the command accepts
    pub fn arg_count(&self) -> usize {
        if !self.has_args() {
            0
        } else if self.args.is_empty() {
            1
        } else {
            self.args.len()
        }
    }

    /// Number of leading arguments the operator must supply
    pub fn required_arg_count(&self) -> usize {
        self.args
            .iter()
            .rposition(CommandArg::is_required)
            .map_or(0, |i| i + 1)
    }

    /// Usage tag match; blank or `all` matches every command
    pub fn matches_type(&self, usage: &str) -> bool {
        let usage = usage.trim();
        usage.is_empty()
            || usage.eq_ignore_ascii_case("all")
            || self.types.iter().any(|t| t.eq_ignore_ascii_case(usage))
    }

    /// Render the template with positional values
    pub fn render(&self, values: &[&str]) -> String {
        if !self.has_args() {
            return self.template.clone();
        }
        let names: Vec<&str> = self.args.iter().map(|a| a.name.as_str()).collect();
        expand_template(&self.template, &names, values)
    }
}

/// Substitute every `${x}` placeholder of `template`
///
/// `x` resolves to, in order: the value at the position of the declared
/// argument named `x`; `values[0]` when `x` is `arg`; `values[N]` when `x` is
/// `argN`. Anything unresolved becomes an empty string. Text after an
/// unterminated `${` is copied as is.
///
/// A value addressed positionally (`arg`, `argN`) belongs to that
/// placeholder: a declared name sharing its position expands to empty, so
/// `"${arg0}:${other}"` with `other` declared first and values `["X"]`
/// renders `"X:"`.
pub fn expand_template(template: &str, declared: &[&str], values: &[&str]) -> String {
    let claimed: Vec<usize> = placeholder_keys(template)
        .into_iter()
        .filter(|key| !declared.contains(key))
        .filter_map(positional_index)
        .collect();

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(PLACEHOLDER_START) {
        let after = &rest[start + PLACEHOLDER_START.len()..];
        let Some(end) = after.find(PLACEHOLDER_END) else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(placeholder_value(after[..end].trim(), declared, values, &claimed));
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

/// Keys of the terminated placeholders, in template order
fn placeholder_keys(template: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find(PLACEHOLDER_START) {
        let after = &rest[start + PLACEHOLDER_START.len()..];
        let Some(end) = after.find(PLACEHOLDER_END) else {
            break;
        };
        keys.push(after[..end].trim());
        rest = &after[end + 1..];
    }
    keys
}

/// `arg` is position 0, `argN` position N
fn positional_index(key: &str) -> Option<usize> {
    match key.strip_prefix("arg")? {
        "" => Some(0),
        n => n.parse().ok(),
    }
}

fn placeholder_value<'v>(key: &str, declared: &[&str], values: &[&'v str], claimed: &[usize]) -> &'v str {
    if let Some(i) = declared.iter().position(|name| *name == key) {
        if claimed.contains(&i) {
            return "";
        }
        if let Some(v) = values.get(i) {
            return *v;
        }
    }
    positional_index(key)
        .and_then(|n| values.get(n).copied())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Declared names bind by position; `arg`/`argN` fill positionally
    #[test]
    fn test_expand_declared_and_positional() {
        let out = expand_template("SET ${speed} ${arg1} ${other}", &["speed"], &["80", "X"]);
        assert_eq!(out, "SET 80 X ");
        assert_eq!(expand_template("PING ${arg}", &[], &["5"]), "PING 5");
    }

    /// A positional placeholder owns its value over a declared name at the same position
    #[test]
    fn test_expand_positional_reference_claims_value() {
        assert_eq!(expand_template("${arg0}:${other}", &["other"], &["X"]), "X:");
        assert_eq!(expand_template("${arg}/${speed}/${arg1}", &["speed", "dir"], &["1", "2"]), "1//2");
        // a placeholder named after a declared argument is a named reference
        assert_eq!(expand_template("${arg0}", &["arg0"], &["Z"]), "Z");
    }

    /// A declared name without a value falls through to the positional rules
    #[test]
    fn test_expand_declared_beyond_values_falls_back() {
        // "b" is declared second but only one value exists
        assert_eq!(expand_template("<${b}>", &["a", "b"], &["1"]), "<>");
        assert_eq!(expand_template("<${arg}>", &[], &[]), "<>");
    }

    /// Text after an unterminated placeholder is kept
    #[test]
    fn test_expand_unterminated() {
        assert_eq!(expand_template("A ${x} B ${y", &[], &["v"]), "A  B ${y");
    }

    /// A template placeholder implies one argument
    #[test]
    fn test_has_args_from_template() {
        let cmd = Command::new("Ping", "PING ${arg}");
        assert!(cmd.has_args());
        assert_eq!(cmd.arg_count(), 1);

        let plain = Command::new("Locate", "LOC");
        assert!(!plain.has_args());
        assert_eq!(plain.arg_count(), 0);
        assert_eq!(plain.render(&["ignored"]), "LOC");
    }

    /// Transport strings with and without a handler
    #[test]
    fn test_transport_spec() {
        assert_eq!(
            parse_transport_spec("SMS:body"),
            Some((CommandTransport::Sms, Some("body".to_string())))
        );
        assert_eq!(parse_transport_spec("tcp"), Some((CommandTransport::Tcp, None)));
        assert_eq!(parse_transport_spec("carrier-pigeon"), None);

        let mut cmd = Command::new("Reboot", "RB");
        cmd.set_transport_spec("sms:email");
        assert_eq!(cmd.handler.as_deref(), Some("email"));
        cmd.set_transport_spec("bogus");
        assert!(cmd.transport.is_none() && cmd.handler.is_none());
    }

    /// Length attribute: a missing max is the display length; a short max is raised
    #[test]
    fn test_arg_lengths() {
        let mut arg = CommandArg::new("text");
        arg.set_length_spec("20");
        assert_eq!((arg.display_length, arg.max_length), (20, 20));
        arg.set_length_spec("30,10");
        assert_eq!((arg.display_length, arg.max_length), (30, 30));
        arg.set_length_spec("x,90");
        assert_eq!((arg.display_length, arg.max_length), (70, 90));
        arg.set_length(0, 0);
        assert_eq!((arg.display_length, arg.max_length), (70, 140));
    }

    /// Non-positive status codes clear; trailing defaulted args are optional
    #[test]
    fn test_status_code_and_required_args() {
        let mut cmd = Command::new("Out", "OUT ${port} ${state}");
        cmd.set_status_code(-3);
        assert_eq!(cmd.status_code, STATUS_NONE);

        let port = CommandArg::new("port");
        let mut state = CommandArg::new("state");
        state.default_value = Some("1".to_string());
        cmd.args = vec![port, state];
        assert_eq!(cmd.required_arg_count(), 1);
        assert_eq!(cmd.render(&["2", "0"]), "OUT 2 0");
    }
}
