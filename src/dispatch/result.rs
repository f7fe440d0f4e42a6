//! Command result codes and reply lines

use serde::Serialize;
use std::fmt;

use crate::properties::codec::{decode_line, encode_line};

pub const RESPONSE_SERVER: &str = "server";
pub const RESPONSE_RESULT: &str = "result";
pub const RESPONSE_MESSAGE: &str = "message";

/// Outcome of a command request, with its wire code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    Success,
    InvalidAccount,
    InvalidDevice,
    InvalidServer,
    NotAuthorized,
    OverLimit,
    InvalidCommand,
    InvalidArg,
    InvalidType,
    EmptyRequest,
    NotSupported,
    UnknownHost,
    TransmitFail,
    InvalidProto,
    InvalidSms,
    InvalidPacket,
    InternalError,
}

impl ResultCode {
    pub const ALL: [ResultCode; 17] = [
        ResultCode::Success,
        ResultCode::InvalidAccount,
        ResultCode::InvalidDevice,
        ResultCode::InvalidServer,
        ResultCode::NotAuthorized,
        ResultCode::OverLimit,
        ResultCode::InvalidCommand,
        ResultCode::InvalidArg,
        ResultCode::InvalidType,
        ResultCode::EmptyRequest,
        ResultCode::NotSupported,
        ResultCode::UnknownHost,
        ResultCode::TransmitFail,
        ResultCode::InvalidProto,
        ResultCode::InvalidSms,
        ResultCode::InvalidPacket,
        ResultCode::InternalError,
    ];

    /// Wire code, e.g. `OK000`
    pub fn code(&self) -> &'static str {
        match self {
            ResultCode::Success => "OK000",
            ResultCode::InvalidAccount => "AC001",
            ResultCode::InvalidDevice => "DV001",
            ResultCode::InvalidServer => "SR001",
            ResultCode::NotAuthorized => "AU001",
            ResultCode::OverLimit => "AU002",
            ResultCode::InvalidCommand => "CM001",
            ResultCode::InvalidArg => "CM002",
            ResultCode::InvalidType => "CM003",
            ResultCode::EmptyRequest => "CM004",
            ResultCode::NotSupported => "CM005",
            ResultCode::UnknownHost => "HP001",
            ResultCode::TransmitFail => "TX001",
            ResultCode::InvalidProto => "PR001",
            ResultCode::InvalidSms => "PR002",
            ResultCode::InvalidPacket => "PK001",
            ResultCode::InternalError => "XX001",
        }
    }

    /// Human readable message
    pub fn message(&self) -> &'static str {
        match self {
            ResultCode::Success => "Successful",
            ResultCode::InvalidAccount => "Invalid Account",
            ResultCode::InvalidDevice => "Invalid Device",
            ResultCode::InvalidServer => "Invalid Server",
            ResultCode::NotAuthorized => "Not Authorized",
            ResultCode::OverLimit => "Over Limit",
            ResultCode::InvalidCommand => "Invalid command",
            ResultCode::InvalidArg => "Invalid command/argument",
            ResultCode::InvalidType => "Invalid command type",
            ResultCode::EmptyRequest => "Invalid/Empty request",
            ResultCode::NotSupported => "Not Supported by Device",
            ResultCode::UnknownHost => "Invalid host",
            ResultCode::TransmitFail => "Transmit failure",
            ResultCode::InvalidProto => "Invalid Protocol",
            ResultCode::InvalidSms => "Invalid SMS specification",
            ResultCode::InvalidPacket => "Invalid Packet",
            ResultCode::InternalError => "Internal Error",
        }
    }

    /// Code for a wire string; blank reads as success
    pub fn from_code(code: &str) -> Option<ResultCode> {
        let code = code.trim();
        if code.is_empty() {
            return Some(ResultCode::Success);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|rc| rc.code() == code)
    }

    pub fn is_ok(&self) -> bool {
        *self == ResultCode::Success
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

/// True for a blank result or `OK000`
pub fn is_command_result_ok(result: &str) -> bool {
    let result = result.trim();
    result.is_empty() || result == ResultCode::Success.code()
}

/// Reply to a command request
///
/// Holds every field of the reply line in arrival order. Locally generated
/// replies (pre-check failures, transport errors) echo the request fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResponse {
    fields: Vec<(String, String)>,
}

impl CommandResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply carrying `code` and its message after the given fields
    pub fn with_result<I, K, V>(fields: I, code: ResultCode) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut resp = Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        };
        resp.set_result(code);
        resp
    }

    pub fn from_code(code: ResultCode) -> Self {
        Self::with_result(Vec::<(String, String)>::new(), code)
    }

    /// Parse a reply line
    pub fn decode(line: &str) -> Self {
        Self {
            fields: decode_line(line),
        }
    }

    pub fn encode(&self) -> String {
        encode_line(self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn set(&mut self, key: &str, value: &str) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.fields.push((key.to_string(), value.to_string())),
        }
    }

    pub fn set_result(&mut self, code: ResultCode) {
        self.set(RESPONSE_RESULT, code.code());
        self.set(RESPONSE_MESSAGE, code.message());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Raw `result` field, empty when absent
    pub fn result(&self) -> &str {
        self.get(RESPONSE_RESULT).unwrap_or("")
    }

    /// Typed result; an unknown code reads as `InternalError`
    pub fn result_code(&self) -> ResultCode {
        ResultCode::from_code(self.result()).unwrap_or(ResultCode::InternalError)
    }

    pub fn message(&self) -> &str {
        self.get(RESPONSE_MESSAGE).unwrap_or("")
    }

    pub fn server(&self) -> Option<&str> {
        self.get(RESPONSE_SERVER)
    }

    pub fn is_ok(&self) -> bool {
        is_command_result_ok(self.result())
    }
}

impl fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
