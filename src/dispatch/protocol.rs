//! Command request line
//!
//! `account=<a> device=<d> cmdtype=<t> cmdname=<c> arg0=<v0> arg1=<v1> ...`

use serde::Serialize;

use crate::properties::codec::{decode_line, encode_line};

pub const CMDARG_ACCOUNT: &str = "account";
pub const CMDARG_DEVICE: &str = "device";
pub const CMDARG_CMDTYPE: &str = "cmdtype";
pub const CMDARG_CMDNAME: &str = "cmdname";
pub const CMDARG_ARG: &str = "arg";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandRequest {
    pub account: String,
    pub device: String,
    pub cmd_type: String,
    pub cmd_name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new<S: AsRef<str>>(account: &str, device: &str, cmd_type: &str, cmd_name: &str, args: &[S]) -> Self {
        Self {
            account: account.to_string(),
            device: device.to_string(),
            cmd_type: cmd_type.to_string(),
            cmd_name: cmd_name.to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
        }
    }

    /// Fields in wire order
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            (CMDARG_ACCOUNT.to_string(), self.account.clone()),
            (CMDARG_DEVICE.to_string(), self.device.clone()),
            (CMDARG_CMDTYPE.to_string(), self.cmd_type.clone()),
            (CMDARG_CMDNAME.to_string(), self.cmd_name.clone()),
        ];
        for (i, arg) in self.args.iter().enumerate() {
            pairs.push((format!("{}{}", CMDARG_ARG, i), arg.clone()));
        }
        pairs
    }

    pub fn encode(&self) -> String {
        encode_line(self.pairs())
    }

    /// Parse a request line; arguments stop at the first missing `argN`
    pub fn decode(line: &str) -> Self {
        let fields = decode_line(line);
        let get = |key: &str| {
            fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let mut args = Vec::new();
        while let Some(arg) = get(&format!("{}{}", CMDARG_ARG, args.len())) {
            args.push(arg);
        }

        Self {
            account: get(CMDARG_ACCOUNT).unwrap_or_default(),
            device: get(CMDARG_DEVICE).unwrap_or_default(),
            cmd_type: get(CMDARG_CMDTYPE).unwrap_or_default(),
            cmd_name: get(CMDARG_CMDNAME).unwrap_or_default(),
            args,
        }
    }

    pub fn arg_refs(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test request field order on the wire
    #[test]
    fn test_encode_field_order() {
        let req = CommandRequest::new("acme", "truck 1", "admin", "LocateNow", &["a", ""]);
        assert_eq!(
            req.encode(),
            "account=acme device=\"truck 1\" cmdtype=admin cmdname=LocateNow arg0=a arg1=\"\""
        );
    }

    /// Test that decoded arguments stop at the first gap
    #[test]
    fn test_decode_stops_at_gap() {
        let req = CommandRequest::decode("cmdname=Output arg0=1 arg2=3 account=acme device=t1\n");
        assert_eq!(req.account, "acme");
        assert_eq!(req.device, "t1");
        assert_eq!(req.cmd_type, "");
        assert_eq!(req.cmd_name, "Output");
        assert_eq!(req.args, vec!["1"]);
    }
}
